//! Hardcoded defaults kept separate from the rest of the code, the way the
//! rest of this corpus keeps a dedicated config module rather than scattering
//! magic numbers through call sites. To support config files or environment
//! overrides beyond `RUST_LOG`, look into the `config` crate.

use std::sync::OnceLock;

pub struct Settings {
    /// Thread count used by `R`/`P` when the CLI caller doesn't specify one.
    pub default_threads: usize,
    /// Output directory prefix precomputation files are written under.
    pub output_dir: &'static str,
}

impl Settings {
    pub fn new() -> Self {
        Settings { default_threads: 4, output_dir: "." }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

static SETTINGS: OnceLock<Settings> = OnceLock::new();

pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(Settings::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thread_count_is_positive() {
        assert!(settings().default_threads > 0);
    }
}
