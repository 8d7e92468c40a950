//! Crate error types, one enum per concern, mirroring how the mosaic side of
//! this crate's ancestor split `MosaicError`/`BaseError` by subsystem rather
//! than keeping one monolithic error type.

use thiserror::Error;

/// Errors validating or parsing a refinement token / CLI argument.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RefinementError {
    #[error("refinement token {0} has no digits")]
    EmptyToken(u64),
    #[error("refinement token {0} has height {1}, exceeding the supported maximum of {2}")]
    HeightTooLarge(u64, u8, u8),
    #[error("refinement token {0} has a layer with {1} bricks, exceeding the supported maximum of {2}")]
    LayerTooLarge(u64, u8, u8),
    #[error("base layer size {0} is unsupported, must be at least 2")]
    BaseTooSmall(u8),
}

/// Errors reading or writing the precomputation bitstream format.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BitStreamError {
    #[error("I/O error on precomputation file: {0}")]
    Io(#[from] std::io::Error),
    #[error("counts entry exceeds the declared field width for this file variant")]
    CountsOverflow,
    #[error("trailing totals at end of file do not match counters accumulated while reading")]
    TrailingTotalsMismatch,
    #[error("unexpected end of bitstream")]
    UnexpectedEof,
}

/// Errors surfaced by the regression / cross-check paths.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CheckError {
    #[error("cross-check mismatch for token {token}: computed {computed:?}, expected {expected:?}")]
    CountsMismatch { token: u64, computed: crate::counts::Counts, expected: crate::counts::Counts },
    #[error("base mismatch while comparing precomputations")]
    BaseMismatch,
    #[error("report size mismatch while comparing precomputations")]
    ReportSizeMismatch,
}
