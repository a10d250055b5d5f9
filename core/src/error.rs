//! Error types shared across the boundary-scan core.

use std::fmt;

/// Unified error type for every core operation.
///
/// Mirrors the seven error kinds the controller needs to distinguish:
/// IO failures reading a BSDL file, malformed BSDL sections, adapters that
/// can't be opened, failed scan-chain transactions, unknown pin lookups,
/// out-of-range cell indices, and the "no target detected" condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JtagError {
    /// The BSDL file could not be read.
    BsdlIoError { path: String, reason: String },
    /// A BSDL section was malformed; parsing continued with defaults.
    BsdlParseError { section: String, reason: String },
    /// An adapter backend failed to open (missing device, missing library, bad serial).
    AdapterUnavailable { adapter: String, reason: String },
    /// A scan-chain transaction (scanIR/scanDR/writeTMS/readIDCODE) failed.
    TransactionFailed { operation: String, reason: String },
    /// `setPin`/`getPin` referenced a pin name absent from the device model.
    UnknownPin { name: String },
    /// A cell index fell outside `0..bsrLength`.
    OutOfRangeCell { cell: usize, bsr_length: usize },
    /// Every byte of the BSR read back as `0xFF`: no target on the chain.
    NoTarget,
}

impl fmt::Display for JtagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JtagError::BsdlIoError { path, reason } => {
                write!(f, "failed to read BSDL file '{}': {}", path, reason)
            }
            JtagError::BsdlParseError { section, reason } => {
                write!(f, "malformed BSDL section '{}': {}", section, reason)
            }
            JtagError::AdapterUnavailable { adapter, reason } => {
                write!(f, "adapter '{}' unavailable: {}", adapter, reason)
            }
            JtagError::TransactionFailed { operation, reason } => {
                write!(f, "JTAG transaction '{}' failed: {}", operation, reason)
            }
            JtagError::UnknownPin { name } => write!(f, "unknown pin '{}'", name),
            JtagError::OutOfRangeCell { cell, bsr_length } => write!(
                f,
                "cell index {} out of range (bsr length {})",
                cell, bsr_length
            ),
            JtagError::NoTarget => write!(f, "no target detected on scan chain"),
        }
    }
}

impl std::error::Error for JtagError {}

pub type JtagResult<T> = std::result::Result<T, JtagError>;
