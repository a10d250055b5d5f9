//! CLI-boundary error wrapping: `core`'s hand-rolled `JtagError` gets a
//! `thiserror`-derived face here before bubbling up as `anyhow::Error`.

use jtagscan_core::JtagError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unrecognized adapter '{0}': expected sim, vendor, or serial")]
    UnknownAdapter(String),

    #[error("failed to connect adapter '{adapter}': {source}")]
    AdapterConnect { adapter: String, #[source] source: JtagError },

    #[error("failed to load BSDL file '{path}': {source}")]
    BsdlLoad { path: String, #[source] source: JtagError },

    #[error("initialization failed: {0}")]
    Initialize(#[source] JtagError),
}
