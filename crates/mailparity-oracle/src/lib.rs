//! mailparity-oracle - external parsers as black-box oracles
//!
//! Provides:
//! - Builtin oracle catalogue (ruby-msg, outlook_msg, extract-msg, msg-viewer, python_email)
//! - Batch process runner with optional timeout
//! - Pure line-protocol decoders
//! - Optional `readpst` corroboration

pub mod catalog;
pub mod collect;
pub mod error;
pub mod probe;
pub mod protocol;
pub mod runner;

// Re-export key types
pub use catalog::{BuiltinOracle, OracleConfig, OracleRoots, StagedScript};
pub use collect::{collect, collect_all, run_oracle, Decoder};
pub use error::{OracleError, Result};
pub use probe::probe_readpst;
pub use protocol::{decode_eml, decode_msg, decode_pst_probe, decode_pst_report, decode_warnings};
pub use runner::{OracleOutput, OracleRunner};
