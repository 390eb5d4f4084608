//! Telemetry extraction from get_iplayer output
//!
//! - [`delimiter`] - locating line endings in decoded text
//! - [`decoder`] - incremental byte decoding and line assembly
//! - [`parser`] - classifying single lines into progress events

mod decoder;
mod delimiter;
mod parser;

pub use decoder::LineAssembler;
pub use delimiter::{Delimiter, next_delimiter};
pub use parser::{COMPLETED_ETA, LineTelemetry, ProgressUpdate, UpdateKind, parse_line};
