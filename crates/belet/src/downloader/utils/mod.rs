//! Helpers for supervising the remux process.

mod diagnostic_reader;
mod ffmpeg_parser;
mod process;

pub use diagnostic_reader::DiagnosticReader;
pub use ffmpeg_parser::{ProgressTracker, parse_segment_index};
pub use process::remux_command;
