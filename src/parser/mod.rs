//! Decoder for multi-line support-log blocks.

pub mod block;
pub mod file;
pub mod grammar;

pub use block::{parse_block, BlockRejection, LogRow};
pub use file::{parse_file, ParsedFile};
