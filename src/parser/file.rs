use super::block::{parse_block, LogRow};
use super::grammar::BLOCK_SEPARATOR;
use tracing::warn;

/// Rows decoded from one file, in block order.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub rows: Vec<LogRow>,
    /// Non-empty blocks that were dropped.
    pub rejected: usize,
}

/// Split file content on [`BLOCK_SEPARATOR`] and decode every non-empty block.
///
/// Rejected blocks are logged and skipped. No deduplication is done: a block
/// repeated verbatim yields a row for every occurrence.
pub fn parse_file(content: &str) -> ParsedFile {
    let mut parsed = ParsedFile::default();

    for (index, block) in content
        .split(BLOCK_SEPARATOR)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .enumerate()
    {
        match parse_block(block) {
            Ok(row) => parsed.rows.push(row),
            Err(rejection) => {
                warn!(block = index, reason = %rejection, "Skipped a block due to parse error");
                parsed.rejected += 1;
            }
        }
    }

    parsed
}
