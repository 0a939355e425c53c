use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::errors::{CollectorError, Result};
use crate::types::Item;

/// Reads items from JSON lines, one item per line.
///
/// Each line is an object tagged with `"type"`, e.g.
/// `{"type":"way","id":1,"nodes":[...]}`. Blank lines are skipped.
pub struct ItemReader<R: BufRead> {
    lines: Lines<R>,
    line: usize,
}

impl<R: BufRead> ItemReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl ItemReader<BufReader<File>> {
    /// Opens a JSON-lines file. Call again for every pass.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| CollectorError::Input {
            message: format!("failed to open '{}': {}", path.display(), e),
            line: None,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for ItemReader<R> {
    type Item = Result<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(CollectorError::Io(e))),
            };
            self.line += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return Some(
                serde_json::from_str(trimmed).map_err(|e| CollectorError::Input {
                    message: format!("invalid item: {}", e),
                    line: Some(self.line),
                }),
            );
        }
    }
}
