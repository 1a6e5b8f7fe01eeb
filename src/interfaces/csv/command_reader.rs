use crate::error::{MarketError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Request,
    Approve,
    Reject,
    Cancel,
    Complete,
    Settle,
    Publish,
    Expire,
}

/// One row of the commands file: who does what to which entity.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct CommandRecord {
    pub command: CommandKind,
    pub actor: u64,
    pub target: Option<u64>,
}

impl CommandRecord {
    pub fn target(&self) -> Result<u64> {
        self.target.ok_or_else(|| {
            MarketError::Validation(format!("{:?} requires a target id", self.command))
        })
    }
}

/// Reads commands from a CSV source.
///
/// Whitespace is trimmed and short rows are accepted, so `expire, 1,` parses
/// with an empty target.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes commands, one `Result` per row.
    pub fn commands(self) -> impl Iterator<Item = Result<CommandRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(MarketError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_valid_stream() {
        let data = "command, actor, target\nrequest, 200, 1\napprove, 100, 1\nexpire, 1,";
        let results: Vec<Result<CommandRecord>> = CommandReader::new(data.as_bytes())
            .commands()
            .collect();

        assert_eq!(results.len(), 3);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.command, CommandKind::Request);
        assert_eq!(first.actor, 200);
        assert_eq!(first.target, Some(1));
        assert_eq!(results[2].as_ref().unwrap().target, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "command, actor, target\nbuy, 1, 1\nrequest, abc, 1";
        let results: Vec<Result<CommandRecord>> = CommandReader::new(data.as_bytes())
            .commands()
            .collect();

        assert!(results[0].is_err());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_missing_target() {
        let record = CommandRecord {
            command: CommandKind::Approve,
            actor: 1,
            target: None,
        };
        assert!(matches!(record.target(), Err(MarketError::Validation(_))));
    }
}
