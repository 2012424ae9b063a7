use crate::stream::{parse_range_end, parse_range_start, StreamId};

use super::error::CommandError;

/// Arguments of `XRANGE key start end`. Both bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct XrangeArguments {
    pub key: String,
    pub start: StreamId,
    pub end: StreamId,
}

impl XrangeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::InvalidXRangeCommand);
        }

        let start = parse_range_start(&arguments[1])?;
        let end = parse_range_end(&arguments[2])?;

        Ok(XrangeArguments {
            key: arguments[0].clone(),
            start,
            end,
        })
    }
}
