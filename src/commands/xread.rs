use super::error::CommandError;

/// Arguments of `XREAD [BLOCK milliseconds] STREAMS key [key ...] id [id ...]`.
///
/// IDs are kept as raw strings because `$` can only be resolved against
/// the store at execution time.
#[derive(Debug, Clone, PartialEq)]
pub struct XreadArguments {
    pub block_milliseconds: Option<u64>,
    pub streams: Vec<(String, String)>,
}

impl XreadArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 3 {
            return Err(CommandError::InvalidXReadCommand);
        }

        let (block_milliseconds, remaining) = if arguments[0].to_lowercase() == "block" {
            let milliseconds = arguments[1]
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidXReadBlockDuration)?;

            (Some(milliseconds), &arguments[2..])
        } else {
            (None, &arguments[..])
        };

        let Some((keyword, stream_arguments)) = remaining.split_first() else {
            return Err(CommandError::InvalidXReadCommand);
        };

        if keyword.to_lowercase() != "streams" {
            return Err(CommandError::InvalidXReadCommand);
        }

        if stream_arguments.is_empty() || stream_arguments.len() % 2 != 0 {
            return Err(CommandError::InvalidXReadCommand);
        }

        let (keys, ids) = stream_arguments.split_at(stream_arguments.len() / 2);
        let streams = keys
            .iter()
            .zip(ids.iter())
            .map(|(key, id)| (key.clone(), id.clone()))
            .collect();

        Ok(XreadArguments {
            block_milliseconds,
            streams,
        })
    }
}
