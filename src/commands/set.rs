use super::error::CommandError;

/// Arguments of `SET key value [PX milliseconds]`. The expiry stays
/// relative here and only becomes an absolute timestamp when the store
/// applies it, so a SET queued inside MULTI expires relative to EXEC.
#[derive(Debug, Clone, PartialEq)]
pub struct SetArguments {
    pub key: String,
    pub value: String,
    pub time_to_live_milliseconds: Option<u64>,
}

impl SetArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        let time_to_live_milliseconds = match arguments.len() {
            2 => None,
            4 => {
                if arguments[2].to_lowercase() != "px" {
                    return Err(CommandError::InvalidSetCommandArgument);
                }

                let milliseconds = arguments[3]
                    .parse::<u64>()
                    .map_err(|_| CommandError::InvalidSetCommandExpiration)?;

                Some(milliseconds)
            }
            _ => return Err(CommandError::InvalidSetCommand),
        };

        let value = arguments.remove(1);
        let key = arguments.remove(0);

        Ok(SetArguments {
            key,
            value,
            time_to_live_milliseconds,
        })
    }
}
