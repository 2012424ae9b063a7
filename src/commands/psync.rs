use super::error::CommandError;

/// Arguments of `PSYNC replication-id offset`. A replica that has never
/// synced sends `?` and `-1`.
#[derive(Debug, Clone, PartialEq)]
pub struct PsyncArguments {
    pub replication_id: String,
    pub offset: i64,
}

impl PsyncArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::InvalidPsyncCommand);
        }

        let offset = arguments[1]
            .parse::<i64>()
            .map_err(|_| CommandError::InvalidPsyncOffset)?;

        Ok(PsyncArguments {
            replication_id: arguments.remove(0),
            offset,
        })
    }
}
