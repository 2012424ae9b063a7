use super::error::CommandError;

/// Arguments of `WAIT numreplicas timeout`.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitArguments {
    pub target_replicas: usize,
    pub timeout_milliseconds: u64,
}

impl WaitArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::InvalidWaitCommand);
        }

        let target_replicas = arguments[0]
            .parse::<usize>()
            .map_err(|_| CommandError::InvalidWaitCommandArgument)?;
        let timeout_milliseconds = arguments[1]
            .parse::<u64>()
            .map_err(|_| CommandError::InvalidWaitCommandArgument)?;

        Ok(WaitArguments {
            target_replicas,
            timeout_milliseconds,
        })
    }
}
