use super::error::CommandError;

#[derive(Debug, Clone, PartialEq)]
pub struct EchoArguments {
    pub message: String,
}

impl EchoArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidEchoCommand);
        }

        Ok(EchoArguments {
            message: arguments.remove(0),
        })
    }
}
