use super::error::CommandError;

#[derive(Debug, Clone, PartialEq)]
pub struct IncrArguments {
    pub key: String,
}

impl IncrArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidIncrCommand);
        }

        Ok(IncrArguments {
            key: arguments.remove(0),
        })
    }
}
