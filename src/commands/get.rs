use super::error::CommandError;

#[derive(Debug, Clone, PartialEq)]
pub struct GetArguments {
    pub key: String,
}

impl GetArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidGetCommand);
        }

        Ok(GetArguments {
            key: arguments.remove(0),
        })
    }
}
