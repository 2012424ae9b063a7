use super::error::CommandError;

#[derive(Debug, Clone, PartialEq)]
pub struct TypeArguments {
    pub key: String,
}

impl TypeArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidTypeCommand);
        }

        Ok(TypeArguments {
            key: arguments.remove(0),
        })
    }
}
