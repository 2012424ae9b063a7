use super::error::CommandError;

/// Arguments of `INFO [section]`. Only the replication section is
/// implemented, so the section argument is accepted and ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoArguments {
    pub section: Option<String>,
}

impl InfoArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        match arguments.len() {
            0 => Ok(InfoArguments { section: None }),
            1 => Ok(InfoArguments {
                section: Some(arguments.remove(0)),
            }),
            _ => Err(CommandError::InvalidInfoCommand),
        }
    }
}
