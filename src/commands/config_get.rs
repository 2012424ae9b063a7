use super::error::CommandError;

/// Configuration parameters exposed through `CONFIG GET`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigParameter {
    Dir,
    DbFilename,
}

impl ConfigParameter {
    pub fn name(&self) -> &'static str {
        match self {
            ConfigParameter::Dir => "dir",
            ConfigParameter::DbFilename => "dbfilename",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigGetArguments {
    pub parameter: ConfigParameter,
}

impl ConfigGetArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidConfigGetCommand);
        }

        let parameter = match arguments[0].to_lowercase().as_str() {
            "dir" => ConfigParameter::Dir,
            "dbfilename" => ConfigParameter::DbFilename,
            _ => return Err(CommandError::InvalidConfigGetCommandArgument),
        };

        Ok(ConfigGetArguments { parameter })
    }
}
