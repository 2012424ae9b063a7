use super::error::CommandError;

/// Arguments of `KEYS pattern`. Only the `*` pattern is supported.
#[derive(Debug, Clone, PartialEq)]
pub struct KeysArguments {
    pub pattern: String,
}

impl KeysArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidKeysCommand);
        }

        let pattern = arguments.remove(0);

        if pattern != "*" {
            return Err(CommandError::InvalidKeysCommandArgument);
        }

        Ok(KeysArguments { pattern })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keys_arguments() {
        assert_eq!(
            KeysArguments::parse(vec![String::from("*")]),
            Ok(KeysArguments {
                pattern: String::from("*")
            })
        );
        assert_eq!(
            KeysArguments::parse(vec![String::from("fru*")]),
            Err(CommandError::InvalidKeysCommandArgument)
        );
        assert_eq!(
            KeysArguments::parse(vec![]),
            Err(CommandError::InvalidKeysCommand)
        );
    }
}
