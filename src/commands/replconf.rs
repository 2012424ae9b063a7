use super::error::CommandError;

/// The REPLCONF subcommands exchanged during the handshake and while
/// tracking replica acknowledgements.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplconfDirective {
    ListeningPort(u16),
    Capabilities,
    GetAck,
    Ack(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplconfArguments {
    pub directive: ReplconfDirective,
}

impl ReplconfArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::InvalidReplconfCommand);
        }

        let directive = match arguments[0].to_lowercase().as_str() {
            "listening-port" => {
                let port = arguments[1]
                    .parse::<u16>()
                    .map_err(|_| CommandError::InvalidReplconfCommand)?;

                ReplconfDirective::ListeningPort(port)
            }
            "capa" => ReplconfDirective::Capabilities,
            "getack" => {
                if arguments[1] != "*" {
                    return Err(CommandError::InvalidReplconfCommand);
                }

                ReplconfDirective::GetAck
            }
            "ack" => {
                let offset = arguments[1]
                    .parse::<u64>()
                    .map_err(|_| CommandError::InvalidReplconfCommand)?;

                ReplconfDirective::Ack(offset)
            }
            _ => return Err(CommandError::InvalidReplconfCommand),
        };

        Ok(ReplconfArguments { directive })
    }
}
