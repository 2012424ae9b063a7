//! Command decoding. A client frame is parsed into the closed [`Command`]
//! enum up front, so execution never has to re-validate argument shapes.

mod config_get;
mod echo;
mod error;
mod get;
mod incr;
mod info;
mod keys;
mod psync;
mod replconf;
mod set;
mod type_command;
mod wait;
mod xadd;
mod xrange;
mod xread;

pub use config_get::{ConfigGetArguments, ConfigParameter};
pub use echo::EchoArguments;
pub use error::CommandError;
pub use get::GetArguments;
pub use incr::IncrArguments;
pub use info::InfoArguments;
pub use keys::KeysArguments;
pub use psync::PsyncArguments;
pub use replconf::{ReplconfArguments, ReplconfDirective};
pub use set::SetArguments;
pub use type_command::TypeArguments;
pub use wait::WaitArguments;
pub use xadd::XaddArguments;
pub use xrange::XrangeArguments;
pub use xread::XreadArguments;

use crate::resp::RespValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,
    Echo(EchoArguments),
    Set(SetArguments),
    Get(GetArguments),
    Incr(IncrArguments),
    Type(TypeArguments),
    Keys(KeysArguments),
    ConfigGet(ConfigGetArguments),
    Info(InfoArguments),
    Xadd(XaddArguments),
    Xrange(XrangeArguments),
    Xread(XreadArguments),
    Multi,
    Exec,
    Discard,
    Replconf(ReplconfArguments),
    Psync(PsyncArguments),
    Wait(WaitArguments),
}

impl Command {
    /// Decodes a client frame, which must be an array of bulk strings with
    /// the command name first.
    pub fn parse(frame: RespValue) -> Result<Self, CommandError> {
        let RespValue::Array(elements) = frame else {
            return Err(CommandError::InvalidCommand);
        };

        let mut parts = Vec::with_capacity(elements.len());

        for element in elements {
            match element {
                RespValue::BulkString(part) => parts.push(part),
                _ => return Err(CommandError::InvalidCommandArgument),
            }
        }

        let Some((name, arguments)) = parts.split_first() else {
            return Err(CommandError::InvalidCommand);
        };
        let arguments = arguments.to_vec();

        match name.to_uppercase().as_str() {
            "PING" => {
                if !arguments.is_empty() {
                    return Err(CommandError::InvalidPingCommand);
                }

                Ok(Command::Ping)
            }
            "ECHO" => Ok(Command::Echo(EchoArguments::parse(arguments)?)),
            "SET" => Ok(Command::Set(SetArguments::parse(arguments)?)),
            "GET" => Ok(Command::Get(GetArguments::parse(arguments)?)),
            "INCR" => Ok(Command::Incr(IncrArguments::parse(arguments)?)),
            "TYPE" => Ok(Command::Type(TypeArguments::parse(arguments)?)),
            "KEYS" => Ok(Command::Keys(KeysArguments::parse(arguments)?)),
            "CONFIG" => {
                let Some((subcommand, parameters)) = arguments.split_first() else {
                    return Err(CommandError::InvalidConfigGetCommand);
                };

                if subcommand.to_uppercase() != "GET" {
                    return Err(CommandError::InvalidConfigGetCommand);
                }

                Ok(Command::ConfigGet(ConfigGetArguments::parse(
                    parameters.to_vec(),
                )?))
            }
            "INFO" => Ok(Command::Info(InfoArguments::parse(arguments)?)),
            "XADD" => Ok(Command::Xadd(XaddArguments::parse(arguments)?)),
            "XRANGE" => Ok(Command::Xrange(XrangeArguments::parse(arguments)?)),
            "XREAD" => Ok(Command::Xread(XreadArguments::parse(arguments)?)),
            "MULTI" => {
                if !arguments.is_empty() {
                    return Err(CommandError::InvalidMultiCommand);
                }

                Ok(Command::Multi)
            }
            "EXEC" => {
                if !arguments.is_empty() {
                    return Err(CommandError::InvalidExecCommand);
                }

                Ok(Command::Exec)
            }
            "DISCARD" => {
                if !arguments.is_empty() {
                    return Err(CommandError::InvalidDiscardCommand);
                }

                Ok(Command::Discard)
            }
            "REPLCONF" => Ok(Command::Replconf(ReplconfArguments::parse(arguments)?)),
            "PSYNC" => Ok(Command::Psync(PsyncArguments::parse(arguments)?)),
            "WAIT" => Ok(Command::Wait(WaitArguments::parse(arguments)?)),
            _ => Err(CommandError::InvalidCommand),
        }
    }

    /// Commands that mutate the keyspace. Replicas reject these when they
    /// come from a regular client instead of the master link.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Set(_) | Command::Incr(_) | Command::Xadd(_)
        )
    }
}
