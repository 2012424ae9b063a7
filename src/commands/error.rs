use thiserror::Error;

use crate::resp::RespValue;
use crate::stream::StreamIdError;

/// Errors produced while parsing or executing commands. Each maps to the
/// RESP error reply the client receives.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("Invalid command")]
    InvalidCommand,
    #[error("Invalid command argument")]
    InvalidCommandArgument,
    #[error("Invalid PING command")]
    InvalidPingCommand,
    #[error("Invalid ECHO command")]
    InvalidEchoCommand,
    #[error("Invalid SET command")]
    InvalidSetCommand,
    #[error("Invalid SET command argument")]
    InvalidSetCommandArgument,
    #[error("Invalid SET command expiration")]
    InvalidSetCommandExpiration,
    #[error("Invalid GET command")]
    InvalidGetCommand,
    #[error("Invalid INCR command")]
    InvalidIncrCommand,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("Invalid TYPE command")]
    InvalidTypeCommand,
    #[error("Invalid KEYS command")]
    InvalidKeysCommand,
    #[error("Invalid KEYS command argument")]
    InvalidKeysCommandArgument,
    #[error("Invalid CONFIG GET command")]
    InvalidConfigGetCommand,
    #[error("Invalid CONFIG GET command argument")]
    InvalidConfigGetCommandArgument,
    #[error("Invalid INFO command")]
    InvalidInfoCommand,
    #[error("Invalid XADD command")]
    InvalidXAddCommand,
    #[error("Invalid XRANGE command")]
    InvalidXRangeCommand,
    #[error("Invalid XREAD command")]
    InvalidXReadCommand,
    #[error("Invalid XREAD block duration")]
    InvalidXReadBlockDuration,
    #[error("{0}")]
    InvalidStreamId(String),
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdNotGreaterThanTop,
    #[error("Operation against a key holding the wrong kind of value")]
    InvalidDataTypeForKey,
    #[error("Invalid MULTI command")]
    InvalidMultiCommand,
    #[error("Invalid EXEC command")]
    InvalidExecCommand,
    #[error("EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("Invalid DISCARD command")]
    InvalidDiscardCommand,
    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("Invalid REPLCONF command")]
    InvalidReplconfCommand,
    #[error("Invalid PSYNC command")]
    InvalidPsyncCommand,
    #[error("Invalid PSYNC replication id")]
    InvalidPsyncReplicationId,
    #[error("Invalid PSYNC offset")]
    InvalidPsyncOffset,
    #[error("PSYNC cannot be handled by a replica server")]
    PsyncOnReplica,
    #[error("Invalid WAIT command")]
    InvalidWaitCommand,
    #[error("Invalid WAIT command argument")]
    InvalidWaitCommandArgument,
    #[error("WAIT cannot be handled by a replica server")]
    WaitOnReplica,
    #[error("Replica server only handles read commands from clients")]
    ReadOnlyReplica,
}

impl CommandError {
    /// RESP error frame for this failure.
    pub fn as_resp(&self) -> RespValue {
        RespValue::Error(format!("ERR {}", self))
    }
}

impl From<StreamIdError> for CommandError {
    fn from(error: StreamIdError) -> Self {
        match error {
            StreamIdError::NotGreaterThanTop => CommandError::StreamIdNotGreaterThanTop,
            other => CommandError::InvalidStreamId(other.to_string()),
        }
    }
}
