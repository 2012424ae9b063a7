//! Per-connection MULTI/EXEC queue. Each client connection owns one of
//! these, so dropping the connection discards any queued commands.

use crate::commands::Command;

#[derive(Debug, Default, PartialEq)]
pub enum TransactionState {
    #[default]
    Idle,
    Queuing(Vec<Command>),
}

impl TransactionState {
    /// MULTI. Starting a transaction while one is already open throws away
    /// the queued commands and starts over.
    pub fn begin(&mut self) {
        *self = TransactionState::Queuing(Vec::new());
    }

    pub fn is_queuing(&self) -> bool {
        matches!(self, TransactionState::Queuing(_))
    }

    pub fn enqueue(&mut self, command: Command) -> bool {
        match self {
            TransactionState::Queuing(queue) => {
                queue.push(command);
                true
            }
            TransactionState::Idle => false,
        }
    }

    /// EXEC. Hands back the queued commands in arrival order, or `None`
    /// when no transaction is open.
    pub fn take(&mut self) -> Option<Vec<Command>> {
        match std::mem::take(self) {
            TransactionState::Queuing(queue) => Some(queue),
            TransactionState::Idle => None,
        }
    }

    /// DISCARD. Returns whether a transaction was open.
    pub fn discard(&mut self) -> bool {
        match self {
            TransactionState::Queuing(_) => {
                *self = TransactionState::Idle;
                true
            }
            TransactionState::Idle => false,
        }
    }
}
