use alloy::primitives::U256;
use std::fmt;

/// Failure while reading from the GraphQL indexer. A fetch that fails on any
/// page yields no records at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchError {
    Transport(String),
    Status { status: u16, body: String },
    GraphQl(Vec<String>),
    Malformed(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "indexer unreachable: {msg}"),
            FetchError::Status { status, body } => {
                write!(f, "indexer responded with {status}: {body}")
            }
            FetchError::GraphQl(messages) => {
                write!(f, "indexer query failed: {}", messages.join("; "))
            }
            FetchError::Malformed(msg) => write!(f, "malformed indexer response: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractError {
    /// The wallet or node refused the transaction before it got a hash.
    Submission(String),
    Reverted { tx_hash: String },
    Timeout { tx_hash: String },
    Rpc(String),
    Decode(String),
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractError::Submission(msg) => write!(f, "transaction rejected: {msg}"),
            ContractError::Reverted { tx_hash } => {
                write!(f, "transaction {tx_hash} reverted")
            }
            ContractError::Timeout { tx_hash } => {
                write!(f, "timed out waiting for transaction {tx_hash}")
            }
            ContractError::Rpc(msg) => write!(f, "rpc error: {msg}"),
            ContractError::Decode(msg) => write!(f, "could not decode contract data: {msg}"),
        }
    }
}

impl std::error::Error for ContractError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotFoundError {
    pub bet_id: U256,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bet #{} is not in the current bet list", self.bet_id)
    }
}

impl std::error::Error for NotFoundError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionError {
    WalletNotConnected,
    NotFound(NotFoundError),
    NotJoinable { bet_id: U256 },
    NotCancellable { bet_id: U256 },
    Busy,
    Approval(ContractError),
    Transaction(ContractError),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::WalletNotConnected => write!(f, "please connect a wallet"),
            ActionError::NotFound(inner) => write!(f, "{inner}"),
            ActionError::NotJoinable { bet_id } => {
                write!(f, "bet #{bet_id} cannot be joined")
            }
            ActionError::NotCancellable { bet_id } => {
                write!(f, "bet #{bet_id} cannot be cancelled")
            }
            ActionError::Busy => write!(f, "another transaction is still in flight"),
            ActionError::Approval(inner) => write!(f, "token approval failed: {inner}"),
            ActionError::Transaction(inner) => write!(f, "transaction failed: {inner}"),
        }
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ActionError::NotFound(inner) => Some(inner),
            ActionError::Approval(inner) | ActionError::Transaction(inner) => Some(inner),
            _ => None,
        }
    }
}

impl From<NotFoundError> for ActionError {
    fn from(value: NotFoundError) -> Self {
        ActionError::NotFound(value)
    }
}
