use super::approval::ApprovalState;
use super::types::ModelRef;
use sled::transaction::TransactionError;

#[derive(thiserror::Error, Debug)]
pub enum ApprovalError {
    #[error("Cannot {action} approval {id} while it is {state}")]
    IllegalTransition {
        id: String,
        action: &'static str,
        state: ApprovalState,
    },
    #[error("Original and new data keys diverge on {0:?}")]
    SnapshotMismatch(Vec<String>),
    #[error("Approval {0} does not exist")]
    ApprovalNotFound(String),
    #[error("Record {0} does not exist")]
    RecordNotFound(ModelRef),
    #[error("Model type {0:?} is not registered")]
    UnknownModel(String),
    #[error("Persistence failure: {0}")]
    Persistence(#[from] sled::Error),
    #[error("Failed to encode: {0}")]
    Encode(String),
    #[error("Failed to decode: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("Failed to generate identifier: {0}")]
    Identifier(String),
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for ApprovalError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        ApprovalError::Encode(value.to_string())
    }
}

impl From<TransactionError<ApprovalError>> for ApprovalError {
    fn from(value: TransactionError<ApprovalError>) -> Self {
        match value {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => ApprovalError::Persistence(err),
        }
    }
}
