//! sled backed persistence for domain records and approvals
use super::approval::ApprovalRecord;
use super::error::ApprovalError;
use super::record::Record;
use super::types::ModelRef;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use sled::{Transactional, Tree};
use std::sync::Arc;

pub type TxResult<T> = ConflictableTransactionResult<T, ApprovalError>;

/// Aborts the surrounding transaction with `err`
pub fn abort(err: impl Into<ApprovalError>) -> ConflictableTransactionError<ApprovalError> {
    ConflictableTransactionError::Abort(err.into())
}

#[derive(Debug, Clone)]
pub struct Store {
    instance: Arc<sled::Db>,
    records: Tree,
    approvals: Tree,
}

impl Store {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, ApprovalError> {
        let records = instance.open_tree("records")?;
        let approvals = instance.open_tree("approvals")?;

        Ok(Self {
            instance,
            records,
            approvals,
        })
    }

    pub fn load_record(&self, model: &ModelRef) -> Result<Option<Record>, ApprovalError> {
        match self.records.get(model.storage_key().as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn load_approval(&self, id: &str) -> Result<ApprovalRecord, ApprovalError> {
        match self.approvals.get(id.as_bytes())? {
            Some(bytes) => Ok(minicbor::decode(&bytes)?),
            None => Err(ApprovalError::ApprovalNotFound(id.to_string())),
        }
    }

    /// Every stored approval, oldest first
    pub fn approvals(&self) -> Result<Vec<ApprovalRecord>, ApprovalError> {
        let mut approvals = self
            .approvals
            .iter()
            .values()
            .map(|bytes| Ok(minicbor::decode::<ApprovalRecord>(&bytes?)?))
            .collect::<Result<Vec<_>, ApprovalError>>()?;

        approvals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(approvals)
    }

    pub fn approval_count(&self) -> usize {
        self.approvals.len()
    }

    /// Runs `f` atomically over both trees. sled may call `f` more than once
    /// on conflict, so it must not have side effects outside the transaction.
    pub(crate) fn transaction<T>(&self, f: impl Fn(&StoreTx<'_>) -> TxResult<T>) -> Result<T, ApprovalError> {
        let result = (&self.records, &self.approvals)
            .transaction(|(records, approvals)| f(&StoreTx { records, approvals }))?;

        self.instance.flush()?;
        Ok(result)
    }
}

/// Typed view over the trees inside a transaction
pub struct StoreTx<'a> {
    records: &'a TransactionalTree,
    approvals: &'a TransactionalTree,
}

impl StoreTx<'_> {
    pub fn record(&self, model: &ModelRef) -> TxResult<Option<Record>> {
        match self.records.get(model.storage_key().as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes).map_err(abort)?)),
            None => Ok(None),
        }
    }
    pub fn existing_record(&self, model: &ModelRef) -> TxResult<Record> {
        self.record(model)?
            .ok_or_else(|| abort(ApprovalError::RecordNotFound(model.clone())))
    }
    pub(crate) fn put_record(&self, record: &Record) -> TxResult<()> {
        let bytes = minicbor::to_vec(record).map_err(abort)?;
        self.records.insert(record.model.storage_key().as_bytes(), bytes)?;
        Ok(())
    }
    pub(crate) fn remove_record(&self, model: &ModelRef) -> TxResult<()> {
        self.records.remove(model.storage_key().as_bytes())?;
        Ok(())
    }
    pub fn approval(&self, id: &str) -> TxResult<ApprovalRecord> {
        match self.approvals.get(id.as_bytes())? {
            Some(bytes) => minicbor::decode(&bytes).map_err(abort),
            None => Err(abort(ApprovalError::ApprovalNotFound(id.to_string()))),
        }
    }
    pub(crate) fn put_approval(&self, approval: &ApprovalRecord) -> TxResult<()> {
        let bytes = minicbor::to_vec(approval).map_err(abort)?;
        self.approvals.insert(approval.id.as_bytes(), bytes)?;
        Ok(())
    }
}
