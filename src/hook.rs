//! Interception of domain record writes.
//!
//! A [`Writer`] decides per write whether the change lands on the record
//! immediately or is captured as a pending approval.
use super::actor::ActorRef;
use super::approval::{ApprovalRecord, ChangeKind};
use super::engine::ApprovalEngine;
use super::error::ApprovalError;
use super::events::ApprovalEvent;
use super::record::Record;
use super::snapshot::{self, Snapshot};
use super::types::{FieldMap, ModelRef};
use super::utils;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Written straight through, no approval involved
    Written(Record),
    Removed(ModelRef),
    /// Approvable fields were captured for approval. `record` is the record as
    /// it stands after any pass-through fields were written; `None` for creates.
    Deferred {
        record: Option<Record>,
        approval: ApprovalRecord,
    },
}

impl WriteOutcome {
    pub fn approval(&self) -> Option<&ApprovalRecord> {
        match self {
            WriteOutcome::Deferred { approval, .. } => Some(approval),
            _ => None,
        }
    }
    pub fn is_deferred(&self) -> bool {
        self.approval().is_some()
    }
}

pub struct Writer<'a> {
    engine: &'a ApprovalEngine,
    actor: Option<ActorRef>,
    bypass: bool,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(engine: &'a ApprovalEngine, actor: Option<ActorRef>) -> Self {
        Self {
            engine,
            actor,
            bypass: false,
        }
    }

    /// Skips approval entirely for the writes made through this writer
    pub fn without_approval(mut self) -> Self {
        self.bypass = true;
        self
    }

    pub fn actor(&self) -> Option<&ActorRef> {
        self.actor.as_ref()
    }

    /// Creates a record of type `kind` with a fresh id
    pub fn create(&self, kind: &str, attributes: FieldMap) -> Result<WriteOutcome, ApprovalError> {
        self.create_with_id(ModelRef::new(kind, utils::new_record_id()), attributes)
    }

    /// Creates the record `model`. When deferred, every supplied attribute goes
    /// into the approval, not only the approvable ones, and nothing is written
    /// until it is approved.
    pub fn create_with_id(
        &self,
        model: ModelRef,
        attributes: FieldMap,
    ) -> Result<WriteOutcome, ApprovalError> {
        let selection = self.engine.config().approvable_fields(&model.kind);

        if self.bypass || !attributes.keys().any(|f| selection.contains(f)) {
            let record = Record::new(model, attributes);
            self.engine.store().transaction(|tx| tx.put_record(&record))?;

            debug!(model = %record.model, bypass = self.bypass, "record created without approval");
            return Ok(WriteOutcome::Written(record));
        }

        let approval = self.propose(
            model,
            ChangeKind::Create,
            Snapshot::for_create(&attributes),
            None,
        )?;
        Ok(WriteOutcome::Deferred {
            record: None,
            approval,
        })
    }

    /// Updates `model` with `changes`. Changed approvable fields are held back
    /// for approval, the rest are written now.
    pub fn update(
        &self,
        model: &ModelRef,
        changes: FieldMap,
    ) -> Result<WriteOutcome, ApprovalError> {
        let mut record = self
            .engine
            .record(model)?
            .ok_or_else(|| ApprovalError::RecordNotFound(model.clone()))?;

        if self.bypass {
            record.apply(&changes);
            self.engine.store().transaction(|tx| tx.put_record(&record))?;

            debug!(model = %model, "record updated without approval");
            return Ok(WriteOutcome::Written(record));
        }

        let selection = self.engine.config().approvable_fields(&model.kind);
        let split = snapshot::capture(&selection, &record.attributes, &changes)?;

        if !split.passthrough.is_empty() {
            record.apply(&split.passthrough);
        }

        let Some(snapshot) = split.snapshot else {
            if !split.passthrough.is_empty() {
                self.engine.store().transaction(|tx| tx.put_record(&record))?;
            }
            debug!(model = %model, "no approvable field changed, written through");
            return Ok(WriteOutcome::Written(record));
        };

        let passthrough = (!split.passthrough.is_empty()).then_some(&record);
        let approval = self.propose(model.clone(), ChangeKind::Update, snapshot, passthrough)?;
        Ok(WriteOutcome::Deferred {
            record: Some(record),
            approval,
        })
    }

    pub fn delete(&self, model: &ModelRef) -> Result<WriteOutcome, ApprovalError> {
        let record = self
            .engine
            .record(model)?
            .ok_or_else(|| ApprovalError::RecordNotFound(model.clone()))?;

        let selection = self.engine.config().approvable_fields(&model.kind);
        if self.bypass || selection.is_empty() {
            self.engine.store().transaction(|tx| tx.remove_record(model))?;

            debug!(model = %model, bypass = self.bypass, "record deleted without approval");
            return Ok(WriteOutcome::Removed(model.clone()));
        }

        let approval = self.propose(
            model.clone(),
            ChangeKind::Delete,
            Snapshot::for_delete(&record.attributes),
            None,
        )?;
        Ok(WriteOutcome::Deferred {
            record: Some(record),
            approval,
        })
    }

    /// Persists a pending approval, together with `record` when pass-through
    /// fields were written alongside it.
    fn propose(
        &self,
        model: ModelRef,
        change: ChangeKind,
        snapshot: Snapshot,
        record: Option<&Record>,
    ) -> Result<ApprovalRecord, ApprovalError> {
        let approval = ApprovalRecord::new(model, change, snapshot, self.actor.clone())?;

        self.engine.store().transaction(|tx| {
            if let Some(record) = record {
                tx.put_record(record)?;
            }
            tx.put_approval(&approval)
        })?;

        info!(
            approval = %approval.id,
            model = %approval.approvable,
            change = ?approval.change,
            actor = ?self.actor,
            "change captured for approval"
        );
        self.engine.notifier().publish(ApprovalEvent::Created {
            approval: approval.clone(),
            actor: self.actor.clone(),
        });
        Ok(approval)
    }
}
