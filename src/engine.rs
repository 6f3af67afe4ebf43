//! Service layer API for approval decisions
use super::actor::{ActorRef, ActorResolver};
use super::approval::{ApprovalQuery, ApprovalRecord, ApprovalState, ChangeKind};
use super::config::ApprovalConfig;
use super::error::ApprovalError;
use super::events::{ApprovalEvent, EventNotifier};
use super::hook::Writer;
use super::record::Record;
use super::store::{Store, StoreTx, TxResult, abort};
use super::types::{FieldMap, ModelRef, TimeStamp};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a rollback request
#[derive(Debug, Clone, PartialEq)]
pub enum RollbackOutcome {
    RolledBack(ApprovalRecord),
    /// The condition evaluated false, nothing was changed
    Skipped,
}

pub struct ApprovalEngine {
    store: Store,
    config: ApprovalConfig,
    notifier: EventNotifier,
}

impl ApprovalEngine {
    pub fn new(instance: Arc<sled::Db>, config: ApprovalConfig) -> Result<Self, ApprovalError> {
        Ok(Self {
            store: Store::new(instance)?,
            config,
            notifier: EventNotifier::new(),
        })
    }

    pub fn config(&self) -> &ApprovalConfig {
        &self.config
    }
    pub fn notifier(&self) -> &EventNotifier {
        &self.notifier
    }
    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    /// Intercepting writer acting as whoever `resolver` names right now
    pub fn writer<R: ActorResolver + ?Sized>(&self, resolver: &R) -> Writer<'_> {
        Writer::new(self, resolver.current_actor())
    }

    pub fn record(&self, model: &ModelRef) -> Result<Option<Record>, ApprovalError> {
        self.store.load_record(model)
    }
    pub fn approval(&self, id: &str) -> Result<ApprovalRecord, ApprovalError> {
        self.store.load_approval(id)
    }
    /// Number of stored approvals, whatever their state
    pub fn approval_count(&self) -> usize {
        self.store.approval_count()
    }
    pub fn query(&self, query: &ApprovalQuery) -> Result<Vec<ApprovalRecord>, ApprovalError> {
        let mut approvals = self.store.approvals()?;
        approvals.retain(|a| query.matches(a));
        Ok(approvals)
    }
    pub fn requested_by(&self, actor: &ActorRef) -> Result<Vec<ApprovalRecord>, ApprovalError> {
        self.query(&ApprovalQuery::new().requested_by(actor))
    }
    /// Approvals governing `model`, oldest first
    pub fn approvals_for(&self, model: &ModelRef) -> Result<Vec<ApprovalRecord>, ApprovalError> {
        self.query(&ApprovalQuery::new().for_model(model))
    }

    /// Loads the record of the actor who proposed `approval`.
    pub fn requestor(&self, approval: &ApprovalRecord) -> Result<Option<Record>, ApprovalError> {
        let Some(creator) = approval.requestor() else {
            return Ok(None);
        };
        if !self.config.is_registered(&creator.kind) {
            return Err(ApprovalError::UnknownModel(creator.kind.clone()));
        }
        self.store.load_record(creator)
    }

    /// Applies `new_data` to the governed record and marks the approval approved.
    pub fn approve(
        &self,
        approval_id: &str,
        actor: Option<&ActorRef>,
    ) -> Result<ApprovalRecord, ApprovalError> {
        let approval = self
            .store
            .transaction(|tx| {
                let mut approval = tx.approval(approval_id)?;
                approval.ensure_pending("approve").map_err(abort)?;

                let removed = apply_change(tx, &approval, approval.change, &approval.new_data)?;

                approval.decide(ApprovalState::Approved, actor);
                if removed.is_some() {
                    approval.record_created_at = removed;
                }
                tx.put_approval(&approval)?;
                Ok(approval)
            })
            .inspect_err(|e| warn!(approval = approval_id, error = %e, "approve failed"))?;

        info!(approval = %approval.id, model = %approval.approvable, actor = ?actor, "approval approved");
        self.notifier.publish(ApprovalEvent::Approved {
            approval: approval.clone(),
            actor: actor.cloned(),
        });
        Ok(approval)
    }

    /// Discards the proposed change. The governed record is left untouched.
    pub fn reject(
        &self,
        approval_id: &str,
        actor: Option<&ActorRef>,
    ) -> Result<ApprovalRecord, ApprovalError> {
        let approval = self
            .store
            .transaction(|tx| {
                let mut approval = tx.approval(approval_id)?;
                approval.ensure_pending("reject").map_err(abort)?;

                approval.decide(ApprovalState::Rejected, actor);
                tx.put_approval(&approval)?;
                Ok(approval)
            })
            .inspect_err(|e| warn!(approval = approval_id, error = %e, "reject failed"))?;

        info!(approval = %approval.id, model = %approval.approvable, actor = ?actor, "approval rejected");
        self.notifier.publish(ApprovalEvent::Rejected {
            approval: approval.clone(),
            actor: actor.cloned(),
        });
        Ok(approval)
    }

    /// Reverts an approved change by writing `original_data` back.
    ///
    /// With `bypass` the approval stays approved, otherwise it returns to
    /// pending so the revert itself awaits a decision. A `condition` that
    /// evaluates false turns the call into a no-op.
    pub fn rollback(
        &self,
        approval_id: &str,
        actor: Option<&ActorRef>,
        condition: Option<&dyn Fn(&ApprovalRecord) -> bool>,
        bypass: bool,
    ) -> Result<RollbackOutcome, ApprovalError> {
        let rolled_back = self
            .store
            .transaction(|tx| {
                let mut approval = tx.approval(approval_id)?;
                approval.ensure_rollbackable().map_err(abort)?;

                if let Some(condition) = condition {
                    if !condition(&approval) {
                        return Ok(None);
                    }
                }

                let removed = apply_change(
                    tx,
                    &approval,
                    approval.change.inverse(),
                    &approval.original_data,
                )?;

                approval.mark_rolled_back(actor, bypass);
                if removed.is_some() {
                    approval.record_created_at = removed;
                }
                tx.put_approval(&approval)?;
                Ok(Some(approval))
            })
            .inspect_err(|e| warn!(approval = approval_id, error = %e, "rollback failed"))?;

        let Some(approval) = rolled_back else {
            debug!(approval = approval_id, "rollback condition not met, skipping");
            return Ok(RollbackOutcome::Skipped);
        };

        info!(
            approval = %approval.id,
            model = %approval.approvable,
            state = %approval.state,
            bypass,
            actor = ?actor,
            "approval rolled back"
        );
        self.notifier.publish(ApprovalEvent::RolledBack {
            approval: approval.clone(),
            actor: actor.cloned(),
        });
        Ok(RollbackOutcome::RolledBack(approval))
    }
}

/// Performs `change` on the governed record using `values`, in a single save.
///
/// A removed record hands back its creation time, which a later re-create
/// restores.
fn apply_change(
    tx: &StoreTx<'_>,
    approval: &ApprovalRecord,
    change: ChangeKind,
    values: &FieldMap,
) -> TxResult<Option<TimeStamp<Utc>>> {
    let model = &approval.approvable;
    match change {
        ChangeKind::Create => {
            let mut record = match tx.record(model)? {
                Some(record) => record,
                None => {
                    let mut record = Record::new(model.clone(), FieldMap::new());
                    if let Some(created_at) = &approval.record_created_at {
                        record.created_at = created_at.clone();
                    }
                    record
                }
            };
            record.apply(values);
            tx.put_record(&record)?;
            Ok(None)
        }
        ChangeKind::Update => {
            let mut record = tx.existing_record(model)?;
            record.apply(values);
            tx.put_record(&record)?;
            Ok(None)
        }
        ChangeKind::Delete => {
            let removed = tx.record(model)?;
            tx.remove_record(model)?;
            Ok(removed.map(|record| record.created_at))
        }
    }
}

impl std::fmt::Debug for ApprovalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalEngine")
            .field("config", &self.config)
            .field("notifier", &self.notifier)
            .finish()
    }
}
