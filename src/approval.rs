//! The persisted approval record and its lifecycle rules
use super::actor::ActorRef;
use super::error::ApprovalError;
use super::snapshot::Snapshot;
use super::types::{FieldMap, ModelRef, TimeStamp};
use super::utils;
use chrono::Utc;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
#[cbor(index_only)]
pub enum ApprovalState {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApprovalState::Pending => "pending",
            ApprovalState::Approved => "approved",
            ApprovalState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// What the proposed write does to the governed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
#[cbor(index_only)]
pub enum ChangeKind {
    #[n(0)]
    Create,
    #[n(1)]
    Update,
    #[n(2)]
    Delete,
}

impl ChangeKind {
    /// The change that undoes this one
    pub fn inverse(self) -> Self {
        match self {
            ChangeKind::Create => ChangeKind::Delete,
            ChangeKind::Update => ChangeKind::Update,
            ChangeKind::Delete => ChangeKind::Create,
        }
    }
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct ApprovalRecord {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7
    #[n(1)]
    pub approvable: ModelRef,
    #[n(2)]
    pub change: ChangeKind,
    #[n(3)]
    pub original_data: FieldMap,
    #[n(4)]
    pub new_data: FieldMap,
    #[n(5)]
    pub state: ApprovalState,
    #[n(6)]
    pub creator: Option<ActorRef>,
    #[n(7)]
    pub approver: Option<ActorRef>,
    #[n(8)]
    pub decided_at: Option<TimeStamp<Utc>>, // last approve or reject
    #[n(9)]
    pub rolled_back_at: Option<TimeStamp<Utc>>,
    #[n(10)]
    pub created_at: TimeStamp<Utc>,
    #[n(11)]
    pub updated_at: TimeStamp<Utc>,
    #[n(12)]
    pub rolled_back: bool, // since the last decision; cleared by approve or reject
    #[n(13)]
    pub record_created_at: Option<TimeStamp<Utc>>, // of a record removed by this approval
}

impl ApprovalRecord {
    /// A fresh pending approval for `snapshot`
    pub fn new(
        approvable: ModelRef,
        change: ChangeKind,
        snapshot: Snapshot,
        creator: Option<ActorRef>,
    ) -> Result<Self, ApprovalError> {
        snapshot.verify()?;

        let now = TimeStamp::new();
        Ok(Self {
            id: utils::new_uuid_to_bech32("approval_")?,
            approvable,
            change,
            original_data: snapshot.original_data,
            new_data: snapshot.new_data,
            state: ApprovalState::Pending,
            creator,
            approver: None,
            decided_at: None,
            rolled_back_at: None,
            created_at: now.clone(),
            updated_at: now,
            rolled_back: false,
            record_created_at: None,
        })
    }

    pub fn approvable_type(&self) -> &str {
        &self.approvable.kind
    }
    pub fn approvable_id(&self) -> &str {
        &self.approvable.id
    }
    pub fn creator_id(&self) -> Option<&str> {
        self.creator.as_ref().map(|c| c.id.as_str())
    }

    /// Who proposed this change, if anyone was authenticated at the time
    pub fn requestor(&self) -> Option<&ActorRef> {
        self.creator.as_ref()
    }
    pub fn was_requested_by(&self, actor: &ActorRef) -> bool {
        self.creator.as_ref() == Some(actor)
    }

    /// True when the approved effect was reverted and not approved again since.
    pub fn is_rolled_back(&self) -> bool {
        self.rolled_back
    }

    pub(crate) fn ensure_pending(&self, action: &'static str) -> Result<(), ApprovalError> {
        if self.state != ApprovalState::Pending {
            return Err(self.illegal(action));
        }
        Ok(())
    }

    pub(crate) fn ensure_rollbackable(&self) -> Result<(), ApprovalError> {
        if self.state != ApprovalState::Approved || self.is_rolled_back() {
            return Err(self.illegal("roll back"));
        }
        Ok(())
    }

    fn illegal(&self, action: &'static str) -> ApprovalError {
        ApprovalError::IllegalTransition {
            id: self.id.clone(),
            action,
            state: self.state,
        }
    }

    /// Records an approve or reject decision
    pub(crate) fn decide(&mut self, state: ApprovalState, actor: Option<&ActorRef>) {
        let now = TimeStamp::new();
        self.state = state;
        self.approver = actor.cloned();
        self.decided_at = Some(now.clone());
        self.rolled_back = false;
        self.updated_at = now;
    }

    /// Marks the approved effect as reverted. The snapshot is swapped so that
    /// `new_data` now describes the reverted content.
    pub(crate) fn mark_rolled_back(&mut self, actor: Option<&ActorRef>, bypass: bool) {
        let now = TimeStamp::new();
        std::mem::swap(&mut self.original_data, &mut self.new_data);
        self.change = self.change.inverse();
        self.approver = actor.cloned();
        self.rolled_back_at = Some(now.clone());
        self.rolled_back = true;
        self.updated_at = now;

        if !bypass {
            self.state = ApprovalState::Pending;
        }
    }
}

/// Filter over stored approvals. Every set criterion must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApprovalQuery {
    requested_by: Option<ActorRef>,
    approvable: Option<ModelRef>,
    state: Option<ApprovalState>,
}

impl ApprovalQuery {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn requested_by(mut self, actor: &ActorRef) -> Self {
        self.requested_by = Some(actor.clone());
        self
    }
    pub fn for_model(mut self, model: &ModelRef) -> Self {
        self.approvable = Some(model.clone());
        self
    }
    pub fn state(mut self, state: ApprovalState) -> Self {
        self.state = Some(state);
        self
    }
    pub fn pending(self) -> Self {
        self.state(ApprovalState::Pending)
    }
    pub fn approved(self) -> Self {
        self.state(ApprovalState::Approved)
    }
    pub fn rejected(self) -> Self {
        self.state(ApprovalState::Rejected)
    }
    pub fn matches(&self, approval: &ApprovalRecord) -> bool {
        if let Some(actor) = &self.requested_by {
            if !approval.was_requested_by(actor) {
                return false;
            }
        }
        if let Some(model) = &self.approvable {
            if approval.approvable != *model {
                return false;
            }
        }
        if let Some(state) = self.state {
            if approval.state != state {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;

    fn pending(creator: Option<ActorRef>) -> ApprovalRecord {
        let snapshot = Snapshot::new(
            [("name", json!("Bob"))].into_iter().collect(),
            [("name", json!("Chris"))].into_iter().collect(),
        )
        .unwrap();
        ApprovalRecord::new(
            ModelRef::new("fake_model", "1"),
            ChangeKind::Update,
            snapshot,
            creator,
        )
        .unwrap()
    }

    #[test]
    fn new_approvals_start_pending() {
        let approval = pending(None);

        assert_eq!(approval.state, ApprovalState::Pending);
        assert!(approval.id.starts_with("approval_"));
        assert_eq!(approval.approvable_type(), "fake_model");
        assert_eq!(approval.approvable_id(), "1");
        assert!(approval.approver.is_none());
        assert!(!approval.is_rolled_back());
    }

    #[test]
    fn state_is_stored_as_small_code() {
        assert_eq!(minicbor::to_vec(ApprovalState::Rejected).unwrap(), [0x02]);
    }

    #[test]
    fn record_encoding() {
        let approval = pending(Some(ModelRef::new("user", "7")));

        let encoding = minicbor::to_vec(&approval).unwrap();
        let decode: ApprovalRecord = minicbor::decode(&encoding).unwrap();

        assert_eq!(approval, decode);
    }

    #[test]
    fn decisions_only_from_pending() {
        let mut approval = pending(None);
        assert!(approval.ensure_pending("approve").is_ok());

        approval.decide(ApprovalState::Rejected, None);

        let err = approval.ensure_pending("approve").unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::IllegalTransition {
                state: ApprovalState::Rejected,
                ..
            }
        ));
        assert!(approval.ensure_rollbackable().is_err());
    }

    #[test]
    fn rollback_swaps_snapshot_and_is_single_shot() {
        let mut approval = pending(None);
        approval.decide(ApprovalState::Approved, None);
        assert!(approval.ensure_rollbackable().is_ok());

        approval.mark_rolled_back(None, true);

        assert_eq!(approval.state, ApprovalState::Approved);
        assert_eq!(approval.new_data.get("name"), Some(&json!("Bob")));
        assert_eq!(approval.original_data.get("name"), Some(&json!("Chris")));
        assert!(approval.is_rolled_back());
        assert!(approval.ensure_rollbackable().is_err());
    }

    #[test]
    fn re_approval_allows_another_rollback() {
        let mut approval = pending(None);
        approval.decide(ApprovalState::Approved, None);
        approval.mark_rolled_back(None, false);
        assert_eq!(approval.state, ApprovalState::Pending);

        approval.decide(ApprovalState::Approved, None);

        assert!(!approval.is_rolled_back());
        assert!(approval.rolled_back_at.is_some());
        assert!(approval.ensure_rollbackable().is_ok());
    }

    #[test]
    fn rollback_guard_ignores_clock_steps() {
        let mut approval = pending(None);
        approval.decide(ApprovalState::Approved, None);

        // decision stamped an hour ahead, as after the clock stepped back
        let ahead = approval.created_at.to_datetime_utc() + TimeDelta::hours(1);
        approval.decided_at = Some(TimeStamp::from(ahead));
        approval.mark_rolled_back(None, true);

        assert!(approval.rolled_back_at < approval.decided_at);
        assert!(approval.is_rolled_back());
        assert!(approval.ensure_rollbackable().is_err());

        let encoding = minicbor::to_vec(&approval).unwrap();
        let decode: ApprovalRecord = minicbor::decode(&encoding).unwrap();
        assert!(decode.is_rolled_back());
    }

    #[test]
    fn inverse_change_kinds() {
        assert_eq!(ChangeKind::Create.inverse(), ChangeKind::Delete);
        assert_eq!(ChangeKind::Delete.inverse(), ChangeKind::Create);
        assert_eq!(ChangeKind::Update.inverse(), ChangeKind::Update);
    }

    #[test]
    fn query_filters_combine() {
        let user1 = ModelRef::new("user", "1");
        let user2 = ModelRef::new("user", "2");
        let approval = pending(Some(user1.clone()));

        assert!(ApprovalQuery::new().matches(&approval));
        assert!(ApprovalQuery::new().requested_by(&user1).pending().matches(&approval));
        assert!(!ApprovalQuery::new().requested_by(&user2).matches(&approval));
        assert!(!ApprovalQuery::new().approved().matches(&approval));
        assert!(
            !ApprovalQuery::new()
                .for_model(&ModelRef::new("fake_model", "2"))
                .matches(&approval)
        );
        assert!(approval.was_requested_by(&user1));
        assert!(!approval.was_requested_by(&user2));
        assert!(!pending(None).was_requested_by(&user1));
    }
}
