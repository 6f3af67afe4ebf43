//! Lifecycle events published by the engine
use super::actor::ActorRef;
use super::approval::ApprovalRecord;
use std::sync::{Arc, Mutex, PoisonError, mpsc};

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalEvent {
    /// A write was deferred and is now awaiting a decision
    Created {
        approval: ApprovalRecord,
        actor: Option<ActorRef>,
    },
    Approved {
        approval: ApprovalRecord,
        actor: Option<ActorRef>,
    },
    Rejected {
        approval: ApprovalRecord,
        actor: Option<ActorRef>,
    },
    RolledBack {
        approval: ApprovalRecord,
        actor: Option<ActorRef>, // None for unattended rollbacks
    },
}

impl ApprovalEvent {
    pub fn approval(&self) -> &ApprovalRecord {
        match self {
            ApprovalEvent::Created { approval, .. }
            | ApprovalEvent::Approved { approval, .. }
            | ApprovalEvent::Rejected { approval, .. }
            | ApprovalEvent::RolledBack { approval, .. } => approval,
        }
    }
    pub fn actor(&self) -> Option<&ActorRef> {
        match self {
            ApprovalEvent::Created { actor, .. }
            | ApprovalEvent::Approved { actor, .. }
            | ApprovalEvent::Rejected { actor, .. }
            | ApprovalEvent::RolledBack { actor, .. } => actor.as_ref(),
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            ApprovalEvent::Created { .. } => "created",
            ApprovalEvent::Approved { .. } => "approved",
            ApprovalEvent::Rejected { .. } => "rejected",
            ApprovalEvent::RolledBack { .. } => "rolled_back",
        }
    }
}

type Subscriber = Arc<dyn Fn(&ApprovalEvent) + Send + Sync>;

/// In-process subscriber list. Delivery is synchronous, in subscription order.
///
/// Subscribers run without the list locked, so they may call back into the
/// engine or subscribe further listeners. A subscriber added while an event is
/// being delivered sees the next event, not the current one.
#[derive(Default)]
pub struct EventNotifier {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn subscribe(&self, subscriber: impl Fn(&ApprovalEvent) + Send + Sync + 'static) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(subscriber));
    }
    /// Subscribes a channel. Events are dropped once the receiver is gone.
    pub fn channel(&self) -> mpsc::Receiver<ApprovalEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }
    pub fn publish(&self, event: ApprovalEvent) {
        tracing::debug!(event = event.name(), approval = %event.approval().id, "publishing approval event");

        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for subscriber in &subscribers {
            subscriber(&event);
        }
    }
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .subscribers
            .lock()
            .map(|s| s.len())
            .unwrap_or_default();
        f.debug_struct("EventNotifier")
            .field("subscribers", &count)
            .finish()
    }
}
