//! Resolution of the actor behind a write or a decision
use super::types::ModelRef;
use std::sync::{PoisonError, RwLock};

/// Polymorphic reference to whoever proposes or decides a change.
pub type ActorRef = ModelRef;

/// Source of the "current actor". Absence of an actor is never an error.
pub trait ActorResolver {
    fn current_actor(&self) -> Option<ActorRef>;
}

impl ActorResolver for Option<ActorRef> {
    fn current_actor(&self) -> Option<ActorRef> {
        self.clone()
    }
}

impl ActorResolver for ActorRef {
    fn current_actor(&self) -> Option<ActorRef> {
        Some(self.clone())
    }
}

/// Unauthenticated context, used for system triggered writes
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl ActorResolver for Anonymous {
    fn current_actor(&self) -> Option<ActorRef> {
        None
    }
}

/// Mutable login state shared by the writes of one request or session.
#[derive(Debug, Default)]
pub struct Session {
    actor: RwLock<Option<ActorRef>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }
    /// Authenticates as `actor` for every following write
    pub fn be(&self, actor: ActorRef) {
        *self.actor.write().unwrap_or_else(PoisonError::into_inner) = Some(actor);
    }
    pub fn logout(&self) {
        *self.actor.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl ActorResolver for Session {
    fn current_actor(&self) -> Option<ActorRef> {
        self.actor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_tracks_login() {
        let session = Session::new();
        assert_eq!(session.current_actor(), None);

        let user = ModelRef::new("user", "1");
        session.be(user.clone());
        assert_eq!(session.current_actor(), Some(user));

        session.logout();
        assert_eq!(session.current_actor(), None);
    }

    #[test]
    fn explicit_actors_resolve_to_themselves() {
        let user = ModelRef::new("user", "1");
        assert_eq!(user.current_actor(), Some(user.clone()));
        assert_eq!(Some(user.clone()).current_actor(), Some(user));
        assert_eq!(Anonymous.current_actor(), None);
    }
}
