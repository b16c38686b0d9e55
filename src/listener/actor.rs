//! Who is responsible for the mutation being audited

use std::sync::RwLock;

use tracing::error;

use crate::audit::Actor;
use crate::error::{AuditError, AuditResult};

/// Supplies the actor for entries created during the current request
pub trait ActorProvider: Send + Sync {
    /// `None` means anonymous or system
    fn current_actor(&self) -> Option<Actor>;
}

/// Every change is attributed to the system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemActor;

impl ActorProvider for SystemActor {
    fn current_actor(&self) -> Option<Actor> {
        None
    }
}

/// Actor set by the host around each request
#[derive(Debug, Default)]
pub struct SessionActor {
    current: RwLock<Option<Actor>>,
}

impl SessionActor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, actor: Actor) -> AuditResult<()> {
        self.replace(Some(actor))
    }

    pub fn clear(&self) -> AuditResult<()> {
        self.replace(None)
    }

    fn replace(&self, actor: Option<Actor>) -> AuditResult<()> {
        let mut current = self.current.write().map_err(|e| {
            AuditError::Config(format!("Failed to acquire session actor lock: {}", e))
        })?;
        *current = actor;
        Ok(())
    }
}

impl ActorProvider for SessionActor {
    fn current_actor(&self) -> Option<Actor> {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(e) => {
                error!(error = %e, "session actor lock poisoned; attributing to system");
                None
            }
        }
    }
}
