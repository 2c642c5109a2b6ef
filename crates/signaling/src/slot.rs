//! Session-Slot – hoechstens eine Session pro Prozess
//!
//! Ein Semaphor mit genau einem Permit. Eine Session kann nur mit einem
//! `SessionPermit` gestartet werden; das Permit lebt so lange wie der
//! Session-Task und wird beim Schliessen freigegeben.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct SessionSlot {
    semaphor: Arc<Semaphore>,
}

/// Belegter Slot
#[derive(Debug)]
pub struct SessionPermit {
    _permit: OwnedSemaphorePermit,
}

impl SessionSlot {
    pub fn neu() -> Self {
        Self {
            semaphor: Arc::new(Semaphore::new(1)),
        }
    }

    /// Belegt den Slot ohne zu warten; `None` wenn bereits belegt
    pub fn belegen(&self) -> Option<SessionPermit> {
        Arc::clone(&self.semaphor)
            .try_acquire_owned()
            .ok()
            .map(|permit| SessionPermit { _permit: permit })
    }

    pub fn ist_frei(&self) -> bool {
        self.semaphor.available_permits() > 0
    }
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self::neu()
    }
}
