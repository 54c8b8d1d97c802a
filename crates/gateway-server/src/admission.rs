//! Bounded, non-blocking admission gate (spec §4.5).

use tokio::sync::Semaphore;

/// Caps concurrent driver-touching executions. `try_acquire` never queues:
/// it either returns a permit immediately or reports the gate is full.
pub struct AdmissionGate {
    semaphore: Semaphore,
}

impl AdmissionGate {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Semaphore::new(max_concurrent),
        }
    }

    /// Non-blocking try-acquire. The returned permit releases the slot when
    /// dropped, regardless of which exit path `EXECUTE` takes.
    pub fn try_acquire(&self) -> Option<tokio::sync::SemaphorePermit<'_>> {
        self.semaphore.try_acquire().ok()
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_beyond_capacity() {
        let gate = AdmissionGate::new(2);
        let a = gate.try_acquire();
        let b = gate.try_acquire();
        let c = gate.try_acquire();
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(c.is_none());
    }

    #[test]
    fn releases_on_drop() {
        let gate = AdmissionGate::new(1);
        {
            let _permit = gate.try_acquire().unwrap();
            assert_eq!(gate.available_permits(), 0);
        }
        assert_eq!(gate.available_permits(), 1);
    }
}
