use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::AppointmentError;

/// Per-doctor scheduling locks.
///
/// Bookings for one doctor are serialized across the check and the write;
/// different doctors never wait on each other.
pub struct DoctorLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
    timeout: Duration,
}

impl DoctorLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Duration::from_millis(config.booking_lock_timeout_ms))
    }

    /// Waits for the doctor's lock, giving up after the configured timeout.
    pub async fn acquire(&self, doctor_id: Uuid) -> Result<OwnedMutexGuard<()>, AppointmentError> {
        let lock = self.lock_for(doctor_id)?;

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => {
                debug!("Scheduling lock acquired for doctor {}", doctor_id);
                Ok(guard)
            }
            Err(_) => {
                warn!("Timed out waiting for scheduling lock of doctor {}", doctor_id);
                Err(AppointmentError::StoreFailure(format!(
                    "Timed out waiting for scheduling lock of doctor {}",
                    doctor_id
                )))
            }
        }
    }

    fn lock_for(&self, doctor_id: Uuid) -> Result<Arc<AsyncMutex<()>>, AppointmentError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| AppointmentError::StoreFailure("Scheduling lock table poisoned".to_string()))?;

        // Drop entries nobody is holding or waiting on.
        locks.retain(|id, lock| *id == doctor_id || Arc::strong_count(lock) > 1);

        Ok(locks.entry(doctor_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone())
    }

    pub fn tracked_doctors(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn second_holder_times_out() {
        let locks = DoctorLocks::new(Duration::from_millis(20));
        let doctor = Uuid::new_v4();

        let _held = locks.acquire(doctor).await.unwrap();
        assert_matches!(locks.acquire(doctor).await, Err(AppointmentError::StoreFailure(_)));
    }

    #[tokio::test]
    async fn doctors_do_not_share_locks() {
        let locks = DoctorLocks::new(Duration::from_millis(20));

        let _first = locks.acquire(Uuid::new_v4()).await.unwrap();
        assert!(locks.acquire(Uuid::new_v4()).await.is_ok());
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let locks = DoctorLocks::new(Duration::from_millis(20));

        for _ in 0..5 {
            let guard = locks.acquire(Uuid::new_v4()).await.unwrap();
            drop(guard);
        }
        let _last = locks.acquire(Uuid::new_v4()).await.unwrap();

        assert_eq!(locks.tracked_doctors(), 1);
    }
}
