use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::alert::AlertKey;

/// One async lock per alert key so that concurrent scans serialize their
/// transitions for the same key while different keys proceed in parallel.
#[derive(Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<AlertKey, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &AlertKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            slots.entry(key.clone()).or_default().clone()
        };
        slot.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::KeyLocks;
    use crate::alert::{AlertKey, AlertType};

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let key = AlertKey::new("CHIP-X", AlertType::CriticalStock);
        let guard = locks.acquire(&key).await;

        let contender = {
            let locks = Arc::clone(&locks);
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&key).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.slots.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _low = locks.acquire(&AlertKey::new("PWR-MOD", AlertType::LowStock)).await;
        let delayed = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&AlertKey::new("PWR-MOD", AlertType::DelayedShipment)),
        )
        .await;
        assert!(delayed.is_ok());
        assert_eq!(locks.slots.lock().unwrap().len(), 2);
    }
}
