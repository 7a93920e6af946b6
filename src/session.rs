//! Who is logged in on this device. Lives outside the reload cycle and
//! survives restarts through device storage.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{model::Member, storage::DeviceStorage};

pub const CURRENT_USER_KEY: &str = "smalltalk-current-user";

#[derive(Clone)]
pub struct Session {
    storage: Arc<dyn DeviceStorage>,
    current: Arc<RwLock<Option<Member>>>,
}

impl Session {
    /// Restores the persisted member, if any. An unreadable entry is dropped.
    pub fn restore(storage: Arc<dyn DeviceStorage>) -> Self {
        let current = match storage.get(CURRENT_USER_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Member>(&json) {
                Ok(member) => {
                    debug!(member_id = member.id, "session restored");
                    Some(member)
                }
                Err(e) => {
                    warn!(error = %e, "failed to restore current user");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "failed to read session entry");
                None
            }
        };

        Self {
            storage,
            current: Arc::new(RwLock::new(current)),
        }
    }

    pub async fn current(&self) -> Option<Member> {
        self.current.read().await.clone()
    }

    pub async fn login(&self, member: Member) {
        match serde_json::to_string(&member) {
            Ok(json) => {
                if let Err(e) = self.storage.set(CURRENT_USER_KEY, &json) {
                    warn!(error = %e, "failed to persist session");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize session member"),
        }
        *self.current.write().await = Some(member);
    }

    pub async fn logout(&self) {
        if let Err(e) = self.storage.remove(CURRENT_USER_KEY) {
            warn!(error = %e, "failed to clear session entry");
        }
        *self.current.write().await = None;
    }
}
