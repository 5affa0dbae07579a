//! Engine adapter scoped to one listener

use std::sync::Arc;

use crate::core::{counter_name, Direction, MemoryUser, ProxyEngine, UserManager, UserRecord};
use crate::error::EngineError;

/// User and counter operations against a single inbound tag.
///
/// Construction resolves the user-management capability once, so a
/// listener whose protocol carries no accounts fails here instead of on
/// every call.
pub struct ProxyEngineAdapter {
    tag: String,
    engine: Arc<dyn ProxyEngine>,
    users: Arc<dyn UserManager>,
}

impl ProxyEngineAdapter {
    pub fn new(engine: Arc<dyn ProxyEngine>, tag: &str) -> Result<Self, EngineError> {
        let handler = engine.get_handler(tag)?;
        let users = handler
            .user_manager()
            .ok_or_else(|| EngineError::NotUserManager(tag.to_string()))?;
        Ok(Self {
            tag: tag.to_string(),
            engine,
            users,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn add_user(&self, record: &UserRecord) -> Result<(), EngineError> {
        self.users.add_user(MemoryUser::from_record(&self.tag, record))
    }

    /// Remove the account and drop its traffic counters.
    ///
    /// Counters are dropped whenever the account is gone from the engine,
    /// including when it was already missing.
    pub fn remove_user(&self, email: &str) -> Result<(), EngineError> {
        let result = self.users.remove_user(email);
        if matches!(result, Ok(()) | Err(EngineError::UserNotFound(_))) {
            let stats = self.engine.stats();
            for direction in [Direction::Uplink, Direction::Downlink] {
                stats.unregister_counter(&counter_name(email, direction));
            }
        }
        result
    }

    /// Current value, `None` when the counter was never created
    pub fn get_counter(&self, name: &str) -> Option<u64> {
        self.engine.stats().get_counter(name).map(|c| c.value())
    }

    pub fn reset_counter(&self, name: &str) {
        if let Some(counter) = self.engine.stats().get_counter(name) {
            counter.set(0);
        }
    }

    /// Read and reset atomically; a missing counter reads as zero
    pub fn take_counter(&self, name: &str) -> u64 {
        self.engine
            .stats()
            .get_counter(name)
            .map(|c| c.take())
            .unwrap_or(0)
    }
}
