//! Proxy engine capability traits
//!
//! The engine owns protocol handling and the data path. This crate only
//! talks to it through these narrow interfaces.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::descriptor::ListenerDescriptor;
use super::user::MemoryUser;
use crate::error::EngineError;

/// Named, resettable traffic accumulator
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    pub fn add(&self, delta: u64) -> u64 {
        self.value.fetch_add(delta, Ordering::AcqRel) + delta
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Release);
    }

    /// Read and reset in one step; concurrent adds land either in the
    /// returned value or in the next read, never in both.
    pub fn take(&self) -> u64 {
        self.value.swap(0, Ordering::AcqRel)
    }
}

/// Counter registry exposed by the engine
pub trait StatsManager: Send + Sync {
    /// Look up an existing counter
    fn get_counter(&self, name: &str) -> Option<Arc<Counter>>;
    /// Get or create a counter
    fn register_counter(&self, name: &str) -> Arc<Counter>;
    /// Drop a counter; returns whether it existed
    fn unregister_counter(&self, name: &str) -> bool;
}

/// User management capability of an inbound
pub trait UserManager: Send + Sync {
    fn add_user(&self, user: MemoryUser) -> Result<(), EngineError>;
    fn remove_user(&self, email: &str) -> Result<(), EngineError>;
}

/// A running inbound listener
pub trait InboundHandler: Send + Sync {
    fn tag(&self) -> &str;

    /// Only inbounds whose protocol carries accounts expose user management
    fn user_manager(self: Arc<Self>) -> Option<Arc<dyn UserManager>>;
}

/// The proxy engine instance
pub trait ProxyEngine: Send + Sync {
    fn add_inbound(&self, descriptor: &ListenerDescriptor) -> Result<(), EngineError>;

    fn get_handler(&self, tag: &str) -> Result<Arc<dyn InboundHandler>, EngineError>;

    fn stats(&self) -> &dyn StatsManager;
}

/// Hook the data path uses to account traffic per user
pub trait StatsCollector: Send + Sync {
    /// Record upload bytes (client -> remote)
    fn record_upload(&self, email: &str, bytes: u64);
    /// Record download bytes (remote -> client)
    fn record_download(&self, email: &str, bytes: u64);
}
