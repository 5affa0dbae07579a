//! In-process engine registry
//!
//! Holds inbounds, their user tables and the named traffic counters. The
//! data path authenticates against the user tables and feeds counters
//! through [`StatsCollector`].

use dashmap::DashMap;
use std::sync::Arc;

use super::descriptor::{ListenerDescriptor, ShadowsocksSettings};
use super::engine::{
    Counter, InboundHandler, ProxyEngine, StatsCollector, StatsManager, UserManager,
};
use super::user::{counter_name, CipherKind, Direction, MemoryUser};
use crate::error::EngineError;

/// Protocol name of inbounds that carry user accounts
pub const SHADOWSOCKS: &str = "shadowsocks";

/// Shadowsocks inbound with a mutable user table
#[derive(Debug)]
pub struct MemoryInbound {
    tag: String,
    /// Accounts from the descriptor, never addressed by email
    default_clients: Vec<MemoryUser>,
    /// email -> account
    users: DashMap<String, MemoryUser>,
}

impl MemoryInbound {
    fn new(tag: &str, settings: ShadowsocksSettings) -> Self {
        let default_clients = settings
            .clients
            .into_iter()
            .map(|c| MemoryUser {
                email: String::new(),
                password: c.password,
                cipher: CipherKind::from_name(&c.cipher),
                level: c.level,
            })
            .collect();
        Self {
            tag: tag.to_string(),
            default_clients,
            users: DashMap::new(),
        }
    }

    pub fn contains(&self, email: &str) -> bool {
        self.users.contains_key(email)
    }

    /// Sorted emails of the managed users
    pub fn emails(&self) -> Vec<String> {
        let mut emails: Vec<String> = self.users.iter().map(|e| e.key().clone()).collect();
        emails.sort();
        emails
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn default_client_count(&self) -> usize {
        self.default_clients.len()
    }
}

impl UserManager for MemoryInbound {
    fn add_user(&self, user: MemoryUser) -> Result<(), EngineError> {
        if user.cipher == CipherKind::Unknown {
            return Err(EngineError::InvalidAccount {
                email: user.email,
                reason: "unknown cipher type".to_string(),
            });
        }
        if user.password.is_empty() {
            return Err(EngineError::InvalidAccount {
                email: user.email,
                reason: "empty password".to_string(),
            });
        }

        match self.users.entry(user.email.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(EngineError::UserExists(user.email)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(user);
                Ok(())
            }
        }
    }

    fn remove_user(&self, email: &str) -> Result<(), EngineError> {
        self.users
            .remove(email)
            .map(|_| ())
            .ok_or_else(|| EngineError::UserNotFound(email.to_string()))
    }
}

impl InboundHandler for MemoryInbound {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn user_manager(self: Arc<Self>) -> Option<Arc<dyn UserManager>> {
        Some(self)
    }
}

/// Inbound for protocols without accounts (e.g. dokodemo-door)
#[derive(Debug)]
pub struct PlainInbound {
    tag: String,
}

impl InboundHandler for PlainInbound {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn user_manager(self: Arc<Self>) -> Option<Arc<dyn UserManager>> {
        None
    }
}

#[derive(Debug, Clone)]
enum Inbound {
    Shadowsocks(Arc<MemoryInbound>),
    Plain(Arc<PlainInbound>),
}

/// Engine registry shared by the control plane and the data path
#[derive(Debug, Default)]
pub struct MemoryEngine {
    inbounds: DashMap<String, Inbound>,
    counters: DashMap<String, Arc<Counter>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete shadowsocks inbound by tag
    pub fn inbound(&self, tag: &str) -> Option<Arc<MemoryInbound>> {
        match self.inbounds.get(tag)?.value() {
            Inbound::Shadowsocks(inbound) => Some(Arc::clone(inbound)),
            Inbound::Plain(_) => None,
        }
    }

    pub fn inbound_count(&self) -> usize {
        self.inbounds.len()
    }

    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }
}

impl StatsManager for MemoryEngine {
    fn get_counter(&self, name: &str) -> Option<Arc<Counter>> {
        self.counters.get(name).map(|c| Arc::clone(c.value()))
    }

    fn register_counter(&self, name: &str) -> Arc<Counter> {
        Arc::clone(self.counters.entry(name.to_string()).or_default().value())
    }

    fn unregister_counter(&self, name: &str) -> bool {
        self.counters.remove(name).is_some()
    }
}

impl ProxyEngine for MemoryEngine {
    fn add_inbound(&self, descriptor: &ListenerDescriptor) -> Result<(), EngineError> {
        if self.inbounds.contains_key(&descriptor.tag) {
            return Err(EngineError::DuplicateInbound(descriptor.tag.clone()));
        }

        let inbound = if descriptor.protocol == SHADOWSOCKS {
            let settings: ShadowsocksSettings = serde_json::from_value(descriptor.settings.clone())
                .map_err(|e| EngineError::InvalidAccount {
                    email: descriptor.tag.clone(),
                    reason: format!("malformed shadowsocks settings: {}", e),
                })?;
            if settings.clients.is_empty() {
                return Err(EngineError::InvalidAccount {
                    email: descriptor.tag.clone(),
                    reason: "shadowsocks inbound needs at least one client".to_string(),
                });
            }
            Inbound::Shadowsocks(Arc::new(MemoryInbound::new(&descriptor.tag, settings)))
        } else {
            Inbound::Plain(Arc::new(PlainInbound {
                tag: descriptor.tag.clone(),
            }))
        };

        self.inbounds.insert(descriptor.tag.clone(), inbound);
        Ok(())
    }

    fn get_handler(&self, tag: &str) -> Result<Arc<dyn InboundHandler>, EngineError> {
        let inbound = self
            .inbounds
            .get(tag)
            .ok_or_else(|| EngineError::UnknownInbound(tag.to_string()))?;
        Ok(match inbound.value() {
            Inbound::Shadowsocks(h) => Arc::clone(h) as Arc<dyn InboundHandler>,
            Inbound::Plain(h) => Arc::clone(h) as Arc<dyn InboundHandler>,
        })
    }

    fn stats(&self) -> &dyn StatsManager {
        self
    }
}

impl StatsCollector for MemoryEngine {
    fn record_upload(&self, email: &str, bytes: u64) {
        self.register_counter(&counter_name(email, Direction::Uplink))
            .add(bytes);
    }

    fn record_download(&self, email: &str, bytes: u64) {
        self.register_counter(&counter_name(email, Direction::Downlink))
            .add(bytes);
    }
}
