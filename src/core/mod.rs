//! Engine-facing core
//!
//! - User identity and account model
//! - Listener descriptor types
//! - Capability traits of the proxy engine
//! - In-process engine registry

pub mod descriptor;
pub mod engine;
pub mod memory;
pub mod user;

pub use descriptor::ListenerDescriptor;
pub use engine::{Counter, InboundHandler, ProxyEngine, StatsCollector, StatsManager, UserManager};
pub use memory::{MemoryEngine, MemoryInbound, SHADOWSOCKS};
pub use user::{counter_name, CipherKind, Direction, MemoryUser, UserId, UserIdentity, UserRecord};
