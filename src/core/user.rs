//! User identity and account model

use std::fmt;

/// User ID type used throughout the system.
/// Using i64 for consistency with the panel API layer.
pub type UserId = i64;

/// Stable logical identity of a panel user.
///
/// Equality and hashing are by value, so two fetches of the same user
/// always compare equal regardless of where the records were allocated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserIdentity {
    pub id: UserId,
    pub secret: String,
}

impl UserIdentity {
    pub fn new(id: UserId, secret: impl Into<String>) -> Self {
        Self {
            id,
            secret: secret.into(),
        }
    }

    /// Engine-side key (the "email") scoped to one listener.
    ///
    /// `tag` never contains `|` and `id` is numeric, so the key is injective.
    pub fn key(&self, tag: &str) -> String {
        format!("{}|{}|{}", tag, self.id, self.secret)
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Shadowsocks cipher understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherKind {
    Aes128Gcm,
    Aes256Gcm,
    Chacha20Poly1305,
    None,
    Unknown,
}

impl CipherKind {
    /// Map a panel cipher name, accepting the common aliases
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "aes-128-gcm" | "aead_aes_128_gcm" => CipherKind::Aes128Gcm,
            "aes-256-gcm" | "aead_aes_256_gcm" => CipherKind::Aes256Gcm,
            "chacha20-poly1305" | "aead_chacha20_poly1305" | "chacha20-ietf-poly1305" => {
                CipherKind::Chacha20Poly1305
            }
            "none" | "plain" => CipherKind::None,
            _ => CipherKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CipherKind::Aes128Gcm => "aes-128-gcm",
            CipherKind::Aes256Gcm => "aes-256-gcm",
            CipherKind::Chacha20Poly1305 => "chacha20-poly1305",
            CipherKind::None => "none",
            CipherKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user as applied to one listener for one sync cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub identity: UserIdentity,
    pub cipher: CipherKind,
}

impl UserRecord {
    pub fn new(identity: UserIdentity, cipher: CipherKind) -> Self {
        Self { identity, cipher }
    }
}

/// Account handed to the engine's user manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryUser {
    pub email: String,
    pub password: String,
    pub cipher: CipherKind,
    pub level: u32,
}

impl MemoryUser {
    pub fn from_record(tag: &str, record: &UserRecord) -> Self {
        Self {
            email: record.identity.key(tag),
            password: record.identity.secret.clone(),
            cipher: record.cipher,
            level: 0,
        }
    }
}

/// Traffic direction of a per-user counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Uplink,
    Downlink,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::Uplink => "uplink",
            Direction::Downlink => "downlink",
        }
    }
}

/// Counter name for one user and direction
pub fn counter_name(email: &str, direction: Direction) -> String {
    format!("user>>>{}>>>traffic>>>{}", email, direction.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_value_equality() {
        let a = UserIdentity::new(1, String::from("a"));
        let b = UserIdentity::new(1, "a".to_string());
        assert_eq!(a, b);

        let set: HashSet<UserIdentity> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_identity_key() {
        let identity = UserIdentity::new(42, "2bd334f9-fbc9");
        assert_eq!(identity.key("shadowsocks_8388"), "shadowsocks_8388|42|2bd334f9-fbc9");
    }

    #[test]
    fn test_identity_key_distinguishes_tokens_and_ids() {
        let tag = "shadowsocks_443";
        let keys: HashSet<String> = [
            UserIdentity::new(1, "a"),
            UserIdentity::new(1, "z"),
            UserIdentity::new(11, "a"),
            UserIdentity::new(1, "1|a"),
        ]
        .iter()
        .map(|i| i.key(tag))
        .collect();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_cipher_aliases() {
        assert_eq!(CipherKind::from_name("AES-128-GCM"), CipherKind::Aes128Gcm);
        assert_eq!(CipherKind::from_name("aead_aes_256_gcm"), CipherKind::Aes256Gcm);
        assert_eq!(
            CipherKind::from_name("chacha20-ietf-poly1305"),
            CipherKind::Chacha20Poly1305
        );
        assert_eq!(CipherKind::from_name("plain"), CipherKind::None);
        assert_eq!(CipherKind::from_name("rc4-md5"), CipherKind::Unknown);
    }

    #[test]
    fn test_counter_names() {
        let email = "shadowsocks_443|1|a";
        assert_eq!(
            counter_name(email, Direction::Uplink),
            "user>>>shadowsocks_443|1|a>>>traffic>>>uplink"
        );
        assert_eq!(
            counter_name(email, Direction::Downlink),
            "user>>>shadowsocks_443|1|a>>>traffic>>>downlink"
        );
    }

    #[test]
    fn test_memory_user_from_record() {
        let record = UserRecord::new(UserIdentity::new(3, "pw"), CipherKind::Aes256Gcm);
        let user = MemoryUser::from_record("shadowsocks_443", &record);
        assert_eq!(user.email, "shadowsocks_443|3|pw");
        assert_eq!(user.password, "pw");
        assert_eq!(user.cipher, CipherKind::Aes256Gcm);
        assert_eq!(user.level, 0);
    }
}
