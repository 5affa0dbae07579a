//! Panel wire models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{UserId, UserIdentity};

/// Node settings served by the panel, fetched once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub server_port: u16,
    pub cipher: String,
}

/// One authorized user as served by the panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    pub uuid: String,
}

impl From<&UserInfo> for UserIdentity {
    fn from(u: &UserInfo) -> Self {
        UserIdentity::new(u.id, u.uuid.clone())
    }
}

/// A body without `users` is an error reply, never an empty list
#[derive(Debug, Deserialize)]
pub(crate) struct UsersResponse {
    pub users: Vec<UserInfo>,
}

/// Per-user traffic since the previous collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTraffic {
    pub user_id: UserId,
    /// Upload bytes
    pub u: u64,
    /// Download bytes
    pub d: u64,
}

impl UserTraffic {
    pub fn new(user_id: UserId, upload: u64, download: u64) -> Self {
        Self {
            user_id,
            u: upload,
            d: download,
        }
    }
}

/// Push body: `{"<uid>": [upload, download]}`
pub(crate) fn push_body(data: &[UserTraffic]) -> BTreeMap<UserId, [u64; 2]> {
    let mut body: BTreeMap<UserId, [u64; 2]> = BTreeMap::new();
    for t in data {
        let entry = body.entry(t.user_id).or_insert([0, 0]);
        entry[0] += t.u;
        entry[1] += t.d;
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_info_ignores_extra_fields() {
        let raw = r#"{"server_port":8388,"cipher":"aes-256-gcm","obfs":null,"base_config":{"push_interval":60}}"#;
        let node: NodeInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(node.server_port, 8388);
        assert_eq!(node.cipher, "aes-256-gcm");
    }

    #[test]
    fn test_users_response_parse() {
        let raw = r#"{"users":[{"id":1,"uuid":"a","speed_limit":null},{"id":2,"uuid":"b"}]}"#;
        let parsed: UsersResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.users.len(), 2);
        assert_eq!(UserIdentity::from(&parsed.users[1]), UserIdentity::new(2, "b"));
    }

    #[test]
    fn test_users_response_requires_list() {
        assert!(serde_json::from_str::<UsersResponse>("{}").is_err());
        assert!(serde_json::from_str::<UsersResponse>(r#"{"message":"token is error"}"#).is_err());

        let parsed: UsersResponse = serde_json::from_str(r#"{"users":[]}"#).unwrap();
        assert!(parsed.users.is_empty());
    }

    #[test]
    fn test_push_body_shape() {
        let body = push_body(&[UserTraffic::new(2, 10, 20), UserTraffic::new(1, 100, 50)]);
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"1":[100,50],"2":[10,20]}"#);
    }

    #[test]
    fn test_push_body_merges_duplicate_users() {
        let body = push_body(&[UserTraffic::new(1, 1, 2), UserTraffic::new(1, 3, 4)]);
        assert_eq!(body.get(&1), Some(&[4, 6]));
    }
}
