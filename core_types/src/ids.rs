//! Unique identifiers for system entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an execution context
///
/// Execution contexts are independently scheduled units (the driver-facing
/// relays and the network stack are each one). IPC names its peers by
/// `EnvId`; a stale or unknown id is rejected by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnvId(Uuid);

impl EnvId {
    /// Creates a new random context ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a context ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// First eight hex digits of the id, as shown in log lines
    pub fn short(&self) -> String {
        let mut buf = Uuid::encode_buffer();
        self.0.simple().encode_lower(&mut buf)[..8].to_string()
    }
}

impl Default for EnvId {
    fn default() -> Self {
        Self::new()
    }
}

/// `Env(1a2b3c4d)` normally; `{:#}` prints the full UUID.
impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "Env({})", self.0)
        } else {
            write!(f, "Env({})", self.short())
        }
    }
}

impl FromStr for EnvId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_id_creation() {
        let id1 = EnvId::new();
        let id2 = EnvId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_env_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = EnvId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn test_env_id_display() {
        let id = EnvId::new();
        let display = format!("{}", id);
        assert!(display.starts_with("Env("));
        assert_eq!(display.len(), "Env()".len() + 8);
    }

    #[test]
    fn test_env_id_short_and_alternate_display() {
        let uuid = Uuid::parse_str("1a2b3c4d-0000-4000-8000-00000000beef").unwrap();
        let id = EnvId::from_uuid(uuid);

        assert_eq!(id.short(), "1a2b3c4d");
        assert_eq!(id.to_string(), "Env(1a2b3c4d)");
        assert_eq!(
            format!("{:#}", id),
            "Env(1a2b3c4d-0000-4000-8000-00000000beef)"
        );
    }

    #[test]
    fn test_env_id_parse() {
        let id = EnvId::new();
        let parsed: EnvId = id.as_uuid().to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-an-env".parse::<EnvId>().is_err());
    }

    #[test]
    fn test_env_id_serde_roundtrip() {
        let id = EnvId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: EnvId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
