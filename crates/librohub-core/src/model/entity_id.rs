// ── Core identity type ──
//
// Every library row is keyed by an `EntityId`. Hosted tables normally use
// UUID primary keys; anything else (serial ids rendered as text, fixtures)
// is carried verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Canonical identifier for any library entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Uuid(Uuid),
    Text(String),
}

impl EntityId {
    /// A fresh random UUID identifier.
    pub fn new_v4() -> Self {
        Self::Uuid(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Option<&Uuid> {
        match self {
            Self::Uuid(u) => Some(u),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for EntityId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<Uuid> for EntityId {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        match Uuid::parse_str(&s) {
            Ok(u) => Self::Uuid(u),
            Err(_) => Self::Text(s),
        }
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_strings_parse_as_uuid() {
        let raw = "0b9f5d1e-3c56-4d8a-9a57-2f8e4c7f0a11";
        let id = EntityId::from(raw);
        assert!(id.as_uuid().is_some());
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn other_strings_stay_text() {
        let id: EntityId = "book-42".parse().expect("infallible");
        assert_eq!(id, EntityId::Text("book-42".into()));
    }

    #[test]
    fn deserializes_untagged() {
        let id: EntityId =
            serde_json::from_str("\"0b9f5d1e-3c56-4d8a-9a57-2f8e4c7f0a11\"").expect("valid json");
        assert!(matches!(id, EntityId::Uuid(_)));
        let id: EntityId = serde_json::from_str("\"m-7\"").expect("valid json");
        assert_eq!(id, EntityId::Text("m-7".into()));
    }
}
