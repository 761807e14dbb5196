//! Prefixed entity ids.
//!
//! Every entity id is a string of the form `<prefix>-<uuid-v4>`, e.g.
//! `rp-9f0c…` for a room plane. The prefix makes ids self-describing in
//! logs and persisted documents, and lets deserialization reject an id
//! pasted into the wrong field.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Error produced when a string does not carry the expected id prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdError {
    pub expected_prefix: &'static str,
    pub found: String,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected an id with prefix '{}-', got '{}'",
            self.expected_prefix, self.found
        )
    }
}

impl std::error::Error for IdError {}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Mints a fresh random id.
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::new_v4()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                let valid = value
                    .strip_prefix($prefix)
                    .and_then(|rest| rest.strip_prefix('-'))
                    .is_some_and(|rest| !rest.is_empty());
                if valid {
                    Ok(Self(value))
                } else {
                    Err(IdError {
                        expected_prefix: $prefix,
                        found: value,
                    })
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::try_from(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

prefixed_id!(
    /// Id of a room.
    RoomId, "r"
);
prefixed_id!(
    /// Id of a furniture arrangement within a room.
    LayoutId, "rl"
);
prefixed_id!(
    /// Id of a furniture placement inside one layout.
    FurniturePlacementId, "fp"
);
prefixed_id!(
    /// Id of a light placement.
    LightPlacementId, "lp"
);
prefixed_id!(
    /// Stable id of a detected room plane.
    PlaneId, "rp"
);
prefixed_id!(
    /// Id of a catalog furniture item. Opaque to this crate; resolved by
    /// the external catalog service.
    FurnitureId, "f"
);
prefixed_id!(
    /// Id of a single operation, minted by whoever creates the operation.
    OperationId, "op"
);

/// A selectable object in the editor: either a furniture placement or a
/// light placement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    Furniture(FurniturePlacementId),
    Light(LightPlacementId),
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Furniture(id) => id.fmt(f),
            ObjectId::Light(id) => id.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_prefix() {
        let id = PlaneId::generate();
        assert!(id.as_str().starts_with("rp-"));
        let id = LayoutId::generate();
        assert!(id.as_str().starts_with("rl-"));
    }

    #[test]
    fn rejects_wrong_prefix() {
        assert!(PlaneId::try_from("fp-123".to_string()).is_err());
        assert!(PlaneId::try_from("rp".to_string()).is_err());
        assert!(PlaneId::try_from("rp-".to_string()).is_err());
        assert!(PlaneId::try_from("rp-abc".to_string()).is_ok());
    }

    #[test]
    fn prefix_match_is_exact() {
        // "rl-…" must not parse as a RoomId even though "r" is a prefix of "rl".
        assert!(RoomId::try_from("rl-123".to_string()).is_err());
        assert!(RoomId::try_from("r-123".to_string()).is_ok());
    }

    #[test]
    fn serde_round_trip() {
        let id = FurniturePlacementId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let back: FurniturePlacementId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn object_id_deserializes_by_prefix() {
        let fp: ObjectId = serde_json::from_str("\"fp-abc\"").unwrap();
        assert!(matches!(fp, ObjectId::Furniture(_)));
        let lp: ObjectId = serde_json::from_str("\"lp-abc\"").unwrap();
        assert!(matches!(lp, ObjectId::Light(_)));
        assert!(serde_json::from_str::<ObjectId>("\"rp-abc\"").is_err());
    }
}
