//! Identifier newtypes.
//!
//! Ids are opaque strings handed out by the ingestion and identity
//! collaborators; the newtypes only stop them being mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// A generated business (tenant).
    BusinessId
);
string_id!(
    /// A page within a business.
    PageId
);
string_id!(
    /// An authenticated user, as reported by the identity provider.
    UserId
);
string_id!(
    /// A section within a snapshot; unique per snapshot.
    SectionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = PageId::new("home-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"home-1\"");
        let back: PageId = serde_json::from_str("\"home-1\"").unwrap();
        assert_eq!(back, id);
        assert_eq!(back.to_string(), "home-1");
    }
}
