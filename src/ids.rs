//! Strongly typed entity identifiers.
//!
//! Ids are UUIDv7 values: opaque, globally unique and ordered by creation
//! time, so `ORDER BY id` agrees with `ORDER BY created_at`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Parses a client-supplied id, reporting a validation error that
            /// names the entity when the text is not a well-formed id.
            pub fn parse(raw: &str) -> Result<Self, DomainError> {
                Uuid::parse_str(raw.trim())
                    .map(Self)
                    .map_err(|_| DomainError::validation(concat!("Invalid ", $label, " id")))
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.as_hyphenated())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Self::parse(raw)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(UserId, "user");
entity_id!(VideoId, "video");
entity_id!(CommentId, "comment");
entity_id!(TweetId, "tweet");
entity_id!(LikeId, "like");
entity_id!(SubscriptionId, "subscription");
entity_id!(
    /// Channels are users; the separate label only changes error messages.
    ChannelId,
    "channel"
);

impl From<ChannelId> for UserId {
    fn from(value: ChannelId) -> Self {
        Self(value.0)
    }
}

/// Parses an id column read back from the store.
pub(crate) fn stored<T: From<Uuid>>(raw: &str) -> anyhow::Result<T> {
    let uuid = Uuid::parse_str(raw)
        .map_err(|err| anyhow::anyhow!("corrupt id {raw:?} in store: {err}"))?;
    Ok(T::from(uuid))
}
