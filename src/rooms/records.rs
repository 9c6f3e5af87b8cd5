//! Identifiers and records shared by the room index and its stores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier. Only emptiness is rejected; the format
            /// belongs to the chat protocol.
            pub fn new(id: impl Into<String>) -> Result<Self> {
                let id = id.into();
                if id.is_empty() {
                    return Err(Error::InvalidIdentifier(concat!($what, " must not be empty").into()));
                }
                Ok(Self(id))
            }

            /// Rows read back from storage were validated on the way in.
            #[allow(dead_code)]
            pub(crate) fn from_stored(id: String) -> Self {
                Self(id)
            }

            /// Borrow the raw identifier
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(id: String) -> Result<Self> {
                Self::new(id)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

opaque_id!(
    /// A chat user identifier (e.g. `@alice:example.org`)
    UserId,
    "user id"
);

opaque_id!(
    /// A chat room identifier (e.g. `!abc123:example.org`)
    RoomId,
    "room id"
);

/// The bridge's view of a bridged room.
///
/// `encrypted` is owned by the portal lifecycle; the room index only reads
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub room_id: RoomId,
    pub encrypted: bool,
}

impl RoomRecord {
    pub fn new(room_id: RoomId, encrypted: bool) -> Self {
        Self { room_id, encrypted }
    }
}

/// Membership state of a user in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Join,
    Invite,
    Knock,
    Leave,
    Ban,
}

impl Membership {
    /// Wire/storage form
    pub fn as_str(&self) -> &'static str {
        match self {
            Membership::Join => "join",
            Membership::Invite => "invite",
            Membership::Knock => "knock",
            Membership::Leave => "leave",
            Membership::Ban => "ban",
        }
    }

    /// Joined and invited users receive room keys; everyone else does not.
    pub fn is_shared(&self) -> bool {
        matches!(self, Membership::Join | Membership::Invite)
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Membership {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "join" => Ok(Membership::Join),
            "invite" => Ok(Membership::Invite),
            "knock" => Ok(Membership::Knock),
            "leave" => Ok(Membership::Leave),
            "ban" => Ok(Membership::Ban),
            other => Err(Error::InvalidIdentifier(format!(
                "unknown membership state: {}",
                other
            ))),
        }
    }
}

/// A user as seen in one room's member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub membership: Membership,
    pub displayname: Option<String>,
    pub avatar_url: Option<String>,
}

impl MemberProfile {
    /// A profile with no display name or avatar
    pub fn new(room_id: RoomId, user_id: UserId, membership: Membership) -> Self {
        Self {
            room_id,
            user_id,
            membership,
            displayname: None,
            avatar_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ids_rejected() {
        assert!(matches!(UserId::new(""), Err(Error::InvalidIdentifier(_))));
        assert!(matches!(RoomId::new(""), Err(Error::InvalidIdentifier(_))));
        assert_eq!(UserId::new("@a:b").unwrap().as_str(), "@a:b");
    }

    #[test]
    fn test_ids_are_opaque() {
        // No grammar is enforced beyond non-emptiness
        let room = RoomId::new("not a matrix id").unwrap();
        assert_eq!(room.to_string(), "not a matrix id");
    }

    #[test]
    fn test_id_serde_rejects_empty() {
        let ok: RoomId = serde_json::from_str("\"!r:x\"").unwrap();
        assert_eq!(ok.as_str(), "!r:x");
        assert!(serde_json::from_str::<RoomId>("\"\"").is_err());
    }

    #[test]
    fn test_membership_parse() {
        for m in [
            Membership::Join,
            Membership::Invite,
            Membership::Knock,
            Membership::Leave,
            Membership::Ban,
        ] {
            assert_eq!(m.as_str().parse::<Membership>().unwrap(), m);
        }
        assert!("joined".parse::<Membership>().is_err());
        assert!(Membership::Invite.is_shared());
        assert!(!Membership::Leave.is_shared());
    }
}
