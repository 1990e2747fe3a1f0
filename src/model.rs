//! Replicated entity model
//!
//! Members, concerts and rehearsals are owned by the upstream members and
//! planning services. The local rows mirror the upstream id space verbatim:
//! the replica never generates ids of its own for these tables.

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// The closed set of entity types replicated from upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Member,
    Concert,
    Rehearsal,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Member, EntityKind::Concert, EntityKind::Rehearsal];

    /// Broker topic carrying change events for this kind.
    pub fn topic(&self) -> &'static str {
        match self {
            EntityKind::Member => "members",
            EntityKind::Concert => "concerts",
            EntityKind::Rehearsal => "rehearsals",
        }
    }

    /// The fixed topic set the consumer subscribes to.
    pub fn topics() -> [&'static str; 3] {
        [
            EntityKind::Member.topic(),
            EntityKind::Concert.topic(),
            EntityKind::Rehearsal.topic(),
        ]
    }

    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            "members" => Some(EntityKind::Member),
            "concerts" => Some(EntityKind::Concert),
            "rehearsals" => Some(EntityKind::Rehearsal),
            _ => None,
        }
    }

    /// Entity suffix used in message keys (`add_member`, `edit_concert`, ...).
    pub fn key_suffix(&self) -> &'static str {
        match self {
            EntityKind::Member => "member",
            EntityKind::Concert => "concert",
            EntityKind::Rehearsal => "rehearsal",
        }
    }

    /// Replica table holding rows of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Member => "members",
            EntityKind::Concert => "concerts",
            EntityKind::Rehearsal => "rehearsals",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_suffix())
    }
}

/// Change operations carried by broker message keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Add,
    Edit,
    Delete,
}

impl ChangeOp {
    /// Operation prefix of a message key (`add`, `edit`, `delete`).
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "add" => Some(ChangeOp::Add),
            "edit" => Some(ChangeOp::Edit),
            "delete" => Some(ChangeOp::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeOp::Add => "add",
            ChangeOp::Edit => "edit",
            ChangeOp::Delete => "delete",
        })
    }
}

/// A row replicated verbatim from an upstream service.
///
/// The trait carries just enough metadata for the store and fetch paths to
/// stay generic; the per-kind `match` happens once, in the dispatcher.
pub trait Replicated:
    Serialize
    + DeserializeOwned
    + for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow>
    + Send
    + Sync
    + Unpin
    + 'static
{
    const KIND: EntityKind;

    /// Column holding the human-readable label (`name` or `title`).
    const LABEL_COLUMN: &'static str;

    fn id(&self) -> i64;

    fn label(&self) -> &str;
}

/// Choir member owned by the members service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: i64,
    pub name: String,
}

impl Replicated for Member {
    const KIND: EntityKind = EntityKind::Member;
    const LABEL_COLUMN: &'static str = "name";

    fn id(&self) -> i64 {
        self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

/// Concert owned by the planning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Concert {
    pub id: i64,
    pub title: String,
}

impl Replicated for Concert {
    const KIND: EntityKind = EntityKind::Concert;
    const LABEL_COLUMN: &'static str = "title";

    fn id(&self) -> i64 {
        self.id
    }

    fn label(&self) -> &str {
        &self.title
    }
}

/// Rehearsal owned by the planning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rehearsal {
    pub id: i64,
    pub title: String,
}

impl Replicated for Rehearsal {
    const KIND: EntityKind = EntityKind::Rehearsal;
    const LABEL_COLUMN: &'static str = "title";

    fn id(&self) -> i64 {
        self.id
    }

    fn label(&self) -> &str {
        &self.title
    }
}
