//! Domain types for school records with strong typing.
//!
//! Every entity stored by the backend implements [`Record`]. Records are plain
//! serde structs; references between them are modelled with [`Reference`] so
//! the same type can carry either a bare id (as persisted) or the populated
//! target (as served from the cache).

pub mod records;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use records::{
    Chat, ChatType, Class, Club, Course, Event, Message, School, SetupAccount, Subject, User,
    UserRole,
};

/// Names of every record collection served by the backend.
pub const COLLECTIONS: &[&str] = &[
    School::COLLECTION,
    Class::COLLECTION,
    Subject::COLLECTION,
    Course::COLLECTION,
    Chat::COLLECTION,
    Message::COLLECTION,
    Club::COLLECTION,
    Event::COLLECTION,
    User::COLLECTION,
    SetupAccount::COLLECTION,
];

/// Unique identifier of a stored record.
///
/// Ids are assigned by the record store when a document is created and are
/// opaque strings to everything above it.
///
/// # Examples
///
/// ```rust
/// use schoolhub::domain::RecordId;
///
/// let id = RecordId::new("abc");
/// assert_eq!(id.as_str(), "abc");
/// assert_eq!(id.to_string(), "abc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

/// A reference field: either the id of another record or that record itself.
///
/// Deserialization is untagged, so a JSON string becomes [`Reference::Id`] and
/// a JSON object becomes [`Reference::Populated`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference<T> {
    Id(RecordId),
    Populated(Box<T>),
}

impl<T: Record> Reference<T> {
    /// Returns the id of the referenced record, if known.
    #[must_use]
    pub fn id(&self) -> Option<&RecordId> {
        match self {
            Self::Id(id) => Some(id),
            Self::Populated(record) => record.id(),
        }
    }
}

impl<T> From<RecordId> for Reference<T> {
    fn from(id: RecordId) -> Self {
        Self::Id(id)
    }
}

/// One population path: a (possibly dotted) field path and the collection its
/// ids point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Population {
    pub path: &'static str,
    pub collection: &'static str,
}

impl Population {
    #[must_use]
    pub const fn new(path: &'static str, collection: &'static str) -> Self {
        Self { path, collection }
    }

    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.path.contains('.')
    }
}

/// An entity type persisted in its own collection and cached as a whole list.
pub trait Record: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Collection name; doubles as the cache key.
    const COLLECTION: &'static str;

    fn id(&self) -> Option<&RecordId>;

    fn set_id(&mut self, id: RecordId);

    /// Ordered population paths applied whenever records are loaded.
    #[must_use]
    fn population() -> &'static [Population] {
        &[]
    }

    /// Checks scalar fields before a write reaches the store.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

pub(crate) fn require_non_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    Ok(())
}
