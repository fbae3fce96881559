use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The id string was rejected by [`MessageId::new`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid message id {0:?}")]
pub struct InvalidMessageId(pub String);

/// Identifier for a queued message.
///
/// The id doubles as the on-disk filename stem, so construction validates
/// that it cannot escape the spool directory or collide with the files the
/// spool manages itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    /// Validate a caller-supplied id.
    ///
    /// Rejected ids:
    /// - empty strings
    /// - path separators (`/` and `\`)
    /// - directory traversal (`..`)
    /// - leading `.` (reserved for the spool's temporary files)
    /// - a `.meta` suffix (would collide with metadata files)
    ///
    /// # Errors
    ///
    /// Returns [`InvalidMessageId`] carrying the offending string.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidMessageId> {
        let id = id.into();

        let rejected = id.is_empty()
            || id.contains('/')
            || id.contains('\\')
            || id.contains("..")
            || id.starts_with('.')
            || id.ends_with(".meta");

        if rejected {
            return Err(InvalidMessageId(id));
        }

        Ok(Self(id))
    }

    /// Generate a fresh unique id.
    ///
    /// ULIDs are lexicographically sortable by creation time and
    /// collision-resistant, so generated ids also give the spool a stable
    /// enumeration order.
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Recover an id from a metadata filename like `<id>.meta`.
    ///
    /// Returns `None` for filenames that do not end in `.meta` or whose
    /// stem fails validation.
    pub(crate) fn from_meta_filename(filename: &str) -> Option<Self> {
        let stem = filename.strip_suffix(".meta")?;
        Self::new(stem).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for MessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}
