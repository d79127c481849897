use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an event stream.
///
/// A stream key carries an explicit namespace prefix (e.g. `trade-<uuid>`)
/// so that the event-log namespace is visible in the key itself, rather
/// than being a bare UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Creates a stream ID from an existing key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Generates a new random stream ID under the given namespace prefix.
    ///
    /// The resulting key has the form `<prefix>-<uuid-v4>`.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Uuid::new_v4()))
    }

    /// Returns the stream key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the key belongs to the given namespace prefix.
    pub fn in_namespace(&self, prefix: &str) -> bool {
        self.0
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('-'))
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StreamId {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for StreamId {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
