//! Filament identity and topic derivation.
//!
//! A filament names one conversation by a `domain`/`name` pair. Both parts
//! must be non-blank for the filament to be usable, but the topic key is
//! built from the raw values as supplied: whitespace is significant for
//! routing and ignored only for validation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between domain and name in a topic key.
const TOPIC_SEPARATOR: char = '/';

/// A named conversation, identified by `domain` and `name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filament {
    /// Owning domain (first path segment).
    pub domain: String,
    /// Conversation name within the domain (second path segment).
    pub name: String,
}

impl Filament {
    /// Build a filament from its two parts.
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
        }
    }

    /// Whether both parts are non-blank.
    pub fn is_valid(&self) -> bool {
        validate(self)
    }

    /// The routing key for this filament.
    pub fn topic(&self) -> Topic {
        topic_of(self)
    }
}

impl fmt::Display for Filament {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{TOPIC_SEPARATOR}{}", self.domain, self.name)
    }
}

/// Routing key derived from a [`Filament`]: `domain + "/" + name`.
///
/// Only constructible through [`topic_of`], so every topic in the registry
/// corresponds to exactly one `(domain, name)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    /// The topic key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// True iff neither `domain` nor `name` is empty after trimming.
pub fn validate(filament: &Filament) -> bool {
    !filament.domain.trim().is_empty() && !filament.name.trim().is_empty()
}

/// Exact concatenation `domain + "/" + name`, no trimming or case folding.
pub fn topic_of(filament: &Filament) -> Topic {
    let mut key = String::with_capacity(filament.domain.len() + filament.name.len() + 1);
    key.push_str(&filament.domain);
    key.push(TOPIC_SEPARATOR);
    key.push_str(&filament.name);
    Topic(key)
}
