//! Contains the [`Entry`] type yielded by every dictionary reader.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single dictionary entry.
///
/// All three fields are valid UTF-8, converted from the charset the source
/// dictionary declares. Line breaks inside definitions are rendered as
/// `<br>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entry {
    /// The surface form the entry is filed under.
    pub headword: String,
    /// The definition text.
    pub definition: String,
    /// Additional surface forms sharing this definition, in the order the
    /// source file lists them, duplicates included.
    pub alternates: Vec<String>,
}

impl Entry {
    /// Creates a new [`Entry`] with no alternate forms.
    pub fn new(headword: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            headword: headword.into(),
            definition: definition.into(),
            alternates: Vec::new(),
        }
    }
}
