//! Contains the [`Metadata`] struct describing a dictionary and
//! [`MetadataBuilder`] for creating a [`Metadata`] for the SDX writer.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Descriptive information about a dictionary.
///
/// Readers populate the fields their container carries and leave the rest
/// empty; the SDX writer consumes `title`, `author`, `email`, `website`,
/// and `description`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Metadata {
    /// The dictionary title (SDX: `bookname`).
    pub title: String,
    /// The dictionary author.
    pub author: String,
    /// A contact email address.
    pub email: String,
    /// A website URL (SDX only).
    pub website: String,
    /// A description of the dictionary. Line breaks are rendered as `<br>`.
    pub description: String,
    /// The copyright notice (BGL only).
    pub copyright: String,
    /// The human-readable name of the headword language.
    pub source_lang: String,
    /// The human-readable name of the definition language.
    pub target_lang: String,
    /// The number of entries in the dictionary.
    pub num_entries: u64,
    /// The declared fallback charset (BGL only), possibly empty.
    pub default_charset: String,
    /// The declared charset of headwords and alternates (BGL only),
    /// possibly empty.
    pub source_charset: String,
    /// The declared charset of definitions (BGL only), possibly empty.
    pub target_charset: String,
    /// The container format version string (SDX only).
    pub version: String,
    /// The creation date as an opaque string (SDX only).
    pub date: String,
}

impl Metadata {
    /// Creates a builder for building `Metadata`.
    pub fn builder() -> MetadataBuilder {
        MetadataBuilder::default()
    }
}

/// Helper for constructing [`Metadata`] values, primarily for the SDX
/// writer.
#[derive(Debug, Clone, Default)]
pub struct MetadataBuilder {
    metadata: Metadata,
}

impl MetadataBuilder {
    /// Sets the dictionary title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = title.into();
        self
    }

    /// Sets the dictionary author.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.metadata.author = author.into();
        self
    }

    /// Sets the contact email address.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.metadata.email = email.into();
        self
    }

    /// Sets the website URL.
    pub fn website(mut self, website: impl Into<String>) -> Self {
        self.metadata.website = website.into();
        self
    }

    /// Sets the dictionary description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    /// Sets the name of the headword language.
    pub fn source_lang(mut self, source_lang: impl Into<String>) -> Self {
        self.metadata.source_lang = source_lang.into();
        self
    }

    /// Sets the name of the definition language.
    pub fn target_lang(mut self, target_lang: impl Into<String>) -> Self {
        self.metadata.target_lang = target_lang.into();
        self
    }

    /// Builds the [`Metadata`].
    pub fn build(self) -> Metadata {
        self.metadata
    }
}
