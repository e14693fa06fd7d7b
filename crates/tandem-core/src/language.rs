//! The stream language table.
//!
//! Languages are stored and transmitted as small integers and resolved
//! against this static table. Unknown ids are rejected at the boundary,
//! never panicked on.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// A stream's language, as shown to editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Language {
    PlainText,
    JavaScript,
    TypeScript,
    Python,
    Rust,
    Go,
    Java,
    C,
    Cpp,
    Html,
    Css,
    Markdown,
}

/// The static id/name table. The wire id is the row index is the enum
/// discriminant; rows are append-only.
const TABLE: &[(Language, &str)] = &[
    (Language::PlainText, "plaintext"),
    (Language::JavaScript, "javascript"),
    (Language::TypeScript, "typescript"),
    (Language::Python, "python"),
    (Language::Rust, "rust"),
    (Language::Go, "go"),
    (Language::Java, "java"),
    (Language::C, "c"),
    (Language::Cpp, "cpp"),
    (Language::Html, "html"),
    (Language::Css, "css"),
    (Language::Markdown, "markdown"),
];

impl Language {
    /// Resolve a wire id against the table.
    pub fn from_id(id: u16) -> Option<Self> {
        TABLE.get(id as usize).map(|(language, _)| *language)
    }

    /// The wire id for this language.
    pub fn id(self) -> u16 {
        TABLE
            .iter()
            .position(|(language, _)| *language == self)
            .expect("every variant is in the table") as u16
    }

    /// The editor-facing name.
    pub fn name(self) -> &'static str {
        TABLE[self.id() as usize].1
    }
}

impl From<Language> for u16 {
    fn from(language: Language) -> u16 {
        language.id()
    }
}

impl TryFrom<u16> for Language {
    type Error = CoreError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        Language::from_id(id).ok_or(CoreError::UnknownLanguage(id))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
