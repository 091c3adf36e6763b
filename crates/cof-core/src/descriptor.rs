//! Normalized media records produced by catalog discovery.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media a source points at. Decides the destination subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Transcription,
    Audio,
    Video,
    Book,
    Other,
}

impl Category {
    /// Maps the API `category_key` to a category. Unknown keys become `Other`.
    pub fn from_key(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "transcription" | "transcriptions" => Category::Transcription,
            "audio" | "audios" => Category::Audio,
            "video" | "videos" => Category::Video,
            "book" | "books" => Category::Book,
            _ => Category::Other,
        }
    }

    /// Subdirectory name used under a course directory.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Transcription => "transcricoes",
            Category::Audio => "audios",
            Category::Video => "videos",
            Category::Book => "livros",
            Category::Other => "outros",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Transcription => "transcription",
            Category::Audio => "audio",
            Category::Video => "video",
            Category::Book => "book",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One downloadable item. `source_url` is the identity used by dedup and the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub title: String,
    /// Human lesson number; `None` when the source is not tied to a numbered lesson.
    pub lesson_number: Option<u32>,
    pub source_url: String,
    /// Lowercase extension without the dot (e.g. `mp3`).
    pub extension: String,
    pub category: Category,
    pub course_name: Option<String>,
}
