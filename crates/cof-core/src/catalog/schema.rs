//! Wire records of the catalog API. Decoding is strict on types and required
//! fields; only `name` and `category_key` carry API-defined defaults.

use serde::Deserialize;

/// Pagination envelope: `{"results": [...], "next": "...|null"}`.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// True when the server announced another page.
    pub fn has_next(&self) -> bool {
        self.next.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}

/// Entry of `courses/lessons/{course}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LessonRecord {
    pub id: u64,
    #[serde(default)]
    pub number: Option<u32>,
}

/// Entry of `courses/sources/{course}`. `name` and `category_key` may be
/// absent or null; read them through [`SourceRecord::title`] and
/// [`SourceRecord::category_key`].
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRecord {
    #[serde(default)]
    pub name: Option<String>,
    /// Direct file URL; empty or missing for embed-only sources.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default, rename = "category_key")]
    pub category: Option<String>,
    /// Lesson id this source belongs to.
    #[serde(default)]
    pub lesson: Option<u64>,
}

impl SourceRecord {
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_NAME)
    }

    pub fn category_key(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY_KEY)
    }
}

/// Entry of `user/courses/`.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrolledCourse {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub count_lessons: Option<u32>,
}

const DEFAULT_NAME: &str = "Sem título";
const DEFAULT_CATEGORY_KEY: &str = "other";
