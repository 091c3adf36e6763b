//! Catalog discovery.
//!
//! For every configured course, walks the paginated lesson and source
//! collections of the platform API and turns each source that has a direct
//! file URL into a [`MediaDescriptor`]. A failing course is logged and
//! skipped; the merged list is deduplicated by source URL.

mod extension;
mod schema;

pub use extension::{extension_from_url, DEFAULT_EXTENSION};
pub use schema::{EnrolledCourse, LessonRecord, Page, SourceRecord};

use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CourseRef;
use crate::descriptor::{Category, MediaDescriptor};
use crate::http::{self, HttpError, Request, Transport};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("pagination of {url} did not terminate after {pages} pages")]
    Runaway { url: String, pages: usize },
}

/// Hard stop for a `next` chain that never ends.
const MAX_PAGES: usize = 10_000;

pub struct CatalogClient {
    transport: Arc<dyn Transport>,
    api_base: String,
    page_limit: u32,
    timeout: Duration,
    user_agent: String,
}

impl CatalogClient {
    pub fn new(transport: Arc<dyn Transport>, api_base: &str, page_limit: u32) -> Self {
        Self {
            transport,
            api_base: api_base.trim_end_matches('/').to_string(),
            page_limit: page_limit.max(1),
            timeout: Duration::from_secs(30),
            user_agent: http::user_agent::random().to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// Fetches every page of `path` using `limit`/`offset` until no `next` is announced.
    pub async fn fetch_all<T>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        token: &str,
    ) -> Result<Vec<T>, CatalogError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        let mut all = Vec::new();
        let mut offset: u64 = 0;
        for _ in 0..MAX_PAGES {
            let mut request = Request::get(url.as_str()).timeout(self.timeout);
            for (k, v) in params {
                request = request.query(k, v);
            }
            let request = request
                .query("limit", self.page_limit)
                .query("offset", offset)
                .authorized(token, &self.user_agent);

            let response = http::get(&self.transport, request).await?.error_for_status()?;
            let page: Page<T> = response.json()?;
            let received = page.results.len();
            let more = page.has_next();
            all.extend(page.results);
            if !more || received == 0 {
                return Ok(all);
            }
            offset += u64::from(self.page_limit);
        }
        Err(CatalogError::Runaway {
            url,
            pages: MAX_PAGES,
        })
    }

    /// Media with a direct file URL for one course.
    pub async fn discover_course(
        &self,
        course: &CourseRef,
        token: &str,
    ) -> Result<Vec<MediaDescriptor>, CatalogError> {
        let lessons: Vec<LessonRecord> = self
            .fetch_all(&format!("courses/lessons/{}", course.id), &[("sort", "asc")], token)
            .await?;
        tracing::info!("{}: {} lessons", course.name, lessons.len());

        let sources: Vec<SourceRecord> = self
            .fetch_all(&format!("courses/sources/{}", course.id), &[], token)
            .await?;
        tracing::info!("{}: {} sources", course.name, sources.len());

        Ok(descriptors_for_course(&course.name, &lessons, sources))
    }

    /// Discovers all courses, skipping (and logging) the ones that fail, then dedups by URL.
    pub async fn discover(&self, courses: &[CourseRef], token: &str) -> Vec<MediaDescriptor> {
        tracing::info!("starting catalog discovery ({} courses)", courses.len());
        let mut all = Vec::new();
        for course in courses {
            match self.discover_course(course, token).await {
                Ok(items) => all.extend(items),
                Err(e) => {
                    tracing::error!("discovery failed for {} (id={}): {}", course.name, course.id, e)
                }
            }
        }

        let unique = dedup_by_source(all);
        let mut by_category: BTreeMap<&'static str, usize> = BTreeMap::new();
        for item in &unique {
            *by_category.entry(item.category.as_str()).or_default() += 1;
        }
        tracing::info!(
            "discovery finished: {} items with direct download {:?}",
            unique.len(),
            by_category
        );
        unique
    }

    /// Courses the account is enrolled in (`user/courses/`).
    pub async fn enrolled_courses(&self, token: &str) -> Result<Vec<EnrolledCourse>, CatalogError> {
        self.fetch_all("user/courses/", &[], token).await
    }
}

/// Builds descriptors for one course. Sources without a direct file URL are skipped.
/// Lesson number 0 or an unknown lesson means "no lesson number".
pub fn descriptors_for_course(
    course_name: &str,
    lessons: &[LessonRecord],
    sources: Vec<SourceRecord>,
) -> Vec<MediaDescriptor> {
    let numbers: HashMap<u64, u32> = lessons
        .iter()
        .filter_map(|l| l.number.map(|n| (l.id, n)))
        .collect();

    sources
        .into_iter()
        .filter_map(|source| {
            let url = source.file.as_deref().map(str::trim).filter(|u| !u.is_empty())?.to_string();
            let lesson_number = source
                .lesson
                .and_then(|id| numbers.get(&id).copied())
                .filter(|n| *n > 0);
            Some(MediaDescriptor {
                title: source.title().to_string(),
                lesson_number,
                extension: extension_from_url(&url),
                source_url: url,
                category: Category::from_key(source.category_key()),
                course_name: Some(course_name.to_string()),
            })
        })
        .collect()
}

/// Keeps the first descriptor for each source URL, preserving order.
pub fn dedup_by_source(items: Vec<MediaDescriptor>) -> Vec<MediaDescriptor> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.source_url.clone()))
        .collect()
}

/// Appends enrolled courses that are not configured yet (by id), named by their title.
pub fn merge_enrolled(configured: &[CourseRef], enrolled: &[EnrolledCourse]) -> Vec<CourseRef> {
    let mut courses = configured.to_vec();
    let mut known: HashSet<u64> = configured.iter().map(|c| c.id).collect();
    for course in enrolled {
        if known.insert(course.id) {
            courses.push(CourseRef {
                id: course.id,
                name: course.title.clone(),
            });
        }
    }
    courses
}
