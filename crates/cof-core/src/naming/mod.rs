//! Destination paths for media.
//!
//! Layout: `<root>/<course>/<category dir>/Aula_007_-_<title>.<ext>`, or
//! `<title>.<ext>` when the item has no lesson number. Resolution is a pure
//! function of the descriptor; collisions are handled by the batch downloader
//! through [`with_suffix`].

mod sanitize;

pub use sanitize::{sanitize_component, sanitize_within, FALLBACK_COMPONENT, NAME_MAX};

use sanitize::truncate_bytes;

use std::path::{Path, PathBuf};

use crate::descriptor::MediaDescriptor;

/// Directory used for items without a course.
pub const NO_COURSE_DIR: &str = "Outros";

/// Suffix of in-flight downloads. The `-` keeps it out of reach of
/// [`extension_from_url`](crate::catalog::extension_from_url), so no
/// finished file ever carries it.
pub const PART_SUFFIX: &str = ".cof-part";

#[derive(Debug, Clone)]
pub struct NamingResolver {
    root: PathBuf,
}

impl NamingResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, item: &MediaDescriptor) -> PathBuf {
        let course = sanitize_component(item.course_name.as_deref().unwrap_or(NO_COURSE_DIR));
        self.root
            .join(course)
            .join(item.category.dir_name())
            .join(file_name(item))
    }
}

/// File name part of the destination. The title is cut so that the name plus
/// [`PART_SUFFIX`] still fits in [`NAME_MAX`].
pub fn file_name(item: &MediaDescriptor) -> String {
    let prefix = match item.lesson_number {
        Some(n) if n > 0 => format!("Aula_{:03}_-_", n),
        _ => String::new(),
    };
    let budget = NAME_MAX.saturating_sub(prefix.len() + 1 + item.extension.len() + PART_SUFFIX.len());
    let title = sanitize_within(&item.title, budget);
    format!("{}{}.{}", prefix, title, item.extension)
}

/// `dir/name.ext` → `dir/name_{n}.ext`. The suffix goes before the last
/// extension; the stem is shortened when the result would not fit.
pub fn with_suffix(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tag = format!("_{}", n);
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let budget = NAME_MAX.saturating_sub(tag.len() + ext.len() + PART_SUFFIX.len());
    path.with_file_name(format!("{}{}{}", truncate_bytes(&stem, budget), tag, ext))
}
