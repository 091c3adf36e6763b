//! Startup cleanup of downloads interrupted by a crash or kill.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::fetch::PART_SUFFIX;

/// Deletes every in-flight (`*.cof-part`) file under `root`. A missing root is not an error.
/// Returns how many files were removed.
pub fn sweep_partials(root: &Path) -> Result<usize> {
    if !root.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        let entries = fs::read_dir(&dir).with_context(|| format!("read dir {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("read dir {}", dir.display()))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .with_context(|| format!("stat {}", path.display()))?;
            if file_type.is_dir() {
                dirs.push(path);
            } else if file_type.is_file()
                && path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().ends_with(PART_SUFFIX))
            {
                fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
                tracing::info!("removed interrupted download {}", path.display());
                removed += 1;
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_only_part_files() {
        let dir = tempfile::tempdir().unwrap();
        let audios = dir.path().join("COF_Original/audios");
        fs::create_dir_all(&audios).unwrap();
        fs::write(audios.join("Aula_001_-_A.mp3"), b"done").unwrap();
        fs::write(audios.join("Aula_002_-_B.mp3.cof-part"), b"half").unwrap();
        fs::write(dir.path().join("top.pdf.cof-part"), b"half").unwrap();

        assert_eq!(sweep_partials(dir.path()).unwrap(), 2);
        assert!(audios.join("Aula_001_-_A.mp3").exists());
        assert!(!audios.join("Aula_002_-_B.mp3.cof-part").exists());
        assert!(!dir.path().join("top.pdf.cof-part").exists());
    }

    #[test]
    fn missing_root_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(sweep_partials(&dir.path().join("nope")).unwrap(), 0);
    }

    #[test]
    fn finished_files_named_part_survive() {
        let dir = tempfile::tempdir().unwrap();
        let books = dir.path().join("C/livros");
        fs::create_dir_all(&books).unwrap();
        fs::write(books.join("cap.part"), b"done").unwrap();
        fs::write(books.join("cap.part.cof-part"), b"half").unwrap();

        assert_eq!(sweep_partials(dir.path()).unwrap(), 1);
        assert!(books.join("cap.part").exists());
        assert!(!books.join("cap.part.cof-part").exists());
    }
}
