//! Path canonicalization and allowed-roots containment checks

use std::path::{Component, Path, PathBuf};

use crate::error::{AiError, Result};

/// Resolve a user-supplied path to a clean absolute path.
///
/// When `follow_symlinks` is set and the path exists, symlinks are
/// resolved; a non-existent path is normalized lexically so write targets
/// can still be checked against the allowed roots.
pub fn clean_path(path: &str, follow_symlinks: bool) -> Result<PathBuf> {
    if path.is_empty() {
        return Err(AiError::InvalidArguments("path cannot be empty".to_string()));
    }

    let absolute = if Path::new(path).is_absolute() {
        normalize(Path::new(path))
    } else {
        let cwd = std::env::current_dir()?;
        normalize(&cwd.join(path))
    };

    if follow_symlinks && absolute.exists() {
        return Ok(absolute.canonicalize()?);
    }
    Ok(absolute)
}

/// Whether `target` lies under at least one base path. An empty base list
/// means no restriction.
pub fn path_contained(bases: &[PathBuf], target: &Path) -> bool {
    if bases.is_empty() {
        return true;
    }
    bases.iter().any(|base| target.starts_with(base))
}

/// Enforce the allowed-roots policy before any I/O happens.
pub fn ensure_allowed(roots: &[PathBuf], target: &Path) -> Result<()> {
    if path_contained(roots, target) {
        return Ok(());
    }
    Err(AiError::Tool(format!(
        "access to path '{}' is not allowed",
        target.display()
    )))
}

/// Lexical normalization: strips `.` segments and folds `..` without
/// touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component.as_os_str());
                }
            }
            _ => result.push(component.as_os_str()),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_is_rejected() {
        assert!(clean_path("", true).is_err());
    }

    #[test]
    fn relative_segments_are_folded() {
        let cleaned = clean_path("/work/a/../b/./c.txt", false).unwrap();
        assert_eq!(cleaned, PathBuf::from("/work/b/c.txt"));
    }

    #[test]
    fn nonexistent_write_target_still_resolves() {
        let cleaned = clean_path("/definitely/not/here.txt", true).unwrap();
        assert_eq!(cleaned, PathBuf::from("/definitely/not/here.txt"));
    }

    #[test]
    fn symlinks_are_followed_for_existing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.txt");
        std::fs::write(&real, "data").unwrap();
        let link = dir.path().join("link.txt");
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(&real, &link).unwrap();
            let cleaned = clean_path(link.to_str().unwrap(), true).unwrap();
            assert_eq!(cleaned, real.canonicalize().unwrap());
        }
    }

    #[test]
    fn empty_roots_allow_everything() {
        assert!(path_contained(&[], Path::new("/anywhere/at/all")));
    }

    #[test]
    fn containment_respects_roots() {
        let roots = vec![PathBuf::from("/work"), PathBuf::from("/srv/data")];

        assert!(path_contained(&roots, Path::new("/work/sub/file.txt")));
        assert!(path_contained(&roots, Path::new("/srv/data")));
        assert!(!path_contained(&roots, Path::new("/forbidden/secret")));
        // A sibling sharing the prefix string is not contained.
        assert!(!path_contained(&roots, Path::new("/workspace/file.txt")));
    }

    #[test]
    fn violation_message_names_the_path() {
        let roots = vec![PathBuf::from("/work")];
        let err = ensure_allowed(&roots, Path::new("/forbidden/secret")).unwrap_err();
        assert!(err.to_string().contains("not allowed"));
        assert!(err.to_string().contains("/forbidden/secret"));
    }
}
