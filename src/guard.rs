//! Keeps computed destinations inside their library root

use crate::error::{MoveError, Result};
use std::path::{Component, Path, PathBuf};

/// Check that `candidate` lies strictly inside `root`
///
/// Both paths are made absolute and normalised lexically (`.` and `..` are
/// resolved without touching the filesystem, since destinations usually do not
/// exist yet). The comparison is per path component, so `/lib/Movies2` is not
/// inside `/lib/Movies`, and the root itself is not a valid destination.
pub fn validate_within(candidate: &Path, root: &Path) -> Result<()> {
    let abs_candidate = normalize(&std::path::absolute(candidate)?);
    let abs_root = normalize(&std::path::absolute(root)?);

    if abs_candidate != abs_root && abs_candidate.starts_with(&abs_root) {
        Ok(())
    } else {
        tracing::error!(
            "Refusing destination {} outside library root {}",
            abs_candidate.display(),
            abs_root.display()
        );
        Err(MoveError::PathEscape {
            path: abs_candidate,
            root: abs_root,
        })
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // popping past the root is a no-op, as the kernel does
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inside_root() {
        let root = Path::new("/library/Movies");
        assert!(validate_within(&root.join("a/b"), root).is_ok());
        assert!(validate_within(&root.join("Some Movie (2021).mkv"), root).is_ok());
    }

    #[test]
    fn test_traversal_escape() {
        let root = Path::new("/library/Movies");
        let err = validate_within(&root.join("../../etc/passwd"), root).unwrap_err();
        match err {
            MoveError::PathEscape { path, .. } => assert_eq!(path, PathBuf::from("/etc/passwd")),
            other => panic!("expected PathEscape, got {other:?}"),
        }
    }

    #[test]
    fn test_traversal_that_comes_back_is_fine() {
        let root = Path::new("/library/TV");
        assert!(validate_within(&root.join("Show/../Other/Season 01"), root).is_ok());
    }

    #[test]
    fn test_sibling_with_common_prefix() {
        let root = Path::new("/library/Movies");
        assert!(validate_within(Path::new("/library/Movies2/x.mkv"), root).is_err());
    }

    #[test]
    fn test_root_itself_is_rejected() {
        let root = Path::new("/library/Movies");
        assert!(validate_within(root, root).is_err());
        assert!(validate_within(&root.join("."), root).is_err());
        assert!(validate_within(&root.join("a/.."), root).is_err());
    }

    #[test]
    fn test_relative_paths_resolve_against_cwd() {
        assert!(validate_within(Path::new("lib/a.mkv"), Path::new("lib")).is_ok());
        assert!(validate_within(Path::new("lib/../a.mkv"), Path::new("lib")).is_err());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/../x")), PathBuf::from("/x"));
    }
}
