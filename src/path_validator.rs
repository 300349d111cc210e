use std::path::{Component, Path, PathBuf};

use crate::error::QueueError;

/// Longest path accepted for a wipe target.
pub const MAX_PATH_LEN: usize = 32767;

/// Directories that are never accepted as wipe targets, nor anything under them.
const PROTECTED_UNIX_DIRS: [&str; 11] = [
    "/bin", "/boot", "/dev", "/etc", "/lib", "/lib64", "/proc", "/sbin", "/sys", "/usr", "/System",
];

const PROTECTED_WINDOWS_DIRS: [&str; 6] = [
    "\\windows",
    "\\program files",
    "\\program files (x86)",
    "\\programdata",
    "\\system volume information",
    "\\recovery",
];

/// Checks a wipe target before it is allowed into the queue.
pub struct PathValidator;

impl PathValidator {
    /// Validates that `path` names an existing, non-protected target and
    /// returns its canonical form.
    pub fn validate_target(path: &str) -> Result<PathBuf, QueueError> {
        Self::pre_validate_path(path)?;

        let path_buf = PathBuf::from(path);
        match path_buf.try_exists() {
            Ok(true) => {}
            _ => return Err(QueueError::PathNotFound(path.to_string())),
        }

        let canonical = path_buf
            .canonicalize()
            .map_err(|_| QueueError::PathNotFound(path.to_string()))?;

        Self::check_protected(&canonical)?;
        Ok(canonical)
    }

    fn pre_validate_path(path: &str) -> Result<(), QueueError> {
        if path.contains('\0') {
            return Err(QueueError::InvalidPath(
                "path contains null bytes".to_string(),
            ));
        }

        if path.len() > MAX_PATH_LEN {
            return Err(QueueError::InvalidPath(format!(
                "path exceeds maximum length ({MAX_PATH_LEN} characters)"
            )));
        }

        Ok(())
    }

    /// Rejects filesystem roots, home directory roots and system directories.
    fn check_protected(canonical: &Path) -> Result<(), QueueError> {
        let protected = || QueueError::ProtectedPath(canonical.display().to_string());

        let named_components = canonical
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count();
        if named_components == 0 {
            return Err(protected());
        }

        if let Some(home) = dirs::home_dir() {
            if home.canonicalize().map(|h| h == canonical).unwrap_or(false) {
                return Err(protected());
            }
        }

        if PROTECTED_UNIX_DIRS
            .iter()
            .any(|dir| canonical.starts_with(dir))
        {
            return Err(protected());
        }

        let lower = canonical.to_string_lossy().to_lowercase();
        // Strip an extended-length prefix and the drive letter, leaving "\dir\..."
        let without_prefix = lower.strip_prefix("\\\\?\\").unwrap_or(&lower);
        if let Some(rest) = without_prefix.get(2..) {
            if without_prefix.as_bytes().get(1) == Some(&b':')
                && PROTECTED_WINDOWS_DIRS
                    .iter()
                    .any(|dir| rest == *dir || rest.starts_with(&format!("{dir}\\")))
            {
                return Err(protected());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = PathValidator::validate_target(&missing.to_string_lossy());
        assert!(matches!(result, Err(QueueError::PathNotFound(_))));
    }

    #[test]
    fn test_existing_file_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");
        std::fs::write(&file, b"secret").unwrap();
        let canonical = PathValidator::validate_target(&file.to_string_lossy()).unwrap();
        assert_eq!(canonical, file.canonicalize().unwrap());
    }

    #[test]
    fn test_null_byte_blocked() {
        let result = PathValidator::validate_target("/tmp/test\0file.txt");
        assert!(matches!(result, Err(QueueError::InvalidPath(_))));
    }

    #[test]
    fn test_long_path_blocked() {
        let long_path = "/".to_string() + &"a".repeat(MAX_PATH_LEN + 10);
        let result = PathValidator::validate_target(&long_path);
        match result {
            Err(QueueError::InvalidPath(reason)) => assert!(reason.contains("maximum length")),
            other => panic!("expected InvalidPath, got {other:?}"),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_root_and_system_dirs_protected() {
        assert!(matches!(
            PathValidator::validate_target("/"),
            Err(QueueError::ProtectedPath(_))
        ));
        if Path::new("/etc").exists() {
            assert!(matches!(
                PathValidator::validate_target("/etc"),
                Err(QueueError::ProtectedPath(_))
            ));
        }
    }

    #[test]
    fn test_windows_system_dirs_protected() {
        for path in ["C:\\Windows", "c:\\windows\\system32", "\\\\?\\C:\\Program Files"] {
            let result = PathValidator::check_protected(Path::new(path));
            assert!(result.is_err(), "{path} should be protected");
        }
        assert!(PathValidator::check_protected(Path::new("D:\\wipe\\me")).is_ok());
    }
}
