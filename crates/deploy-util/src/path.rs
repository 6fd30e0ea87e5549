//! Path utilities.

use std::path::{Component, Path, PathBuf};

/// Name of the per-user data directory under the home directory.
pub const DATA_DIR_NAME: &str = ".deploy-cli";

/// Get the deploy data directory (`~/.deploy-cli`).
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(DATA_DIR_NAME))
}

/// Directory holding saved chat sessions.
pub fn history_dir() -> Option<PathBuf> {
    data_dir().map(|p| p.join("history"))
}

/// Directory holding log files.
pub fn logs_dir() -> Option<PathBuf> {
    data_dir().map(|p| p.join("logs"))
}

/// Normalize a path by removing `.` and `..` components.
///
/// Unlike `canonicalize`, this doesn't require the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => result.push(component),
        }
    }

    result
}

/// Resolve a possibly relative path against a working directory.
///
/// Absolute paths are returned normalized; relative paths are joined
/// onto `cwd` first.
pub fn resolve(cwd: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&cwd.join(path))
    }
}

/// Join `path` onto `cwd` and keep the result inside `cwd`.
///
/// Root and prefix components of `path` are dropped, so `/etc/hosts`
/// joins as `cwd/etc/hosts`. Returns `None` when `..` components climb
/// out of `cwd`.
pub fn join_within(cwd: &Path, path: impl AsRef<Path>) -> Option<PathBuf> {
    let relative: PathBuf = path
        .as_ref()
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();

    let base = normalize(cwd);
    let joined = normalize(&base.join(relative));
    joined.starts_with(&base).then_some(joined)
}

/// Render `path` relative to `base` when possible, for display.
pub fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }

    #[test]
    fn test_resolve_relative() {
        let cwd = Path::new("/work/project");
        assert_eq!(
            resolve(cwd, "src/main.rs"),
            PathBuf::from("/work/project/src/main.rs")
        );
        assert_eq!(resolve(cwd, "../other"), PathBuf::from("/work/other"));
    }

    #[test]
    fn test_resolve_absolute() {
        let cwd = Path::new("/work/project");
        assert_eq!(resolve(cwd, "/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_join_within() {
        let cwd = Path::new("/work/project");
        assert_eq!(
            join_within(cwd, "src/lib.rs"),
            Some(PathBuf::from("/work/project/src/lib.rs"))
        );
        assert_eq!(
            join_within(cwd, "/etc/hosts"),
            Some(PathBuf::from("/work/project/etc/hosts"))
        );
        assert_eq!(
            join_within(cwd, "a/../b.txt"),
            Some(PathBuf::from("/work/project/b.txt"))
        );
        assert_eq!(join_within(cwd, "../other/x"), None);
        assert_eq!(join_within(cwd, "a/../../../etc/passwd"), None);
    }

    #[test]
    fn test_display_relative() {
        let base = Path::new("/work");
        assert_eq!(display_relative(Path::new("/work/a.txt"), base), "a.txt");
        assert_eq!(display_relative(Path::new("/tmp/b"), base), "/tmp/b");
    }

    #[test]
    fn test_data_dirs_share_root() {
        if let (Some(data), Some(history), Some(logs)) = (data_dir(), history_dir(), logs_dir()) {
            assert!(data.ends_with(DATA_DIR_NAME));
            assert!(history.starts_with(&data));
            assert!(logs.starts_with(&data));
        }
    }
}
