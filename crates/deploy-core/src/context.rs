//! Inline `@file` references.
//!
//! Each `@path` token in user input resolves to an entry in a
//! [`ContextBundle`]: the file's content, size metadata when the file is
//! above the large-file threshold, or an error when it cannot be read. The
//! bundle is rendered as TOON and injected as a system turn ahead of the
//! conversation for a single model call.

use crate::toon;
use crate::turn::Turn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Heading placed above the encoded bundle.
pub const CONTEXT_HEADER: &str = "The user has provided the following file context:";

/// Error recorded for references that leave the working directory.
pub const OUTSIDE_CWD: &str = "File is outside the working directory";

/// Instruction attached to files too large to inline.
pub const LARGE_FILE_INSTRUCTION: &str =
    "File is too large to include inline. Use the readFile, search or bash tools to inspect the parts you need.";

static FILE_REF: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?:^|\s)@(\S+)").ok());

/// One resolved file reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FileEntry {
    Inline {
        name: String,
        content: String,
    },
    Large {
        name: String,
        size: u64,
        large: bool,
        instruction: String,
    },
    Unreadable {
        name: String,
        error: String,
    },
}

impl FileEntry {
    pub fn name(&self) -> &str {
        match self {
            FileEntry::Inline { name, .. }
            | FileEntry::Large { name, .. }
            | FileEntry::Unreadable { name, .. } => name,
        }
    }
}

/// All file references of one user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextBundle {
    pub files: Vec<FileEntry>,
}

impl ContextBundle {
    pub fn encode(&self) -> String {
        toon::to_toon(self)
    }

    /// The synthetic system turn carrying this bundle.
    pub fn to_turn(&self) -> Turn {
        Turn::system(format!("{}\n\n{}", CONTEXT_HEADER, self.encode()))
    }
}

/// Extract `@path` references in order of appearance, without duplicates.
pub fn references(input: &str) -> Vec<String> {
    let Some(re) = FILE_REF.as_ref() else {
        return Vec::new();
    };
    let mut refs: Vec<String> = Vec::new();
    for cap in re.captures_iter(input) {
        if let Some(m) = cap.get(1) {
            let name = m.as_str().to_string();
            if !refs.contains(&name) {
                refs.push(name);
            }
        }
    }
    refs
}

/// Resolves file references against a working directory.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    cwd: PathBuf,
    threshold: u64,
}

impl ContextAssembler {
    pub fn new(cwd: impl Into<PathBuf>, threshold: u64) -> Self {
        Self {
            cwd: cwd.into(),
            threshold,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Build the bundle for `input`, or `None` when it references no files.
    ///
    /// A file that cannot be read only affects its own entry.
    pub async fn assemble(&self, input: &str) -> Option<ContextBundle> {
        let refs = references(input);
        if refs.is_empty() {
            return None;
        }

        let mut files = Vec::with_capacity(refs.len());
        for name in refs {
            let entry = match self.contained(&name).await {
                Some(path) => self.resolve_entry(name, &path).await,
                None => {
                    warn!(reference = %name, "File reference outside working directory");
                    FileEntry::Unreadable {
                        name,
                        error: OUTSIDE_CWD.to_string(),
                    }
                }
            };
            files.push(entry);
        }
        debug!(count = files.len(), "Assembled file context");
        Some(ContextBundle { files })
    }

    /// Path for `name` under the working directory, or `None` when the
    /// reference (or a symlink along it) leads outside.
    async fn contained(&self, name: &str) -> Option<PathBuf> {
        let path = deploy_util::path::join_within(&self.cwd, name)?;
        match (
            tokio::fs::canonicalize(&path).await,
            tokio::fs::canonicalize(&self.cwd).await,
        ) {
            (Ok(real), Ok(root)) if !real.starts_with(&root) => None,
            _ => Some(path),
        }
    }

    async fn resolve_entry(&self, name: String, path: &Path) -> FileEntry {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => {
                return FileEntry::Unreadable {
                    name,
                    error: "Not a file".to_string(),
                }
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Referenced file unreadable");
                return FileEntry::Unreadable {
                    name,
                    error: "Could not read file".to_string(),
                };
            }
        };

        let size = metadata.len();
        if size > self.threshold {
            return FileEntry::Large {
                name,
                size,
                large: true,
                instruction: LARGE_FILE_INSTRUCTION.to_string(),
            };
        }

        match tokio::fs::read_to_string(path).await {
            Ok(content) => FileEntry::Inline { name, content },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Referenced file unreadable");
                FileEntry::Unreadable {
                    name,
                    error: "Could not read file".to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LARGE_FILE_THRESHOLD;
    use tempfile::TempDir;

    #[test]
    fn test_references() {
        assert_eq!(
            references("@notes.txt summarize and compare with @src/main.rs"),
            vec!["notes.txt", "src/main.rs"]
        );
        assert_eq!(references("mail me at me@example.com"), Vec::<String>::new());
        assert_eq!(references("@a.txt @a.txt"), vec!["a.txt"]);
        assert!(references("no refs here").is_empty());
    }

    #[tokio::test]
    async fn test_no_references() {
        let dir = TempDir::new().unwrap();
        let assembler = ContextAssembler::new(dir.path(), DEFAULT_LARGE_FILE_THRESHOLD);
        assert!(assembler.assemble("plain question").await.is_none());
    }

    #[tokio::test]
    async fn test_inline_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "buy milk!!").unwrap();
        let assembler = ContextAssembler::new(dir.path(), DEFAULT_LARGE_FILE_THRESHOLD);

        let bundle = assembler.assemble("@notes.txt summarize").await.unwrap();
        assert_eq!(
            bundle.files,
            vec![FileEntry::Inline {
                name: "notes.txt".to_string(),
                content: "buy milk!!".to_string(),
            }]
        );

        let encoded = bundle.encode();
        assert!(encoded.starts_with("files[1]{name,content}:"));
        assert!(encoded.contains("buy milk!!"));

        let turn = bundle.to_turn();
        assert!(turn.text().starts_with(CONTEXT_HEADER));
    }

    #[tokio::test]
    async fn test_threshold_boundary() {
        let dir = TempDir::new().unwrap();
        let limit = DEFAULT_LARGE_FILE_THRESHOLD as usize;
        std::fs::write(dir.path().join("exact.txt"), "a".repeat(limit)).unwrap();
        std::fs::write(dir.path().join("over.txt"), "a".repeat(limit + 1)).unwrap();
        let assembler = ContextAssembler::new(dir.path(), DEFAULT_LARGE_FILE_THRESHOLD);

        let bundle = assembler.assemble("@exact.txt @over.txt").await.unwrap();
        assert!(matches!(bundle.files[0], FileEntry::Inline { .. }));
        match &bundle.files[1] {
            FileEntry::Large { size, large, .. } => {
                assert_eq!(*size, limit as u64 + 1);
                assert!(*large);
            }
            other => panic!("expected large entry, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_file_is_isolated() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ok.txt"), "fine").unwrap();
        std::fs::create_dir(dir.path().join("folder")).unwrap();
        let assembler = ContextAssembler::new(dir.path(), DEFAULT_LARGE_FILE_THRESHOLD);

        let bundle = assembler
            .assemble("@missing.txt @ok.txt @folder")
            .await
            .unwrap();
        assert_eq!(bundle.files.len(), 3);
        assert!(matches!(bundle.files[0], FileEntry::Unreadable { .. }));
        assert_eq!(bundle.files[1].name(), "ok.txt");
        assert!(matches!(bundle.files[1], FileEntry::Inline { .. }));
        assert!(matches!(bundle.files[2], FileEntry::Unreadable { .. }));

        let encoded = bundle.encode();
        assert!(encoded.contains("Could not read file"));
    }

    #[tokio::test]
    async fn test_references_stay_in_working_directory() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, "outside-cwd").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let assembler = ContextAssembler::new(dir.path().join("sub"), DEFAULT_LARGE_FILE_THRESHOLD);

        let input = format!("@{} @../peek.txt", secret.display());
        let bundle = assembler.assemble(&input).await.unwrap();

        assert_eq!(bundle.files.len(), 2);
        for entry in &bundle.files {
            assert!(!matches!(entry, FileEntry::Inline { .. }), "{:?}", entry);
        }
        assert_eq!(
            bundle.files[1],
            FileEntry::Unreadable {
                name: "../peek.txt".to_string(),
                error: OUTSIDE_CWD.to_string(),
            }
        );
        assert!(!bundle.encode().contains("outside-cwd"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_working_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "outside-cwd").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("link.txt"))
            .unwrap();
        let assembler = ContextAssembler::new(dir.path(), DEFAULT_LARGE_FILE_THRESHOLD);

        let bundle = assembler.assemble("@link.txt").await.unwrap();
        assert_eq!(
            bundle.files[0],
            FileEntry::Unreadable {
                name: "link.txt".to_string(),
                error: OUTSIDE_CWD.to_string(),
            }
        );
    }
}
