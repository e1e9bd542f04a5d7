//! The change under validation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

const CODE_EXTENSIONS: &[&str] = &["rs", "ts", "tsx", "js", "jsx", "py", "go", "java", "c", "cc", "cpp", "h"];
const DOC_EXTENSIONS: &[&str] = &["md", "mdx", "rst", "adoc", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
    /// New content; `None` for deletions or when not loaded.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChangedFile {
    pub fn added(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Added,
            content: Some(content.into()),
        }
    }

    pub fn modified(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Modified,
            content: Some(content.into()),
        }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Deleted,
            content: None,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.path).extension().and_then(|e| e.to_str())
    }

    pub fn is_code(&self) -> bool {
        self.extension().is_some_and(|e| CODE_EXTENSIONS.contains(&e))
    }

    pub fn is_doc(&self) -> bool {
        self.path.starts_with("docs/")
            || self.extension().is_some_and(|e| DOC_EXTENSIONS.contains(&e))
    }

    /// Non-deleted file with loaded content.
    pub fn text(&self) -> Option<&str> {
        match self.status {
            FileStatus::Deleted => None,
            _ => self.content.as_deref(),
        }
    }
}

/// Changed files plus commit metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeContext {
    pub files: Vec<ChangedFile>,
    pub commit_message: String,
    pub branch: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    /// Who approved the change, if anyone.
    #[serde(default)]
    pub approved_by: Option<String>,
}

impl ChangeContext {
    pub fn new(branch: impl Into<String>, author: impl Into<String>, commit_message: impl Into<String>) -> Self {
        Self {
            files: Vec::new(),
            commit_message: commit_message.into(),
            branch: branch.into(),
            author: author.into(),
            timestamp: Utc::now(),
            approved_by: None,
        }
    }

    pub fn with_file(mut self, file: ChangedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn approved_by(mut self, approver: impl Into<String>) -> Self {
        self.approved_by = Some(approver.into());
        self
    }

    pub fn code_files(&self) -> impl Iterator<Item = &ChangedFile> {
        self.files.iter().filter(|f| f.is_code())
    }

    pub fn touches_docs(&self) -> bool {
        self.files.iter().any(ChangedFile::is_doc)
    }

    /// Fill in missing content of non-deleted files from `root`. Unreadable
    /// files are left without content.
    pub async fn load_contents(&mut self, root: &Path) {
        for file in &mut self.files {
            if file.status == FileStatus::Deleted || file.content.is_some() {
                continue;
            }
            let path: PathBuf = root.join(&file.path);
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => file.content = Some(text),
                Err(e) => warn!(path = %path.display(), error = %e, "could not read changed file"),
            }
        }
    }
}
