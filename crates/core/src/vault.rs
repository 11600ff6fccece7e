use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const NOTE_EXTENSION: &str = "md";

// Vault-relative. After a rename the old handle may point at nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoteFile {
    path: PathBuf,
}

impl NoteFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn basename(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|v| v.to_str())
            .unwrap_or_default()
    }

    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|v| v.to_str())
            .unwrap_or_default()
    }

    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("destination already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("path escapes the vault: {}", .0.display())]
    OutsideVault(PathBuf),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[async_trait]
pub trait Vault: Send + Sync {
    async fn rename_file(&self, file: &NoteFile, new_path: &Path) -> Result<(), VaultError>;

    async fn get_file_by_path(&self, path: &Path) -> Option<NoteFile>;
}

pub trait Notifier: Send + Sync {
    fn notice(&self, message: &str);
}

pub const REPORT_TAG: &str = "[daily note casing]";

pub fn report_error(notifier: &dyn Notifier, message: &str) {
    let message = format!("{REPORT_TAG}: {message}");
    tracing::error!("{message}");
    notifier.notice(&message);
}

#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn note_for_absolute(&self, absolute: &Path) -> Option<NoteFile> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        if relative.as_os_str().is_empty() {
            return None;
        }
        Some(NoteFile::new(relative))
    }

    fn absolute(&self, relative: &Path) -> Result<PathBuf, VaultError> {
        let escapes = relative.components().any(|component| {
            !matches!(component, Component::Normal(_) | Component::CurDir)
        });
        if escapes {
            return Err(VaultError::OutsideVault(relative.to_path_buf()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Vault for FsVault {
    async fn rename_file(&self, file: &NoteFile, new_path: &Path) -> Result<(), VaultError> {
        let from = self.absolute(file.path())?;
        let to = self.absolute(new_path)?;

        let io_err = |path: &Path, source: io::Error| VaultError::Io {
            path: path.to_path_buf(),
            source,
        };
        if !tokio::fs::try_exists(&from)
            .await
            .map_err(|err| io_err(&from, err))?
        {
            return Err(VaultError::NotFound(file.path().to_path_buf()));
        }
        if tokio::fs::try_exists(&to)
            .await
            .map_err(|err| io_err(&to, err))?
            && !same_entry(&from, &to).await
        {
            return Err(VaultError::AlreadyExists(new_path.to_path_buf()));
        }

        tokio::fs::rename(&from, &to)
            .await
            .map_err(|source| VaultError::Io { path: to, source })
    }

    async fn get_file_by_path(&self, path: &Path) -> Option<NoteFile> {
        let absolute = self.absolute(path).ok()?;
        let metadata = tokio::fs::metadata(&absolute).await.ok()?;
        if !metadata.is_file() {
            return None;
        }
        Some(NoteFile::new(path))
    }
}

// On case-insensitive filesystems `a.md` and `A.md` resolve to the same entry.
async fn same_entry(a: &Path, b: &Path) -> bool {
    match (
        tokio::fs::canonicalize(a).await,
        tokio::fs::canonicalize(b).await,
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
