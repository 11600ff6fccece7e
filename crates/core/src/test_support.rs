use crate::vault::{NoteFile, Notifier, Vault, VaultError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// In-memory vault that mimics a host rejecting renames whose target only
/// differs from the source by case.
#[derive(Debug, Default)]
pub struct MockVault {
    files: Mutex<HashSet<PathBuf>>,
    renames: Mutex<Vec<(PathBuf, PathBuf)>>,
    vanish_on_rename_to: Mutex<HashSet<PathBuf>>,
}

impl MockVault {
    pub fn with_files(paths: &[&str]) -> Self {
        let vault = Self::default();
        vault
            .files
            .lock()
            .expect("files lock")
            .extend(paths.iter().map(PathBuf::from));
        vault
    }

    /// The rename to `path` is accepted but the file cannot be resolved afterwards.
    pub fn vanish_on_rename_to(&self, path: &str) {
        self.vanish_on_rename_to
            .lock()
            .expect("vanish lock")
            .insert(PathBuf::from(path));
    }

    pub fn renames(&self) -> Vec<(PathBuf, PathBuf)> {
        self.renames.lock().expect("renames lock").clone()
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.files
            .lock()
            .expect("files lock")
            .contains(Path::new(path))
    }
}

#[async_trait]
impl Vault for MockVault {
    async fn rename_file(&self, file: &NoteFile, new_path: &Path) -> Result<(), VaultError> {
        // Give other in-flight handlers a chance to interleave.
        tokio::task::yield_now().await;

        let from = file.path().to_path_buf();
        let from_lossy = from.to_string_lossy().to_lowercase();
        let to_lossy = new_path.to_string_lossy().to_lowercase();
        if from_lossy == to_lossy {
            return Err(VaultError::AlreadyExists(new_path.to_path_buf()));
        }

        let mut files = self.files.lock().expect("files lock");
        if !files.remove(&from) {
            return Err(VaultError::NotFound(from));
        }
        if files.contains(new_path) {
            files.insert(from);
            return Err(VaultError::AlreadyExists(new_path.to_path_buf()));
        }
        let vanish = self
            .vanish_on_rename_to
            .lock()
            .expect("vanish lock")
            .contains(new_path);
        if !vanish {
            files.insert(new_path.to_path_buf());
        }
        self.renames
            .lock()
            .expect("renames lock")
            .push((from, new_path.to_path_buf()));
        Ok(())
    }

    async fn get_file_by_path(&self, path: &Path) -> Option<NoteFile> {
        tokio::task::yield_now().await;
        self.files
            .lock()
            .expect("files lock")
            .contains(path)
            .then(|| NoteFile::new(path))
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notice(&self, message: &str) {
        self.messages
            .lock()
            .expect("messages lock")
            .push(message.to_string());
    }
}
