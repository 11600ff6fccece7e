use crate::vault::{FsVault, NoteFile, NOTE_EXTENSION};
use notify::event::CreateKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("vault is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error(transparent)]
    Notify(#[from] notify::Error),
}

pub struct CreationSubscription {
    watcher: Option<RecommendedWatcher>,
    events: mpsc::UnboundedReceiver<NoteFile>,
}

impl CreationSubscription {
    pub async fn next(&mut self) -> Option<NoteFile> {
        self.events.recv().await
    }

    #[cfg(test)]
    pub(crate) fn from_channel(events: mpsc::UnboundedReceiver<NoteFile>) -> Self {
        Self {
            watcher: None,
            events,
        }
    }

    pub fn cancel(&mut self) {
        if self.watcher.take().is_some() {
            self.events.close();
            tracing::debug!("creation watcher stopped");
        }
    }
}

/// Only creations after this returns are reported. The vault root should be
/// canonical, since some platforms report canonical paths.
pub fn watch_created_notes(vault: &FsVault) -> Result<CreationSubscription, WatchError> {
    let root = vault.root();
    if !root.is_dir() {
        return Err(WatchError::NotADirectory(root.to_path_buf()));
    }

    let (tx, events) = mpsc::unbounded_channel();
    let mapper = vault.clone();
    let mut watcher = notify::recommended_watcher(
        move |result: Result<notify::Event, notify::Error>| match result {
            Ok(event) => {
                if !matches!(
                    event.kind,
                    EventKind::Create(CreateKind::File | CreateKind::Any)
                ) {
                    return;
                }
                for path in &event.paths {
                    let Some(note) = note_for_created_path(&mapper, path) else {
                        continue;
                    };
                    if tx.send(note).is_err() {
                        return;
                    }
                }
            }
            Err(err) => tracing::warn!("watch error: {err}"),
        },
    )?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    tracing::info!(vault = %root.display(), "watching for new daily notes");

    Ok(CreationSubscription {
        watcher: Some(watcher),
        events,
    })
}

fn note_for_created_path(vault: &FsVault, path: &Path) -> Option<NoteFile> {
    let note = vault.note_for_absolute(path)?;
    if note.extension() != NOTE_EXTENSION || is_hidden(note.path()) || !path.is_file() {
        return None;
    }
    Some(note)
}

// Dot-directories such as `.obsidian` or `.trash` hold no daily notes.
fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}
