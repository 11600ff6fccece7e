use crate::casing::{apply_casing, Casing};
use crate::vault::{report_error, NoteFile, Notifier, Vault, VaultError, NOTE_EXTENSION};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const TEMP_PREFIX: &str = "temp-";

#[derive(Debug, Error)]
pub enum RenameError {
    #[error("failed to rename {} to {}: {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: VaultError,
    },
    #[error("temp file not found after rename: {}", .expected.display())]
    TempMissing { expected: PathBuf },
    #[error("renamed file not found after rename: {}", .expected.display())]
    FinalMissing { expected: PathBuf },
}

/// Vault-relative path of a note called `basename` inside `parent`.
///
/// Notes in the vault root get no directory prefix, whether the root is
/// spelled as an empty path or as `/`.
pub fn note_path(parent: &Path, basename: &str) -> PathBuf {
    let file_name = format!("{basename}.{NOTE_EXTENSION}");
    if parent.as_os_str().is_empty() || parent == Path::new("/") {
        PathBuf::from(file_name)
    } else {
        parent.join(file_name)
    }
}

/// Renames `file` to `new_basename` in the same directory and re-resolves it.
///
/// `Ok(None)` means the host accepted the rename but the file is not at the
/// new path afterwards.
pub async fn change_file_basename(
    vault: &dyn Vault,
    file: &NoteFile,
    new_basename: &str,
) -> Result<Option<NoteFile>, RenameError> {
    let new_path = note_path(file.parent(), new_basename);
    vault
        .rename_file(file, &new_path)
        .await
        .map_err(|source| RenameError::Rename {
            from: file.path().to_path_buf(),
            to: new_path.clone(),
            source,
        })?;
    Ok(vault.get_file_by_path(&new_path).await)
}

/// Changes the casing of `file`'s basename by way of a `temp-` name, so the
/// host always sees a real name change even on case-insensitive filesystems.
///
/// Failures are reported through `notifier` before being returned. Nothing is
/// rolled back: a failure in the second phase leaves the temp-named note.
pub async fn apply_casing_to_basename(
    vault: &dyn Vault,
    notifier: &dyn Notifier,
    file: &NoteFile,
    casing: Casing,
) -> Result<NoteFile, RenameError> {
    let result = rename_through_temp(vault, file, casing).await;
    if let Err(err) = &result {
        report_error(notifier, &err.to_string());
    }
    result
}

async fn rename_through_temp(
    vault: &dyn Vault,
    file: &NoteFile,
    casing: Casing,
) -> Result<NoteFile, RenameError> {
    let basename = file.basename();
    let temp_basename = format!("{TEMP_PREFIX}{basename}");

    let temp_file = change_file_basename(vault, file, &temp_basename)
        .await?
        .ok_or_else(|| RenameError::TempMissing {
            expected: note_path(file.parent(), &temp_basename),
        })?;
    tracing::debug!(temp = %temp_file.path().display(), "moved daily note to temp name");

    let final_basename = apply_casing(basename, casing);
    let renamed = change_file_basename(vault, &temp_file, &final_basename)
        .await?
        .ok_or_else(|| RenameError::FinalMissing {
            expected: note_path(file.parent(), &final_basename),
        })?;
    tracing::debug!(path = %renamed.path().display(), "applied casing to daily note");

    Ok(renamed)
}
