mod casing;
mod date_format;
mod handler;
mod rename;
mod settings;
mod vault;
mod watcher;

#[cfg(test)]
mod test_support;

pub use casing::{apply_casing, Casing, CasingError};
pub use date_format::{
    format_date, is_valid_date, parse_date_format, parse_strict, DateFormatError, FormatPart,
    Token,
};
pub use handler::{is_daily_note, DailyNoteHandler, HandleOutcome, SELF_RENAME_WINDOW};
pub use rename::{
    apply_casing_to_basename, change_file_basename, note_path, RenameError, TEMP_PREFIX,
};
pub use settings::{default_settings_path, load_settings, save_settings, Settings, SettingsStore};
pub use vault::{
    report_error, FsVault, NoteFile, Notifier, Vault, VaultError, NOTE_EXTENSION, REPORT_TAG,
};
pub use watcher::{watch_created_notes, CreationSubscription, WatchError};
