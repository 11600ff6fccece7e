use crate::casing::{apply_casing, Casing};
use crate::date_format::is_valid_date;
use crate::rename::{apply_casing_to_basename, note_path, TEMP_PREFIX};
use crate::settings::{Settings, SettingsStore};
use crate::vault::{NoteFile, Notifier, Vault, NOTE_EXTENSION};
use crate::watcher::CreationSubscription;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// How long a path produced by our own rename is ignored as a creation.
pub const SELF_RENAME_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// No date format is configured.
    Disabled,
    NotDailyNote,
    /// The event was caused by one of this handler's own renames.
    SelfTriggered,
    Renamed(NoteFile),
    /// The rename protocol failed; the failure has already been reported.
    Failed,
}

pub struct DailyNoteHandler {
    vault: Arc<dyn Vault>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<SettingsStore>,
    own_renames: Mutex<HashMap<PathBuf, Instant>>,
}

impl DailyNoteHandler {
    pub fn new(
        vault: Arc<dyn Vault>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            vault,
            notifier,
            settings,
            own_renames: Mutex::new(HashMap::new()),
        }
    }

    pub async fn on_file_created(&self, file: &NoteFile) -> HandleOutcome {
        if self.take_own_rename(file.path()) {
            tracing::debug!(path = %file.path().display(), "ignoring creation caused by our rename");
            return HandleOutcome::SelfTriggered;
        }

        let settings = self.settings.refresh();
        if !settings.is_enabled() {
            return HandleOutcome::Disabled;
        }
        if !is_daily_note(file, &settings) {
            return HandleOutcome::NotDailyNote;
        }

        tracing::info!(path = %file.path().display(), "daily note created");
        self.remember_own_renames(file, settings.casing);

        let renamed = match apply_casing_to_basename(
            self.vault.as_ref(),
            self.notifier.as_ref(),
            file,
            settings.casing,
        )
        .await
        {
            Ok(renamed) => renamed,
            Err(_) => return HandleOutcome::Failed,
        };

        if settings.notify_on_rename {
            self.notifier.notice(&format!(
                "changed the casing of daily note \"{}\" to {}",
                renamed.basename(),
                settings.casing.display_label()
            ));
        }

        HandleOutcome::Renamed(renamed)
    }

    /// Handles each created note on its own task until `shutdown` resolves or
    /// the subscription ends. Renames already started are awaited before
    /// returning, so no note is left under its temp name.
    pub async fn serve(
        self: Arc<Self>,
        mut subscription: CreationSubscription,
        shutdown: impl Future<Output = ()>,
    ) {
        tokio::pin!(shutdown);
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                next = subscription.next() => {
                    let Some(file) = next else { break };
                    let handler = Arc::clone(&self);
                    in_flight.spawn(async move {
                        let outcome = handler.on_file_created(&file).await;
                        tracing::debug!(path = %file.path().display(), ?outcome, "handled new note");
                    });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join_failure(joined);
                }
                _ = &mut shutdown => {
                    subscription.cancel();
                    break;
                }
            }
        }

        if !in_flight.is_empty() {
            tracing::info!(pending = in_flight.len(), "waiting for renames in progress");
        }
        while let Some(joined) = in_flight.join_next().await {
            log_join_failure(joined);
        }
    }

    fn remember_own_renames(&self, file: &NoteFile, casing: Casing) {
        let basename = file.basename();
        let temp = note_path(file.parent(), &format!("{TEMP_PREFIX}{basename}"));
        let target = note_path(file.parent(), &apply_casing(basename, casing));

        let now = Instant::now();
        let mut own = self.own_renames.lock().unwrap_or_else(|e| e.into_inner());
        own.retain(|_, at| now.duration_since(*at) < SELF_RENAME_WINDOW);
        own.insert(temp, now);
        own.insert(target, now);
    }

    fn take_own_rename(&self, path: &Path) -> bool {
        let mut own = self.own_renames.lock().unwrap_or_else(|e| e.into_inner());
        match own.remove(path) {
            Some(at) => at.elapsed() < SELF_RENAME_WINDOW,
            None => false,
        }
    }
}

fn log_join_failure(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        tracing::error!("rename task failed: {err}");
    }
}

/// A daily note is a markdown note whose whole basename parses as a date
/// under the configured format.
pub fn is_daily_note(file: &NoteFile, settings: &Settings) -> bool {
    let basename = file.basename();
    settings.is_enabled()
        && !basename.is_empty()
        && file.extension() == NOTE_EXTENSION
        && is_valid_date(basename, &settings.date_format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockVault, RecordingNotifier};
    use tempfile::{tempdir, TempDir};
    use tokio::sync::{mpsc, oneshot};

    struct Fixture {
        _temp: TempDir,
        vault: Arc<MockVault>,
        notifier: Arc<RecordingNotifier>,
        settings: Arc<SettingsStore>,
        handler: DailyNoteHandler,
    }

    fn fixture(files: &[&str], date_format: &str, casing: &str, notify: bool) -> Fixture {
        let temp = tempdir().expect("tempdir");
        let settings =
            Arc::new(SettingsStore::open(temp.path().join("config.toml")).expect("open settings"));
        settings.set_date_format(date_format).expect("set format");
        settings.set_casing(casing).expect("set casing");
        settings.set_notify_on_rename(notify).expect("set notify");

        let vault = Arc::new(MockVault::with_files(files));
        let notifier = Arc::new(RecordingNotifier::default());
        let handler = DailyNoteHandler::new(vault.clone(), notifier.clone(), settings.clone());
        Fixture {
            _temp: temp,
            vault,
            notifier,
            settings,
            handler,
        }
    }

    #[tokio::test]
    async fn empty_format_never_renames() {
        for name in ["2024-01-15.md", "anything.md", " .md", "Jan 15 2024, Mon.md"] {
            let f = fixture(&[name], "", "uppercase", true);
            let outcome = f.handler.on_file_created(&NoteFile::new(name)).await;
            assert_eq!(outcome, HandleOutcome::Disabled);
            assert!(f.vault.renames().is_empty());
            assert!(f.notifier.messages().is_empty());
        }

        let f = fixture(&["2024-01-15.md"], "  \t", "uppercase", true);
        let outcome = f.handler.on_file_created(&NoteFile::new("2024-01-15.md")).await;
        assert_eq!(outcome, HandleOutcome::Disabled);
        assert!(f.vault.renames().is_empty());
    }

    #[tokio::test]
    async fn non_matching_names_are_left_alone() {
        let f = fixture(&["Meeting.md", "2024-13-40.md"], "YYYY-MM-DD", "lowercase", true);
        for name in ["Meeting.md", "2024-13-40.md"] {
            let outcome = f.handler.on_file_created(&NoteFile::new(name)).await;
            assert_eq!(outcome, HandleOutcome::NotDailyNote);
        }
        assert!(f.vault.renames().is_empty());
    }

    #[tokio::test]
    async fn other_extensions_are_not_daily_notes() {
        let f = fixture(&["2024-01-15.txt"], "YYYY-MM-DD", "lowercase", false);
        let outcome = f.handler.on_file_created(&NoteFile::new("2024-01-15.txt")).await;
        assert_eq!(outcome, HandleOutcome::NotDailyNote);
    }

    #[tokio::test]
    async fn lowercases_named_daily_note_and_notifies() {
        let f = fixture(&["Jan 15 2024, Mon.md"], "MMM D YYYY, ddd", "lowercase", true);

        let outcome = f
            .handler
            .on_file_created(&NoteFile::new("Jan 15 2024, Mon.md"))
            .await;

        assert_eq!(
            outcome,
            HandleOutcome::Renamed(NoteFile::new("jan 15 2024, mon.md"))
        );
        assert!(f.vault.has_file("jan 15 2024, mon.md"));
        let messages = f.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("jan 15 2024, mon"));
    }

    #[tokio::test]
    async fn uppercase_of_digits_still_runs_both_phases() {
        let f = fixture(&["2024-01-15.md"], "YYYY-MM-DD", "uppercase", false);

        let outcome = f.handler.on_file_created(&NoteFile::new("2024-01-15.md")).await;

        assert_eq!(outcome, HandleOutcome::Renamed(NoteFile::new("2024-01-15.md")));
        assert_eq!(
            f.vault.renames(),
            vec![
                (PathBuf::from("2024-01-15.md"), PathBuf::from("temp-2024-01-15.md")),
                (PathBuf::from("temp-2024-01-15.md"), PathBuf::from("2024-01-15.md")),
            ]
        );
        assert!(f.notifier.messages().is_empty(), "notify is off");
    }

    #[tokio::test]
    async fn failed_second_phase_reports_without_success_notice() {
        let f = fixture(&["2024-01-15.md"], "YYYY-MM-DD", "lowercase", true);
        f.vault.vanish_on_rename_to("2024-01-15.md");

        let outcome = f.handler.on_file_created(&NoteFile::new("2024-01-15.md")).await;

        assert_eq!(outcome, HandleOutcome::Failed);
        let messages = f.notifier.messages();
        assert_eq!(messages.len(), 1, "only the error notice: {messages:?}");
        assert!(messages[0].starts_with("[daily note casing]"));
        assert!(!messages[0].contains("changed the casing"));
    }

    #[tokio::test]
    async fn own_renames_do_not_retrigger() {
        let f = fixture(&["Jan 15 2024, Mon.md"], "MMM D YYYY, ddd", "lowercase", false);

        let outcome = f
            .handler
            .on_file_created(&NoteFile::new("Jan 15 2024, Mon.md"))
            .await;
        assert!(matches!(outcome, HandleOutcome::Renamed(_)));

        for echoed in ["temp-Jan 15 2024, Mon.md", "jan 15 2024, mon.md"] {
            let outcome = f.handler.on_file_created(&NoteFile::new(echoed)).await;
            assert_eq!(outcome, HandleOutcome::SelfTriggered);
        }
        assert_eq!(f.vault.renames().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_events_complete_independently() {
        let f = fixture(
            &["daily/2024-01-01.md", "daily/2024-01-02.md"],
            "YYYY-MM-DD",
            "uppercase",
            true,
        );
        let first = NoteFile::new("daily/2024-01-01.md");
        let second = NoteFile::new("daily/2024-01-02.md");

        let (a, b) = tokio::join!(
            f.handler.on_file_created(&first),
            f.handler.on_file_created(&second)
        );

        assert_eq!(a, HandleOutcome::Renamed(first.clone()));
        assert_eq!(b, HandleOutcome::Renamed(second.clone()));
        assert!(f.vault.has_file("daily/2024-01-01.md"));
        assert!(f.vault.has_file("daily/2024-01-02.md"));
        assert!(!f.vault.has_file("daily/temp-2024-01-01.md"));
        assert!(!f.vault.has_file("daily/temp-2024-01-02.md"));
        assert_eq!(f.vault.renames().len(), 4);
        assert_eq!(f.notifier.messages().len(), 2);
    }

    #[tokio::test]
    async fn settings_change_applies_to_later_events() {
        let f = fixture(
            &["2024-01-15.md", "Jan 16 2024, Tue.md"],
            "YYYY-MM-DD",
            "lowercase",
            false,
        );

        let outcome = f.handler.on_file_created(&NoteFile::new("2024-01-15.md")).await;
        assert!(matches!(outcome, HandleOutcome::Renamed(_)));

        f.settings
            .set_date_format("MMM D YYYY, ddd")
            .expect("set format");
        f.settings.set_casing("uppercase").expect("set casing");
        let outcome = f
            .handler
            .on_file_created(&NoteFile::new("Jan 16 2024, Tue.md"))
            .await;
        assert_eq!(
            outcome,
            HandleOutcome::Renamed(NoteFile::new("JAN 16 2024, TUE.md"))
        );
    }

    #[tokio::test]
    async fn changes_saved_by_another_process_apply_to_next_event() {
        let f = fixture(
            &["2024-01-15.md", "2024-01-16.md", "2024-01-17.md"],
            "YYYY-MM-DD",
            "lowercase",
            false,
        );
        let editor = SettingsStore::open(f.settings.path()).expect("open editor store");

        editor.set_casing("uppercase").expect("set casing");
        editor.set_notify_on_rename(true).expect("set notify");
        let outcome = f.handler.on_file_created(&NoteFile::new("2024-01-15.md")).await;
        assert!(matches!(outcome, HandleOutcome::Renamed(_)));
        let messages = f.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].ends_with("UPPERCASE"));

        editor.set_date_format("").expect("clear format");
        let outcome = f.handler.on_file_created(&NoteFile::new("2024-01-16.md")).await;
        assert_eq!(outcome, HandleOutcome::Disabled);
        assert_eq!(f.vault.renames().len(), 2);

        editor.set_date_format("YYYY-MM-DD").expect("restore format");
        let outcome = f.handler.on_file_created(&NoteFile::new("2024-01-17.md")).await;
        assert!(matches!(outcome, HandleOutcome::Renamed(_)));
    }

    #[tokio::test]
    async fn shutdown_waits_for_renames_in_progress() {
        let f = fixture(&["2024-01-15.md"], "YYYY-MM-DD", "uppercase", false);
        let handler = Arc::new(f.handler);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let subscription = CreationSubscription::from_channel(events_rx);

        events_tx
            .send(NoteFile::new("2024-01-15.md"))
            .expect("queue event");
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        stop_tx.send(()).expect("queue shutdown");

        handler
            .serve(subscription, async {
                let _ = stop_rx.await;
            })
            .await;

        assert_eq!(f.vault.renames().len(), 2);
        assert!(f.vault.has_file("2024-01-15.md"));
        assert!(!f.vault.has_file("temp-2024-01-15.md"));
    }

    #[tokio::test]
    async fn serve_ends_when_subscription_closes() {
        let f = fixture(&["2024-01-15.md"], "YYYY-MM-DD", "lowercase", false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        events_tx
            .send(NoteFile::new("2024-01-15.md"))
            .expect("queue event");
        drop(events_tx);

        Arc::new(f.handler)
            .serve(
                CreationSubscription::from_channel(events_rx),
                std::future::pending(),
            )
            .await;

        assert_eq!(f.vault.renames().len(), 2);
    }

    #[test]
    fn is_daily_note_requires_basename() {
        let settings = Settings {
            date_format: "YYYY-MM-DD".to_string(),
            ..Settings::default()
        };
        assert!(is_daily_note(&NoteFile::new("2024-01-15.md"), &settings));
        assert!(!is_daily_note(&NoteFile::new(".md"), &settings));
        assert!(!is_daily_note(&NoteFile::new("2024-01-15 draft.md"), &settings));
    }
}
