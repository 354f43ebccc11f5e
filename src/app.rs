//! Event router: turns ticks and key presses into engine calls and hands the
//! resulting signals to the alarm and snapshot workers.

use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::{
    collections::VecDeque,
    sync::mpsc,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

use crate::{
    alarm::Ring,
    config::{Config, ConfigError, ValidationIssue},
    duration,
    engine::{PhaseEngine, Signal},
    persist::{RestoreError, StoreError},
    writer::{ShutdownError, SnapshotWriter},
};

pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(30);
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Notices
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, text: text.into() }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Warning, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Info, text: text.into() }
    }
}

/// What currently receives key presses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Surface {
    Timer,
    Popup(Notice),
}

pub fn restore_notice(err: &RestoreError) -> Notice {
    match err {
        RestoreError::Store(StoreError::NotFound { .. }) => {
            Notice::info("No saved progress yet, starting from the first focus phase")
        }
        RestoreError::NotSameDay { .. } => Notice::info("Starting a new day from the first focus phase"),
        other => Notice::warning(format!("Could not resume: {other}")),
    }
}

pub fn config_error_notice(err: &ConfigError) -> Notice {
    Notice::error(format!("{err}. Using the default config."))
}

/// All corrections from one validation pass, as a single notice.
pub fn validation_notice(issues: &[ValidationIssue]) -> Option<Notice> {
    if issues.is_empty() {
        return None;
    }
    let lines: Vec<String> = issues.iter().map(ToString::to_string).collect();
    Some(Notice::warning(format!(
        "Config values reset to defaults: {}",
        lines.join("; ")
    )))
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    engine: PhaseEngine,
    config: Config,
    surface: Surface,
    queue: VecDeque<Notice>,
    writer: SnapshotWriter,
    alarm: mpsc::Sender<Ring>,
    failures: mpsc::Receiver<StoreError>,
    last_snapshot: Instant,
    width: u16,
}

impl App {
    pub fn new(
        engine: PhaseEngine,
        config: Config,
        writer: SnapshotWriter,
        alarm: mpsc::Sender<Ring>,
        failures: mpsc::Receiver<StoreError>,
    ) -> Self {
        Self {
            engine,
            config,
            surface: Surface::Timer,
            queue: VecDeque::new(),
            writer,
            alarm,
            failures,
            last_snapshot: Instant::now(),
            width: 0,
        }
    }

    pub fn engine(&self) -> &PhaseEngine {
        &self.engine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn pending_notices(&self) -> usize {
        self.queue.len()
    }

    /// Progress bar width for the last known terminal width.
    pub fn bar_width(&self) -> u16 {
        let bar = &self.config.progress_bar;
        self.width
            .saturating_sub(bar.padding.saturating_mul(2))
            .saturating_sub(4)
            .min(bar.max_width)
    }

    /// Show `notice` now if nothing else is up, otherwise queue it. A notice
    /// identical to one already showing or waiting is dropped.
    pub fn notify(&mut self, notice: Notice) {
        if matches!(&self.surface, Surface::Popup(current) if *current == notice)
            || self.queue.contains(&notice)
        {
            return;
        }
        match self.surface {
            Surface::Timer => self.surface = Surface::Popup(notice),
            Surface::Popup(_) => self.queue.push_back(notice),
        }
    }

    fn dismiss(&mut self) {
        self.surface = match self.queue.pop_front() {
            Some(next) => Surface::Popup(next),
            None => Surface::Timer,
        };
    }

    pub fn resize(&mut self, width: u16) {
        self.width = width;
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Route one key press. Returns `true` when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind == KeyEventKind::Release {
            return false;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return true;
        }

        match self.surface {
            Surface::Popup(_) => {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter) {
                    self.dismiss();
                }
                false
            }
            Surface::Timer => self.handle_timer_key(key.code, ctrl),
        }
    }

    fn handle_timer_key(&mut self, code: KeyCode, ctrl: bool) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char(' ') => {
                if self.engine.state().running && !self.config.pausing {
                    self.notify(Notice::warning("Pausing is disabled in your config"));
                } else {
                    self.engine.toggle();
                }
            }
            KeyCode::Char('r') => self.engine.reset(),
            KeyCode::Char('n') => self.skip(),
            KeyCode::Char('s') if ctrl => self.skip(),
            _ => {}
        }
        false
    }

    fn skip(&mut self) {
        if self.config.skipping {
            let signal = self.engine.next();
            self.handle_signal(signal);
        } else {
            self.notify(Notice::warning("Skipping phases is disabled in your config"));
        }
    }

    // ========================================================================
    // Clock
    // ========================================================================

    /// Advance the engine by one configured tick and run the periodic chores.
    pub fn on_tick(&mut self, now: Instant) {
        while let Ok(err) = self.failures.try_recv() {
            self.notify(Notice::error(format!("Could not save progress: {err}")));
        }

        if let Some(signal) = self.engine.tick(self.config.tick_duration) {
            self.handle_signal(signal);
        }

        if now.duration_since(self.last_snapshot) >= SNAPSHOT_INTERVAL {
            self.save_snapshot();
        }
    }

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::PhaseEnded { ended, started, n } => {
                info!(%ended, %started, n, "phase ended");
                if self.alarm.send(Ring { ended, started, n }).is_err() {
                    warn!("alarm worker is gone");
                }
            }
            Signal::PauseBudgetExceeded { budget } => {
                warn!(budget = %duration::format_std(budget), "pause budget used up, phase restarted");
                self.notify(Notice::warning(format!(
                    "Paused for more than {}, the phase was restarted",
                    duration::format_std(budget)
                )));
            }
        }
        self.save_snapshot();
    }

    fn save_snapshot(&mut self) {
        self.writer.append(self.engine.snapshot(Local::now()));
        self.last_snapshot = Instant::now();
    }

    /// Write the final snapshot and wait for it.
    pub fn shutdown(self) -> Result<(), ShutdownError> {
        let last = self.engine.snapshot(Local::now());
        match self.writer.shutdown(last, SHUTDOWN_TIMEOUT) {
            Ok(()) => {
                info!(n = self.engine.state().n, phase = %self.engine.state().phase, "final snapshot written");
                Ok(())
            }
            Err(e) => {
                error!("{e}");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persist::{Snapshot, SnapshotStore},
        phase::PhaseType,
    };
    use chrono::TimeDelta;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MemoryStore(Arc<Mutex<Vec<Snapshot>>>);

    impl SnapshotStore for MemoryStore {
        fn append(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
            self.0.lock().unwrap().push(snapshot.clone());
            Ok(())
        }

        fn read_last(&self) -> Result<Snapshot, StoreError> {
            self.0.lock().unwrap().last().cloned().ok_or(StoreError::Empty {
                path: "memory".into(),
            })
        }
    }

    struct Harness {
        app: App,
        store: MemoryStore,
        rings: mpsc::Receiver<Ring>,
        failures: mpsc::Sender<StoreError>,
    }

    fn harness(config: Config) -> Harness {
        let store = MemoryStore::default();
        let (failures, failures_rx) = mpsc::channel();
        let writer = SnapshotWriter::spawn(Box::new(store.clone()), failures.clone()).unwrap();
        let (alarm, rings) = mpsc::channel();
        let engine = PhaseEngine::new(&config);
        Harness {
            app: App::new(engine, config, writer, alarm, failures_rx),
            store,
            rings,
            failures,
        }
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn press_ctrl(app: &mut App, c: char) -> bool {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    #[test]
    fn space_toggles_and_quit_keys_quit() {
        let mut h = harness(Config::default());
        assert!(h.app.engine().state().running);
        assert!(!press(&mut h.app, KeyCode::Char(' ')));
        assert!(!h.app.engine().state().running);

        assert!(press(&mut h.app, KeyCode::Char('q')));
        assert!(press(&mut h.app, KeyCode::Esc));
        assert!(press_ctrl(&mut h.app, 'c'));
    }

    #[test]
    fn pausing_disabled_warns_instead_of_pausing() {
        let mut config = Config::default();
        config.pausing = false;
        let mut h = harness(config);

        press(&mut h.app, KeyCode::Char(' '));
        assert!(h.app.engine().state().running);
        assert!(matches!(
            h.app.surface(),
            Surface::Popup(Notice { kind: NoticeKind::Warning, .. })
        ));
    }

    #[test]
    fn skip_rings_and_persists() {
        let mut h = harness(Config::default());
        press(&mut h.app, KeyCode::Char('n'));
        press_ctrl(&mut h.app, 's');

        assert_eq!(h.app.engine().state().n, 3);
        assert_eq!(h.app.engine().state().phase, PhaseType::Focus);
        let ring = h.rings.try_recv().unwrap();
        assert_eq!(
            ring,
            Ring {
                ended: PhaseType::Focus,
                started: PhaseType::ShortBreak,
                n: 2
            }
        );

        h.app.shutdown().unwrap();
        let rows = h.store.0.lock().unwrap();
        let counters: Vec<_> = rows.iter().map(|s| s.n).collect();
        assert_eq!(counters, vec![2, 3, 3]);
    }

    #[test]
    fn skipping_disabled_leaves_the_phase_alone() {
        let mut config = Config::default();
        config.skipping = false;
        let mut h = harness(config);

        press(&mut h.app, KeyCode::Char('n'));
        assert_eq!(h.app.engine().state().n, 1);
        assert!(h.rings.try_recv().is_err());
        assert!(matches!(h.app.surface(), Surface::Popup(_)));
    }

    #[test]
    fn reset_restarts_the_current_phase() {
        let mut h = harness(Config::default());
        h.app.on_tick(Instant::now());
        assert!(h.app.engine().state().remaining < TimeDelta::minutes(25));

        press_ctrl(&mut h.app, 'r');
        assert_eq!(h.app.engine().state().remaining, TimeDelta::minutes(25));
        assert_eq!(h.app.engine().state().n, 1);
    }

    #[test]
    fn popup_swallows_timer_keys_until_dismissed() {
        let mut h = harness(Config::default());
        h.app.notify(Notice::error("first"));
        h.app.notify(Notice::warning("second"));
        h.app.notify(Notice::warning("second"));
        assert_eq!(h.app.pending_notices(), 1);

        assert!(!press(&mut h.app, KeyCode::Char(' ')));
        assert!(h.app.engine().state().running);

        assert!(!press(&mut h.app, KeyCode::Char('q')));
        assert_eq!(h.app.surface(), &Surface::Popup(Notice::warning("second")));
        assert!(!press(&mut h.app, KeyCode::Enter));
        assert_eq!(h.app.surface(), &Surface::Timer);
    }

    #[test]
    fn pause_budget_surfaces_a_warning() {
        let mut config = Config::default();
        config.auto_start = false;
        config.tick_duration = Duration::from_secs(1);
        config.max_pause_duration = Duration::from_secs(3);
        let mut h = harness(config);

        let now = Instant::now();
        for _ in 0..4 {
            h.app.on_tick(now);
        }
        assert!(matches!(
            h.app.surface(),
            Surface::Popup(Notice { kind: NoticeKind::Warning, .. })
        ));
        assert_eq!(h.app.engine().state().paused, TimeDelta::zero());
    }

    #[test]
    fn write_failures_become_error_notices() {
        let mut h = harness(Config::default());
        h.failures
            .send(std::io::Error::other("disk full").into())
            .unwrap();
        h.app.on_tick(Instant::now());
        assert!(matches!(
            h.app.surface(),
            Surface::Popup(Notice { kind: NoticeKind::Error, .. })
        ));
    }

    #[test]
    fn periodic_snapshot_follows_the_interval() {
        let mut h = harness(Config::default());
        h.app.on_tick(Instant::now() + SNAPSHOT_INTERVAL);
        h.app.shutdown().unwrap();
        assert_eq!(h.store.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn bar_width_respects_padding_and_max() {
        let mut h = harness(Config::default());
        h.app.resize(200);
        assert_eq!(h.app.bar_width(), 40);
        h.app.resize(30);
        assert_eq!(h.app.bar_width(), 16);
        h.app.resize(6);
        assert_eq!(h.app.bar_width(), 0);
    }

    #[test]
    fn every_restore_failure_gets_a_notice() {
        let missing = RestoreError::Store(StoreError::NotFound { path: "x".into() });
        assert_eq!(restore_notice(&missing).kind, NoticeKind::Info);
        let malformed = RestoreError::Store(StoreError::Malformed {
            line: 3,
            reason: "expected 6 fields, found 5".into(),
        });
        let notice = restore_notice(&malformed);
        assert_eq!(notice.kind, NoticeKind::Warning);
        assert!(notice.text.contains("line 3"), "{}", notice.text);
    }

    #[test]
    fn validation_issues_become_one_warning() {
        assert_eq!(validation_notice(&[]), None);

        let mut config = Config::default();
        config.durations.focus = Duration::ZERO;
        config.progress_bar.max_width = 5;
        let notice = validation_notice(&config.validate()).unwrap();
        assert_eq!(notice.kind, NoticeKind::Warning);
        assert!(notice.text.contains("durations.focus"), "{}", notice.text);
        assert!(notice.text.contains("progress_bar.max_width"), "{}", notice.text);
    }

    #[test]
    fn bad_config_file_still_starts_with_notices_queued() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "autostart = true\n").unwrap();

        let (mut config, _, err) = Config::load_or_default(Some(&path));
        let issues = config.validate();
        let mut h = harness(config);
        h.app.notify(config_error_notice(&err.unwrap()));
        if let Some(notice) = validation_notice(&issues) {
            h.app.notify(notice);
        }
        h.app.notify(restore_notice(&RestoreError::Store(StoreError::NotFound {
            path: "snapshots.csv".into(),
        })));

        assert!(h.app.engine().state().running);
        assert!(matches!(
            h.app.surface(),
            Surface::Popup(Notice { kind: NoticeKind::Error, text }) if text.contains("autostart")
        ));
        assert_eq!(h.app.pending_notices(), 1);
    }
}
