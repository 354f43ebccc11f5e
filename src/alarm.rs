//! End-of-phase alarm: desktop notification plus an optional sound.
//!
//! Runs on its own thread so a slow notification daemon or sound player never
//! holds up the tick loop. Callers only ever send.

use notify_rust::{Notification, Urgency};
use std::{
    io,
    path::Path,
    process::{Command, Stdio},
    sync::mpsc,
    thread,
};
use tracing::{debug, warn};

use crate::phase::PhaseType;

const SOUND_PLAYERS: &[(&str, &str)] = &[
    ("paplay", "/usr/share/sounds/freedesktop/stereo/complete.oga"),
    ("paplay", "/usr/share/sounds/freedesktop/stereo/alarm-clock-elapsed.oga"),
    ("aplay", "/usr/share/sounds/sound-icons/guitar-11.wav"),
    ("aplay", "/usr/share/sounds/generic.wav"),
];

/// A phase boundary worth ringing for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ring {
    pub ended: PhaseType,
    pub started: PhaseType,
    pub n: u32,
}

impl Ring {
    fn title(&self) -> &'static str {
        match self.started {
            PhaseType::Focus => "Back to focus",
            PhaseType::ShortBreak => "Short break",
            PhaseType::LongBreak => "Long break",
        }
    }

    /// Focus phases sit at odd counters, so pomodoro `k` is counter `2k - 1`.
    fn body(&self) -> String {
        match self.ended {
            PhaseType::Focus => format!("Pomodoro #{} done", self.n.saturating_sub(1).div_ceil(2)),
            _ => format!("Pomodoro #{} starts now", self.n.div_ceil(2)),
        }
    }
}

/// Start the alarm thread. The returned sender is the only handle; dropping
/// every clone stops the thread.
pub fn spawn(sound: bool) -> io::Result<mpsc::Sender<Ring>> {
    let (tx, rx) = mpsc::channel::<Ring>();
    thread::Builder::new()
        .name("alarm".into())
        .spawn(move || {
            for ring in rx {
                ring_once(&ring, sound);
            }
            debug!("alarm worker stopped");
        })?;
    Ok(tx)
}

fn ring_once(ring: &Ring, sound: bool) {
    if let Err(e) = Notification::new()
        .summary(ring.title())
        .body(&ring.body())
        .appname("tickadoro")
        .icon("alarm-clock")
        .urgency(Urgency::Critical)
        .show()
    {
        warn!("desktop notification failed: {e}");
    }

    if sound {
        play_sound();
    }
}

fn play_sound() {
    let Some((cmd, file)) = SOUND_PLAYERS
        .iter()
        .find(|(_, file)| Path::new(file).exists())
    else {
        debug!("no alarm sound found");
        return;
    };

    let spawned = Command::new(cmd)
        .arg(file)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    match spawned {
        // Reap the player so it doesn't linger as a zombie.
        Ok(mut child) => {
            let _ = child.wait();
        }
        Err(e) => warn!("failed to start {cmd}: {e}"),
    }
}
