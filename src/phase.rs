//! Phase types, per-phase durations and the fixed sequencing rule.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;

/// Phases in one full cycle: four focus phases, three short breaks in
/// between and one long break at the end.
pub const PHASES_PER_CYCLE: u32 = 8;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PhaseType {
    Focus,
    ShortBreak,
    LongBreak,
}

impl PhaseType {
    pub const ALL: [PhaseType; 3] = [Self::Focus, Self::ShortBreak, Self::LongBreak];

    /// Token written to the snapshot log.
    pub fn as_token(&self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::ShortBreak => "short_break",
            Self::LongBreak => "long_break",
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, Self::Focus)
    }
}

impl fmt::Display for PhaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown phase type {0:?} (expected focus, short_break or long_break)")]
pub struct UnknownPhase(pub String);

impl FromStr for PhaseType {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focus" => Ok(Self::Focus),
            "short_break" => Ok(Self::ShortBreak),
            "long_break" => Ok(Self::LongBreak),
            other => Err(UnknownPhase(other.to_string())),
        }
    }
}

/// Phase type that follows `current`, where `n` is the counter of the phase
/// being entered (already incremented).
///
/// Breaks always return to focus. A focus phase is followed by a long break
/// when the incoming counter closes a cycle, otherwise by a short break, so
/// counters `8, 16, 24, ...` are long breaks for a state that started at
/// `n = 1` on focus.
pub fn next_phase(current: PhaseType, n: u32) -> PhaseType {
    match current {
        PhaseType::ShortBreak | PhaseType::LongBreak => PhaseType::Focus,
        PhaseType::Focus if n % PHASES_PER_CYCLE == 0 => PhaseType::LongBreak,
        PhaseType::Focus => PhaseType::ShortBreak,
    }
}

/// Configured length of each phase.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PhaseDurations {
    #[serde(with = "crate::duration::text")]
    pub focus: Duration,
    #[serde(with = "crate::duration::text")]
    pub short_break: Duration,
    #[serde(with = "crate::duration::text")]
    pub long_break: Duration,
}

impl PhaseDurations {
    pub fn get(&self, phase: PhaseType) -> Duration {
        match phase {
            PhaseType::Focus => self.focus,
            PhaseType::ShortBreak => self.short_break,
            PhaseType::LongBreak => self.long_break,
        }
    }

    pub fn get_mut(&mut self, phase: PhaseType) -> &mut Duration {
        match phase {
            PhaseType::Focus => &mut self.focus,
            PhaseType::ShortBreak => &mut self.short_break,
            PhaseType::LongBreak => &mut self.long_break,
        }
    }

    /// Raise any duration below `floor` to `floor`.
    pub fn clamped_to(mut self, floor: Duration) -> Self {
        for phase in PhaseType::ALL {
            let d = self.get_mut(phase);
            if *d < floor {
                *d = floor;
            }
        }
        self
    }
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            focus: Duration::from_secs(25 * 60),
            short_break: Duration::from_secs(5 * 60),
            long_break: Duration::from_secs(20 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tokens_parse_back() {
        for phase in PhaseType::ALL {
            assert_eq!(phase.as_token().parse::<PhaseType>(), Ok(phase));
        }
        assert_eq!(
            "work".parse::<PhaseType>(),
            Err(UnknownPhase("work".into()))
        );
    }

    #[test]
    fn first_cycle_has_long_break_after_fourth_focus() {
        let mut phase = PhaseType::Focus;
        let mut seen = Vec::new();
        for n in 2..=9 {
            phase = next_phase(phase, n);
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                PhaseType::ShortBreak,
                PhaseType::Focus,
                PhaseType::ShortBreak,
                PhaseType::Focus,
                PhaseType::ShortBreak,
                PhaseType::Focus,
                PhaseType::LongBreak,
                PhaseType::Focus,
            ]
        );
    }

    #[test]
    fn long_breaks_repeat_every_cycle() {
        let mut phase = PhaseType::Focus;
        let mut long_at = Vec::new();
        for n in 2..=40 {
            phase = next_phase(phase, n);
            if phase == PhaseType::LongBreak {
                long_at.push(n);
            }
        }
        assert_eq!(long_at, vec![8, 16, 24, 32, 40]);
    }

    #[test]
    fn clamping_raises_only_short_durations() {
        let durations = PhaseDurations {
            focus: Duration::ZERO,
            short_break: Duration::from_secs(300),
            long_break: Duration::from_millis(10),
        }
        .clamped_to(Duration::from_secs(1));
        assert_eq!(durations.focus, Duration::from_secs(1));
        assert_eq!(durations.short_break, Duration::from_secs(300));
        assert_eq!(durations.long_break, Duration::from_secs(1));
    }

    proptest! {
        #[test]
        fn breaks_always_return_to_focus(n in 1u32..u32::MAX) {
            prop_assert_eq!(next_phase(PhaseType::ShortBreak, n), PhaseType::Focus);
            prop_assert_eq!(next_phase(PhaseType::LongBreak, n), PhaseType::Focus);
        }

        #[test]
        fn focus_never_follows_focus(n in 1u32..u32::MAX) {
            prop_assert!(next_phase(PhaseType::Focus, n).is_break());
        }
    }
}
