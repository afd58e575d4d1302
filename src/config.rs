use std::fmt;

use clap::{Args, ValueEnum};

pub const DEFAULT_LOW_ATTENDANCE_THRESHOLD: u32 = 75;
pub const DEFAULT_CONSECUTIVE_ABSENCE_THRESHOLD: usize = 3;

/// How the absence streak treats several sessions held on the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StreakMode {
    /// A date extends the streak only when all of its sessions were absences.
    #[default]
    Day,
    /// Every session is a step in the streak, in chronological order.
    Session,
}

impl StreakMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreakMode::Session => "session",
            StreakMode::Day => "day",
        }
    }
}

impl fmt::Display for StreakMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds and policies for the aggregator and classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Args)]
pub struct RiskConfig {
    /// Flag students whose attendance percentage is below this value
    #[arg(
        long,
        env = "LOW_ATTENDANCE_THRESHOLD",
        default_value_t = DEFAULT_LOW_ATTENDANCE_THRESHOLD,
        value_parser = clap::value_parser!(u32).range(0..=100)
    )]
    pub low_attendance_threshold: u32,

    /// Flag students with at least this many consecutive absences
    #[arg(
        long,
        env = "CONSECUTIVE_ABSENCE_THRESHOLD",
        default_value_t = DEFAULT_CONSECUTIVE_ABSENCE_THRESHOLD
    )]
    pub consecutive_absence_threshold: usize,

    /// Count `late` sessions as present when computing the percentage
    #[arg(long, env = "COUNT_LATE_AS_PRESENT")]
    pub count_late_as_present: bool,

    #[arg(long, env = "STREAK_MODE", value_enum, default_value_t = StreakMode::Day)]
    pub streak_mode: StreakMode,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            low_attendance_threshold: DEFAULT_LOW_ATTENDANCE_THRESHOLD,
            consecutive_absence_threshold: DEFAULT_CONSECUTIVE_ABSENCE_THRESHOLD,
            count_late_as_present: false,
            streak_mode: StreakMode::Day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        risk: RiskConfig,
    }

    #[test]
    fn cli_defaults_match_default_impl() {
        let harness = Harness::parse_from(["harness"]);
        assert_eq!(harness.risk, RiskConfig::default());
    }

    #[test]
    fn thresholds_can_be_overridden() {
        let harness = Harness::parse_from([
            "harness",
            "--low-attendance-threshold",
            "80",
            "--consecutive-absence-threshold",
            "5",
            "--count-late-as-present",
            "--streak-mode",
            "session",
        ]);
        assert_eq!(harness.risk.low_attendance_threshold, 80);
        assert_eq!(harness.risk.consecutive_absence_threshold, 5);
        assert!(harness.risk.count_late_as_present);
        assert_eq!(harness.risk.streak_mode, StreakMode::Session);
    }

    #[test]
    fn percentage_threshold_is_bounded() {
        let result = Harness::try_parse_from(["harness", "--low-attendance-threshold", "120"]);
        assert!(result.is_err());
    }
}
