use serde::{Deserialize, Serialize};

/// Longest streak reported, in days.
pub const DEFAULT_STREAK_CAP: u32 = 30;

/// Whether taken dates recorded outside a medication's own
/// `[start_date, end_date]` range count as doses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfWindowPolicy {
    /// Drop them before counting doses or walking the streak.
    #[default]
    Ignore,
    /// Keep them.
    Count,
}

/// Where the backward streak walk is allowed to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakBoundary {
    /// The streak never crosses the start of the summary window
    /// (the current calendar month on both dashboards).
    #[default]
    CalendarMonth,
    /// The walk continues into previous months until a gap or the cap.
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdherenceConfig {
    pub out_of_window: OutOfWindowPolicy,
    pub streak_boundary: StreakBoundary,
    pub streak_cap: u32,
}

impl Default for AdherenceConfig {
    fn default() -> Self {
        Self {
            out_of_window: OutOfWindowPolicy::default(),
            streak_boundary: StreakBoundary::default(),
            streak_cap: DEFAULT_STREAK_CAP,
        }
    }
}
