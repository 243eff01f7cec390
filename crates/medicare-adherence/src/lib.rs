/// MediCare adherence calculator
///
/// Pure computation over a patient's medication records: adherence rate,
/// streak, missed doses, calendar marks and recent activity. Both dashboards
/// (server summary endpoint and client view models) go through this crate so
/// the numbers they show can never drift apart.

pub mod calendar;
pub mod config;
pub mod record;
pub mod summary;
pub mod window;

pub use calendar::{CalendarDay, DayStatus, TodayStatus, calendar, recent_activity, today_status};
pub use config::{AdherenceConfig, DEFAULT_STREAK_CAP, OutOfWindowPolicy, StreakBoundary};
pub use record::{DoseRecord, parse_day};
pub use summary::{AdherenceSummary, rate, streak, summarize};
pub use window::DateWindow;
