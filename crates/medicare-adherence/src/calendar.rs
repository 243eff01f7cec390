use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::AdherenceConfig;
use crate::record::DoseRecord;
use crate::summary::any_taken_on;
use crate::window::DateWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Taken,
    /// A past day with at least one active medication and nothing taken.
    Missed,
    Today,
    Upcoming,
    NoMedication,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub taken_count: u32,
    pub active_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodayStatus {
    Completed,
    Pending,
    NoMedication,
}

/// Per-day marks for a calendar widget.
pub fn calendar(
    records: &[DoseRecord],
    window: DateWindow,
    today: NaiveDate,
    config: &AdherenceConfig,
) -> Vec<CalendarDay> {
    window
        .days()
        .map(|date| {
            let taken_count = records
                .iter()
                .filter(|r| r.was_taken_on(date, config.out_of_window))
                .count() as u32;
            let active_count = records.iter().filter(|r| r.is_active_on(date)).count() as u32;

            let status = if taken_count > 0 {
                DayStatus::Taken
            } else if date == today {
                DayStatus::Today
            } else if date > today {
                DayStatus::Upcoming
            } else if active_count > 0 {
                DayStatus::Missed
            } else {
                DayStatus::NoMedication
            };

            CalendarDay {
                date,
                status,
                taken_count,
                active_count,
            }
        })
        .collect()
}

pub fn today_status(records: &[DoseRecord], today: NaiveDate, config: &AdherenceConfig) -> TodayStatus {
    if !records.iter().any(|r| r.is_active_on(today)) {
        TodayStatus::NoMedication
    } else if any_taken_on(records, today, config.out_of_window) {
        TodayStatus::Completed
    } else {
        TodayStatus::Pending
    }
}

/// Items ordered by most recent taken date, newest first. Items never taken
/// are left out; ties keep their input order.
pub fn recent_activity<T, F>(items: &[T], last_taken: F, limit: usize) -> Vec<(&T, NaiveDate)>
where
    F: Fn(&T) -> Option<NaiveDate>,
{
    let mut taken: Vec<(&T, NaiveDate)> = items
        .iter()
        .filter_map(|item| last_taken(item).map(|d| (item, d)))
        .collect();
    taken.sort_by(|a, b| b.1.cmp(&a.1));
    taken.truncate(limit);
    taken
}

#[cfg(test)]
mod tests {
    use super::*;

    fn june(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn calendar_marks_each_kind_of_day() {
        let record = DoseRecord::new(Some(june(3)), Some(june(30))).with_taken([june(4), june(10)]);
        let days = calendar(&[record], DateWindow::month_of(june(10)), june(10), &AdherenceConfig::default());

        assert_eq!(days.len(), 30);
        assert_eq!(days[0].status, DayStatus::NoMedication);
        assert_eq!(days[2].status, DayStatus::Missed);
        assert_eq!(days[3].status, DayStatus::Taken);
        assert_eq!(days[9].status, DayStatus::Taken);
        assert_eq!(days[10].status, DayStatus::Upcoming);
    }

    #[test]
    fn untaken_today_is_today_not_missed() {
        let record = DoseRecord::new(None, None);
        let days = calendar(&[record], DateWindow::new(june(9), june(11)), june(10), &AdherenceConfig::default());
        let statuses: Vec<DayStatus> = days.iter().map(|d| d.status).collect();
        assert_eq!(statuses, vec![DayStatus::Missed, DayStatus::Today, DayStatus::Upcoming]);
    }

    #[test]
    fn today_status_tracks_taken_records() {
        let config = AdherenceConfig::default();
        assert_eq!(today_status(&[], june(10), &config), TodayStatus::NoMedication);

        let pending = DoseRecord::new(None, None).with_taken([june(9)]);
        assert_eq!(today_status(&[pending.clone()], june(10), &config), TodayStatus::Pending);

        let done = pending.with_taken([june(10)]);
        assert_eq!(today_status(&[done], june(10), &config), TodayStatus::Completed);
    }

    #[test]
    fn recent_activity_orders_newest_first_and_limits() {
        let items = vec![
            ("a", Some(june(3))),
            ("b", None),
            ("c", Some(june(9))),
            ("d", Some(june(5))),
            ("e", Some(june(1))),
            ("f", Some(june(7))),
            ("g", Some(june(2))),
        ];
        let recent = recent_activity(&items, |i| i.1, 5);
        let names: Vec<&str> = recent.iter().map(|(i, _)| i.0).collect();
        assert_eq!(names, vec!["c", "f", "d", "a", "g"]);
    }
}
