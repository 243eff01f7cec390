use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::{AdherenceConfig, OutOfWindowPolicy, StreakBoundary};
use crate::record::DoseRecord;
use crate::window::DateWindow;

/// Dashboard numbers for one patient over one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdherenceSummary {
    /// Percent of doses expected up to the reference day that were taken.
    pub adherence_rate: u32,
    /// Percent of doses expected over the whole window that were taken.
    pub monthly_rate: u32,
    pub current_streak: u32,
    pub missed_doses: u32,
    pub taken_doses: u32,
    pub expected_doses: u32,
    pub expected_doses_to_date: u32,
    pub active_medications: u32,
    /// Days in the trailing week (reference included) with any taken record.
    pub taken_this_week: u32,
}

/// Compute the summary for `records` as seen on `reference`.
///
/// Only medications active on `reference` are expected, and only their
/// taken dates inside the window and not after `reference` are counted, so
/// `taken_doses <= expected_doses_to_date` always holds.
pub fn summarize(
    records: &[DoseRecord],
    reference: NaiveDate,
    window: DateWindow,
    config: &AdherenceConfig,
) -> AdherenceSummary {
    let active: Vec<&DoseRecord> = records.iter().filter(|r| r.is_active_on(reference)).collect();
    let active_medications = active.len() as u32;

    let expected_doses = active_medications * window.len();
    let expected_doses_to_date = active_medications * window.elapsed(reference);

    let taken_doses: u32 = active
        .iter()
        .map(|r| {
            r.effective_taken(config.out_of_window)
                .filter(|d| window.contains(*d) && *d <= reference)
                .count() as u32
        })
        .sum();

    AdherenceSummary {
        adherence_rate: rate(taken_doses, expected_doses_to_date),
        monthly_rate: rate(taken_doses, expected_doses),
        current_streak: streak(records, reference, window, config),
        missed_doses: expected_doses_to_date.saturating_sub(taken_doses),
        taken_doses,
        expected_doses,
        expected_doses_to_date,
        active_medications,
        taken_this_week: taken_days_in_week(records, reference, config.out_of_window),
    }
}

/// `round(100 * taken / expected)`, 0 when nothing is expected.
pub fn rate(taken: u32, expected: u32) -> u32 {
    if expected == 0 {
        return 0;
    }
    (f64::from(taken) * 100.0 / f64::from(expected)).round() as u32
}

/// Consecutive days ending at `reference` on which any medication was taken.
pub fn streak(
    records: &[DoseRecord],
    reference: NaiveDate,
    window: DateWindow,
    config: &AdherenceConfig,
) -> u32 {
    let mut count = 0;
    let mut day = reference;

    while count < config.streak_cap {
        if config.streak_boundary == StreakBoundary::CalendarMonth && day < window.first {
            break;
        }
        if !any_taken_on(records, day, config.out_of_window) {
            break;
        }
        count += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }

    count
}

pub(crate) fn any_taken_on(records: &[DoseRecord], day: NaiveDate, policy: OutOfWindowPolicy) -> bool {
    records.iter().any(|r| r.was_taken_on(day, policy))
}

fn taken_days_in_week(records: &[DoseRecord], reference: NaiveDate, policy: OutOfWindowPolicy) -> u32 {
    let start = reference.checked_sub_days(Days::new(6)).unwrap_or(reference);
    DateWindow::new(start, reference)
        .days()
        .filter(|d| any_taken_on(records, *d, policy))
        .count() as u32
}
