use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DateWindow {
    /// Bounds given in the wrong order are swapped.
    pub fn new(first: NaiveDate, last: NaiveDate) -> Self {
        if first <= last {
            Self { first, last }
        } else {
            Self { first: last, last: first }
        }
    }

    /// The calendar month containing `day`.
    pub fn month_of(day: NaiveDate) -> Self {
        let first = NaiveDate::from_ymd_opt(day.year(), day.month(), 1).unwrap_or(day);
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(day);
        Self { first, last }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.first <= day && day <= self.last
    }

    /// Number of days in the window.
    pub fn len(&self) -> u32 {
        ((self.last - self.first).num_days() + 1) as u32
    }

    /// Number of days in the window on or before `reference`.
    pub fn elapsed(&self, reference: NaiveDate) -> u32 {
        if reference < self.first {
            0
        } else if reference >= self.last {
            self.len()
        } else {
            ((reference - self.first).num_days() + 1) as u32
        }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let last = self.last;
        self.first.iter_days().take_while(move |d| *d <= last)
    }
}
