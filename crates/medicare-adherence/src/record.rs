use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::config::OutOfWindowPolicy;

/// The slice of a medication record the calculator needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoseRecord {
    /// Absent means "no lower bound".
    pub start_date: Option<NaiveDate>,
    /// Absent means "no upper bound".
    pub end_date: Option<NaiveDate>,
    pub taken_dates: BTreeSet<NaiveDate>,
}

impl DoseRecord {
    pub fn new(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
            taken_dates: BTreeSet::new(),
        }
    }

    pub fn with_taken<I>(mut self, days: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.taken_dates.extend(days);
        self
    }

    /// Build a record from ISO day strings. Malformed bounds become "no
    /// constraint", malformed taken dates are skipped.
    pub fn from_iso<I, S>(start_date: Option<&str>, end_date: Option<&str>, taken: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            start_date: start_date.and_then(parse_day),
            end_date: end_date.and_then(parse_day),
            taken_dates: taken.into_iter().filter_map(|s| parse_day(s.as_ref())).collect(),
        }
    }

    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.start_date.is_none_or(|start| start <= day) && self.end_date.is_none_or(|end| day <= end)
    }

    /// Taken dates that survive the out-of-window policy.
    pub fn effective_taken(
        &self,
        policy: OutOfWindowPolicy,
    ) -> impl DoubleEndedIterator<Item = NaiveDate> + '_ {
        self.taken_dates
            .iter()
            .copied()
            .filter(move |d| policy == OutOfWindowPolicy::Count || self.is_active_on(*d))
    }

    pub fn was_taken_on(&self, day: NaiveDate, policy: OutOfWindowPolicy) -> bool {
        self.taken_dates.contains(&day) && (policy == OutOfWindowPolicy::Count || self.is_active_on(day))
    }

    pub fn last_taken(&self, policy: OutOfWindowPolicy) -> Option<NaiveDate> {
        self.effective_taken(policy).next_back()
    }
}

/// Parse an ISO day (`YYYY-MM-DD`). A full timestamp is accepted and
/// truncated to its date part.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
