use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::RsvpStatus;
use crate::utils::percentage;

/// Aggregate statistics for one run, built from the final event list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_events: usize,
    pub total_rsvps: usize,
    pub rsvp_breakdown: BTreeMap<RsvpStatus, usize>,
    pub events_by_group: BTreeMap<String, usize>,
    pub date_range: (DateTime<Utc>, DateTime<Utc>),
}

impl Summary {
    /// Zero-valued summary; the date range collapses to `now`.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            total_events: 0,
            total_rsvps: 0,
            rsvp_breakdown: RsvpStatus::ALL.iter().map(|s| (*s, 0)).collect(),
            events_by_group: BTreeMap::new(),
            date_range: (now, now),
        }
    }

    pub fn count(&self, status: RsvpStatus) -> usize {
        self.rsvp_breakdown.get(&status).copied().unwrap_or(0)
    }

    pub fn percentage_of(&self, status: RsvpStatus) -> f64 {
        percentage(self.count(status), self.total_rsvps)
    }

    pub fn yes_percentage(&self) -> f64 {
        self.percentage_of(RsvpStatus::Yes)
    }

    pub fn no_percentage(&self) -> f64 {
        self.percentage_of(RsvpStatus::No)
    }

    pub fn waitlist_percentage(&self) -> f64 {
        self.percentage_of(RsvpStatus::Waitlist)
    }

    /// YES share of the definite answers, or `None` when nobody answered.
    pub fn attendance_rate(&self) -> Option<f64> {
        let yes = self.count(RsvpStatus::Yes);
        let decided = yes + self.count(RsvpStatus::No);
        (decided > 0).then(|| percentage(yes, decided))
    }

    /// Groups ordered by event count (desc), then name.
    pub fn groups_by_event_count(&self) -> Vec<(&str, usize)> {
        let mut groups: Vec<(&str, usize)> = self
            .events_by_group
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        groups.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        groups
    }
}
