//! Capsule lifecycle evaluation.
//!
//! Pure functions deciding what a capsule displays as and whether a new
//! capsule starts out sealed. Both date rules live here side by side: the
//! creation rule locks only strictly-future dates, while display treats an
//! open date of today as already reachable.
use chrono::{Local, NaiveDate};
use console::Style;
use std::fmt;

use crate::capsule::Capsule;

/// Display state of a capsule, derived from its stored fields and the
/// current date. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapsuleState {
    /// Locked and its open date has not arrived yet
    Sealed,
    /// Locked but the open date has arrived; the user may open it
    Openable,
    /// Unlocked, either by the open operation or because it was created
    /// with an open date already reached
    Opened,
}

impl CapsuleState {
    /// Badge text shown in listings.
    pub fn label(&self) -> &'static str {
        match self {
            CapsuleState::Sealed => "sealed",
            CapsuleState::Openable => "openable",
            CapsuleState::Opened => "opened",
        }
    }

    /// Terminal style for the badge.
    pub fn style(&self) -> Style {
        match self {
            CapsuleState::Sealed => Style::new().yellow(),
            CapsuleState::Openable => Style::new().cyan().bold(),
            CapsuleState::Opened => Style::new().green(),
        }
    }
}

impl fmt::Display for CapsuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Derives the display state of a capsule for the given calendar date.
pub fn effective_state(capsule: &Capsule, today: NaiveDate) -> CapsuleState {
    if !capsule.is_locked {
        CapsuleState::Opened
    } else if capsule.open_date <= today {
        CapsuleState::Openable
    } else {
        CapsuleState::Sealed
    }
}

/// Creation-time lock rule: a capsule starts sealed only when its open date
/// is strictly in the future. A capsule dated today is born unlocked.
pub fn sealed_at_creation(open_date: NaiveDate, today: NaiveDate) -> bool {
    open_date > today
}

/// The current calendar date in the user's local timezone. Date comparisons
/// follow the user's wall clock; stored timestamps stay UTC.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
