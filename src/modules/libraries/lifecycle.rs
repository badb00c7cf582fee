//! Subscription status machine and the date arithmetic behind the admin views.
//!
//! Allowed moves: `pending -> active` (payment confirmed), `active -> banned`
//! and `any -> pending` (reset, or a plan change). Everything else is refused.
//! The three admin views are computed from dates on every call; nothing here
//! is stored.

use chrono::{Days, NaiveDate};
use thiserror::Error;

use super::models::{Library, LibraryStatus};

/// Length of one paid period.
pub const PLAN_PERIOD_DAYS: u64 = 30;
const BAN_AFTER_EXPIRY_DAYS: i64 = 60;
const BAN_WITHOUT_PLAN_DAYS: i64 = 30;
const PENDING_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    ConfirmPayment,
    Ban,
    Reset,
}

impl StatusAction {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusAction::ConfirmPayment => "confirm-payment",
            StatusAction::Ban => "ban",
            StatusAction::Reset => "reset",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot {} a library that is {from:?}", action.as_str())]
pub struct IllegalTransition {
    pub from: LibraryStatus,
    pub action: StatusAction,
}

/// Status after applying `action`.
pub fn transition(from: LibraryStatus, action: StatusAction) -> Result<LibraryStatus, IllegalTransition> {
    match (from, action) {
        (LibraryStatus::Pending, StatusAction::ConfirmPayment) => Ok(LibraryStatus::Active),
        (LibraryStatus::Active, StatusAction::Ban) => Ok(LibraryStatus::Banned),
        (_, StatusAction::Reset) => Ok(LibraryStatus::Pending),
        _ => Err(IllegalTransition { from, action }),
    }
}

/// A confirmed payment extends from whichever is later: today or the current expiry.
pub fn next_plan_end(today: NaiveDate, current: Option<NaiveDate>) -> NaiveDate {
    let base = current.map_or(today, |end| end.max(today));
    base.checked_add_days(Days::new(PLAN_PERIOD_DAYS))
        .unwrap_or(NaiveDate::MAX)
}

pub fn is_in_waiting(library: &Library) -> bool {
    library.status == LibraryStatus::Pending
}

/// Long overdue, or registered long ago and never paid.
pub fn is_ban_eligible(library: &Library, today: NaiveDate) -> bool {
    if library.status == LibraryStatus::Banned {
        return false;
    }
    match library.data_end_plan {
        Some(end) => days_between(end, today) >= BAN_AFTER_EXPIRY_DAYS,
        None => days_between(library.create_at.date_naive(), today) >= BAN_WITHOUT_PLAN_DAYS,
    }
}

/// Active, with an expiry that passed within the last month.
pub fn is_pending_eligible(library: &Library, today: NaiveDate) -> bool {
    library.status == LibraryStatus::Active
        && library
            .data_end_plan
            .is_some_and(|end| (0..=PENDING_WINDOW_DAYS).contains(&days_between(end, today)))
}

fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}
