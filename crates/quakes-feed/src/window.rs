//! Month windows for the paginated "major events" query.

use chrono::{DateTime, Months, Utc};

/// Half-open `[start, end)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Window for `page`: page 0 is `[now - 1 month, now)`, page 1 the month
/// before that, and so on.
///
/// Both bounds are computed from `now` directly, so consecutive pages share
/// their boundary even when month lengths differ. Returns `None` if the
/// date arithmetic leaves chrono's range.
#[must_use]
pub fn major_window(now: DateTime<Utc>, page: u32) -> Option<DateWindow> {
    let end = now.checked_sub_months(Months::new(page))?;
    let start = now.checked_sub_months(Months::new(page.checked_add(1)?))?;
    Some(DateWindow { start, end })
}
