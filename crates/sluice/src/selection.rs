//! Which files in a watch directory belong to today's drop.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Utc};

/// Today's date in `offset`, rendered with `format`.
///
/// `format` must already be validated with [`is_valid_date_format`].
pub fn today(offset: FixedOffset, format: &str) -> String {
    date_at(Utc::now(), offset, format)
}

/// The date of instant `now` in `offset`, rendered with `format`.
pub fn date_at(now: DateTime<Utc>, offset: FixedOffset, format: &str) -> String {
    now.with_timezone(&offset).format(format).to_string()
}

/// Whether a file name is part of today's drop.
///
/// The name must end with `extension` and contain `today` anywhere.
///
/// ```
/// use sluice::is_eligible;
///
/// assert!(is_eligible("global_health_data_2025-04-27.csv", "2025-04-27", ".csv"));
/// assert!(!is_eligible("global_health_data_2025-04-26.csv", "2025-04-27", ".csv"));
/// ```
pub fn is_eligible(file_name: &str, today: &str, extension: &str) -> bool {
    file_name.ends_with(extension) && file_name.contains(today)
}

/// Parse a fixed UTC offset such as `+05:30`.
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    value.trim().parse().ok()
}

/// Whether `format` is a strftime pattern chrono can render.
pub fn is_valid_date_format(format: &str) -> bool {
    !format.is_empty() && !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}
