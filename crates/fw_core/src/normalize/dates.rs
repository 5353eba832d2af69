use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::filing::{sanitize_segment, UNKNOWN};

/// Reduce a manifest `Filed At` cell to the `YYYY-MM-DD` token used in
/// filing file names.
///
/// RFC3339 values keep the calendar date of their own offset (a filing
/// accepted at 16:05 -05:00 stays on that day). Anything unparseable is kept
/// verbatim with path-hostile characters replaced.
pub fn normalize_filed_at(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return UNKNOWN.to_string();
    };

    let date = OffsetDateTime::parse(raw, &Rfc3339)
        .map(|dt| dt.date())
        .or_else(|_| {
            PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
                .map(|dt| dt.date())
        })
        .or_else(|_| Date::parse(raw, format_description!("[year]-[month]-[day]")));

    match date.ok().and_then(|d| d.format(format_description!("[year]-[month]-[day]")).ok()) {
        Some(s) => s,
        None => sanitize_segment(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_filed_at;

    #[test]
    fn keeps_local_calendar_date_for_rfc3339() {
        assert_eq!(normalize_filed_at(Some("2009-03-02T16:05:33-05:00")), "2009-03-02");
        assert_eq!(normalize_filed_at(Some("2009-03-02T23:59:59+09:00")), "2009-03-02");
    }

    #[test]
    fn accepts_plain_dates_and_naive_datetimes() {
        assert_eq!(normalize_filed_at(Some("2021-11-05")), "2021-11-05");
        assert_eq!(normalize_filed_at(Some(" 2021-11-05 08:00:00 ")), "2021-11-05");
    }

    #[test]
    fn missing_or_garbage_values() {
        assert_eq!(normalize_filed_at(None), "unknown");
        assert_eq!(normalize_filed_at(Some("   ")), "unknown");
        assert_eq!(normalize_filed_at(Some("Q3 2020/draft")), "Q3-2020-draft");
    }
}
