//! Display strings shared by the list and detail views.

use chrono::{DateTime, Utc};

/// `1234` → `1.2K`, `3_400_000` → `3.4M`.
pub fn abbreviate_count(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

pub fn relative_time(at: DateTime<Utc>) -> String {
    relative_time_from(at, Utc::now())
}

/// Age of `at` as seen from `now`. Anything a week or older is shown as a
/// date.
pub fn relative_time_from(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(at);
    let minutes = age.num_minutes();
    let hours = age.num_hours();
    let days = age.num_days();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        at.format("%-m/%-d/%Y").to_string()
    }
}

/// Read time of a digest item, given in seconds.
pub fn read_time(seconds: Option<u32>) -> String {
    match seconds {
        None | Some(0) => "Quick read".to_string(),
        Some(s) if s < 60 => format!("{}s", s),
        Some(s) => format!("{}m read", s.div_ceil(60)),
    }
}

/// Time spent reading, e.g. `45m` or `1h 5m`.
pub fn duration(seconds: u64) -> String {
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Split a `|`-joined key-point string, dropping blank entries.
pub fn split_key_points(joined: &str) -> Vec<String> {
    joined
        .split('|')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

const VISIBLE_PAGES: u32 = 5;

/// Page buttons around the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub pages: Vec<u32>,
    /// Page 1 is outside the window and gets its own button.
    pub show_first: bool,
    pub leading_ellipsis: bool,
    pub show_last: bool,
    pub trailing_ellipsis: bool,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Up to five consecutive pages centred on `current`, shifted left near the
/// end. `None` when there is only one page.
pub fn page_window(current: u32, total_pages: u32) -> Option<PageWindow> {
    if total_pages <= 1 {
        return None;
    }
    let mut start = current.saturating_sub(VISIBLE_PAGES / 2).max(1);
    let end = (start + VISIBLE_PAGES - 1).min(total_pages);
    if end == total_pages {
        start = end.saturating_sub(VISIBLE_PAGES - 1).max(1);
    }

    Some(PageWindow {
        pages: (start..=end).collect(),
        show_first: start > 1,
        leading_ellipsis: start > 2,
        show_last: end < total_pages,
        trailing_ellipsis: end + 1 < total_pages,
        has_prev: current > 1,
        has_next: current < total_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_abbreviate_count() {
        assert_eq!(abbreviate_count(999), "999");
        assert_eq!(abbreviate_count(1_234), "1.2K");
        assert_eq!(abbreviate_count(3_400_000), "3.4M");
    }

    #[test]
    fn test_relative_time_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        assert_eq!(relative_time_from(now - Duration::seconds(20), now), "Just now");
        assert_eq!(relative_time_from(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(relative_time_from(now - Duration::hours(3), now), "3h ago");
        assert_eq!(relative_time_from(now - Duration::days(2), now), "2d ago");
        assert_eq!(relative_time_from(now - Duration::days(30), now), "2/19/2024");
    }

    #[test]
    fn test_read_time() {
        assert_eq!(read_time(None), "Quick read");
        assert_eq!(read_time(Some(45)), "45s");
        assert_eq!(read_time(Some(130)), "3m read");
    }

    #[test]
    fn test_duration() {
        assert_eq!(duration(0), "0m");
        assert_eq!(duration(45 * 60), "45m");
        assert_eq!(duration(65 * 60), "1h 5m");
    }

    #[test]
    fn test_split_key_points() {
        assert_eq!(split_key_points("a | b||c "), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_page_window_middle() {
        let w = page_window(6, 20).unwrap();
        assert_eq!(w.pages, vec![4, 5, 6, 7, 8]);
        assert!(w.show_first && w.leading_ellipsis);
        assert!(w.show_last && w.trailing_ellipsis);
    }

    #[test]
    fn test_page_window_near_end_shifts_left() {
        let w = page_window(19, 20).unwrap();
        assert_eq!(w.pages, vec![16, 17, 18, 19, 20]);
        assert!(!w.show_last);
        assert!(w.has_next);
    }

    #[test]
    fn test_page_window_start_and_single_page() {
        let w = page_window(1, 3).unwrap();
        assert_eq!(w.pages, vec![1, 2, 3]);
        assert!(!w.show_first && !w.has_prev);
        assert!(page_window(1, 1).is_none());
    }
}
