//! Pure scheduling: which sources are due for a sweep at a given instant.
//!
//! No clock access here; callers pass `now` in so the logic is directly
//! testable.

use chrono::{DateTime, Duration, Utc};

use crate::db::Source;

/// Sources due for fetching at `now`, in the order they were given.
pub fn select_due<'a>(sources: &'a [Source], now: DateTime<Utc>) -> Vec<&'a Source> {
    sources
        .iter()
        .filter(|source| is_due(source, now))
        .collect()
}

/// A source is due when enabled and either never fetched or at least its
/// interval past the last fetch. Exactly-on-the-boundary counts as due.
pub fn is_due(source: &Source, now: DateTime<Utc>) -> bool {
    if !source.enabled {
        return false;
    }
    match source.last_fetched_at {
        None => true,
        // An interval too large to represent can never elapse.
        Some(last) => match Duration::try_hours(source.fetch_interval_hours) {
            Some(interval) => now - last >= interval,
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SourceKind;

    fn source(enabled: bool, last_fetched_at: Option<DateTime<Utc>>, interval: i64) -> Source {
        Source {
            id: 1,
            name: "Example".to_string(),
            url: "https://example.com/feed.xml".to_string(),
            kind: SourceKind::Feed,
            enabled,
            last_fetched_at,
            fetch_interval_hours: interval,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn never_fetched_source_is_due() {
        let now = Utc::now();
        assert!(is_due(&source(true, None, 24), now));
    }

    #[test]
    fn interval_not_elapsed_is_not_due() {
        let now = Utc::now();
        let last = now - Duration::hours(23);
        assert!(!is_due(&source(true, Some(last), 24), now));
    }

    #[test]
    fn interval_elapsed_is_due() {
        let now = Utc::now();
        let last = now - Duration::hours(24) - Duration::minutes(1);
        assert!(is_due(&source(true, Some(last), 24), now));
    }

    #[test]
    fn boundary_counts_as_due() {
        let now = Utc::now();
        let last = now - Duration::hours(24);
        assert!(is_due(&source(true, Some(last), 24), now));
    }

    #[test]
    fn unrepresentable_interval_never_panics() {
        let now = Utc::now();
        let stale = now - Duration::hours(100);
        assert!(!is_due(&source(true, Some(stale), i64::MAX), now));
        // Never-fetched sources are still due regardless of the interval.
        assert!(is_due(&source(true, None, i64::MAX), now));
    }

    #[test]
    fn disabled_sources_are_never_due() {
        let now = Utc::now();
        assert!(!is_due(&source(false, None, 24), now));
        let stale = now - Duration::hours(100);
        assert!(!is_due(&source(false, Some(stale), 24), now));
    }

    #[test]
    fn select_due_preserves_order_and_filters() {
        let now = Utc::now();
        let sources = vec![
            source(true, None, 24),
            source(true, Some(now - Duration::hours(1)), 24),
            source(true, Some(now - Duration::hours(48)), 24),
        ];
        let due = select_due(&sources, now);
        assert_eq!(due.len(), 2);
        assert!(due[0].last_fetched_at.is_none());
        assert!(due[1].last_fetched_at.is_some());
    }
}
