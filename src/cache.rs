//! Session-scoped cache for the event catalog.
//!
//! An entry is a JSON-encoded event list plus the Unix-millisecond time it
//! was written. It is Fresh while younger than the TTL and Stale after that.
//! Stale entries are never served as a cache hit, but remain available as a
//! fallback when the live fetch fails.

use std::time::Duration;

use chrono::Utc;

use crate::error::CacheError;
use crate::feed::EventFeed;
use crate::models::{CacheStatus, Event, EventFilter};
use crate::store::SessionStore;

pub const CACHE_KEY: &str = "merit.events.cache";
pub const CACHE_TIMESTAMP_KEY: &str = "merit.events.cache_timestamp";
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug)]
struct CacheEntry {
    events: Vec<Event>,
    written_at_ms: i64,
}

pub struct EventListCache<S, F> {
    store: S,
    feed: F,
    ttl: Duration,
}

impl<S: SessionStore, F: EventFeed> EventListCache<S, F> {
    pub fn with_ttl(store: S, feed: F, ttl: Duration) -> Self {
        Self { store, feed, ttl }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn feed(&self) -> &F {
        &self.feed
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    fn read_entry(&self) -> Option<CacheEntry> {
        let raw = self.store.get(CACHE_KEY)?;
        let written_at_ms = self.store.get(CACHE_TIMESTAMP_KEY)?.parse().ok()?;
        match serde_json::from_str(&raw) {
            Ok(events) => Some(CacheEntry {
                events,
                written_at_ms,
            }),
            Err(err) => {
                log::debug!("unreadable event cache entry: {err}");
                None
            }
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now_ms: i64) -> bool {
        now_ms - entry.written_at_ms < self.ttl_ms()
    }

    /// Cached list while Fresh. Stale or unreadable entries are purged.
    pub fn cached_events(&self) -> Option<Vec<Event>> {
        match self.read_entry() {
            Some(entry) if self.is_fresh(&entry, Utc::now().timestamp_millis()) => {
                Some(entry.events)
            }
            _ => {
                self.clear_cache();
                None
            }
        }
    }

    pub fn cache_events(&self, events: &[Event]) -> Result<(), CacheError> {
        let encoded = serde_json::to_string(events)?;
        self.store.set(CACHE_KEY, encoded);
        self.store.set(
            CACHE_TIMESTAMP_KEY,
            Utc::now().timestamp_millis().to_string(),
        );
        Ok(())
    }

    /// Serve the cached list while Fresh, otherwise fetch live. When the live
    /// fetch fails any existing entry is served instead, Stale or not.
    pub async fn fetch_event_list(&self, force_refresh: bool) -> Result<Vec<Event>, CacheError> {
        if !force_refresh {
            if let Some(entry) = self.read_entry() {
                if self.is_fresh(&entry, Utc::now().timestamp_millis()) {
                    log::debug!("event cache hit ({} events)", entry.events.len());
                    return Ok(entry.events);
                }
            }
        }

        match self.feed.fetch_remote_event_list().await {
            Ok(events) => {
                self.cache_events(&events)?;
                log::info!("fetched {} events from catalog", events.len());
                Ok(events)
            }
            Err(err) => match self.read_entry() {
                Some(entry) => {
                    log::warn!(
                        "{err}; serving {} cached events",
                        entry.events.len()
                    );
                    Ok(entry.events)
                }
                None => Err(CacheError::FetchUnavailable(err)),
            },
        }
    }

    pub fn cache_status(&self) -> CacheStatus {
        let Some(entry) = self.read_entry() else {
            return CacheStatus {
                has_cache: false,
                is_valid: false,
                age_ms: 0,
                remaining_ms: 0,
            };
        };

        let age_ms = (Utc::now().timestamp_millis() - entry.written_at_ms).max(0);
        let remaining_ms = (self.ttl_ms() - age_ms).max(0);
        CacheStatus {
            has_cache: true,
            is_valid: remaining_ms > 0,
            age_ms,
            remaining_ms,
        }
    }

    pub fn clear_cache(&self) {
        self.store.remove(CACHE_KEY);
        self.store.remove(CACHE_TIMESTAMP_KEY);
    }
}

/// Events matching every provided criterion. `search` is a case-insensitive
/// substring match on title, description or organizer.
pub fn filter_events(events: &[Event], filter: &EventFilter) -> Vec<Event> {
    let needle = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|search| !search.is_empty())
        .map(str::to_lowercase);

    events
        .iter()
        .filter(|event| {
            filter
                .category
                .as_ref()
                .map_or(true, |category| event.category == *category)
        })
        .filter(|event| filter.status.map_or(true, |status| event.status == status))
        .filter(|event| {
            needle.as_deref().map_or(true, |needle| {
                event.title.to_lowercase().contains(needle)
                    || event.description.to_lowercase().contains(needle)
                    || event.organizer.to_lowercase().contains(needle)
            })
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::FeedError;
    use crate::models::{EventCategory, EventStatus};
    use crate::store::{FileSessionStore, MemorySessionStore};
    use crate::testutil::{date, event};

    #[derive(Default)]
    struct CountingFeed {
        events: Vec<Event>,
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl CountingFeed {
        fn serving(events: Vec<Event>) -> Self {
            Self {
                events,
                ..Self::default()
            }
        }

        fn fail(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventFeed for CountingFeed {
        async fn fetch_remote_event_list(&self) -> Result<Vec<Event>, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(FeedError::transient("offline"));
            }
            Ok(self.events.clone())
        }
    }

    fn catalog() -> Vec<Event> {
        vec![
            event("Career Fair", EventCategory::University, 10, date(2026, 5, 2)),
            event("Robotics Workshop", EventCategory::Association, 6, date(2026, 5, 9)),
        ]
    }

    fn cache_with(events: Vec<Event>) -> EventListCache<MemorySessionStore, CountingFeed> {
        EventListCache::with_ttl(
            MemorySessionStore::default(),
            CountingFeed::serving(events),
            DEFAULT_TTL,
        )
    }

    fn age_past_ttl<F: EventFeed>(cache: &EventListCache<MemorySessionStore, F>) {
        let old = Utc::now().timestamp_millis() - cache.ttl_ms() - 1_000;
        cache.store().set(CACHE_TIMESTAMP_KEY, old.to_string());
    }

    #[tokio::test]
    async fn cached_list_is_served_without_fetching() {
        let list = catalog();
        let cache = cache_with(Vec::new());
        cache.cache_events(&list).unwrap();

        let served = cache.fetch_event_list(false).await.unwrap();
        assert_eq!(served, list);
        assert_eq!(cache.feed().calls(), 0);
    }

    #[tokio::test]
    async fn miss_fetches_once_then_hits() {
        let cache = cache_with(catalog());
        let served = cache.fetch_event_list(false).await.unwrap();
        assert_eq!(served, cache.feed().events);
        cache.fetch_event_list(false).await.unwrap();
        assert_eq!(cache.feed().calls(), 1);
        assert!(cache.cache_status().is_valid);
    }

    #[tokio::test]
    async fn stale_entry_triggers_live_fetch() {
        let cache = cache_with(catalog());
        cache.cache_events(&[]).unwrap();
        age_past_ttl(&cache);

        let status = cache.cache_status();
        assert!(status.has_cache);
        assert!(!status.is_valid);
        assert_eq!(status.remaining_ms, 0);

        let served = cache.fetch_event_list(false).await.unwrap();
        assert_eq!(served.len(), 2);
        assert_eq!(cache.feed().calls(), 1);
        assert!(cache.cache_status().is_valid);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_fresh_entry() {
        let cache = cache_with(catalog());
        cache.cache_events(&[]).unwrap();

        let served = cache.fetch_event_list(true).await.unwrap();
        assert_eq!(served.len(), 2);
        assert_eq!(cache.feed().calls(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_falls_back_to_stale_entry() {
        let list = catalog();
        let cache = cache_with(Vec::new());
        cache.cache_events(&list).unwrap();
        age_past_ttl(&cache);
        cache.feed().fail();

        let served = cache.fetch_event_list(false).await.unwrap();
        assert_eq!(served, list);
        assert_eq!(cache.feed().calls(), 1);
        assert!(!cache.cache_status().is_valid);
    }

    #[tokio::test]
    async fn failed_forced_fetch_falls_back_to_fresh_entry() {
        let list = catalog();
        let cache = cache_with(Vec::new());
        cache.cache_events(&list).unwrap();
        cache.feed().fail();

        assert_eq!(cache.fetch_event_list(true).await.unwrap(), list);
    }

    #[tokio::test]
    async fn failed_fetch_without_cache_is_an_error() {
        let cache = cache_with(catalog());
        cache.cache_events(&catalog()).unwrap();
        cache.clear_cache();
        cache.feed().fail();

        let err = cache.fetch_event_list(false).await.unwrap_err();
        assert!(matches!(err, CacheError::FetchUnavailable(_)));
        assert_eq!(err.to_string(), "events unavailable, try again");
    }

    #[tokio::test]
    async fn session_file_carries_cache_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let first = EventListCache::with_ttl(
            FileSessionStore::open(&path).unwrap(),
            CountingFeed::serving(catalog()),
            DEFAULT_TTL,
        );
        let fetched = first.fetch_event_list(false).await.unwrap();
        drop(first);

        let second = EventListCache::with_ttl(
            FileSessionStore::open(&path).unwrap(),
            CountingFeed::default(),
            DEFAULT_TTL,
        );
        assert_eq!(second.fetch_event_list(false).await.unwrap(), fetched);
        assert_eq!(second.feed().calls(), 0);

        second.clear_cache();
        let third = EventListCache::with_ttl(
            FileSessionStore::open(&path).unwrap(),
            CountingFeed::default(),
            DEFAULT_TTL,
        );
        third.feed().fail();
        assert!(matches!(
            third.fetch_event_list(false).await,
            Err(CacheError::FetchUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn stale_session_file_entry_is_served_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let list = catalog();

        let cache = EventListCache::with_ttl(
            FileSessionStore::open(&path).unwrap(),
            CountingFeed::default(),
            Duration::from_secs(60),
        );
        cache.cache_events(&list).unwrap();
        let old = Utc::now().timestamp_millis() - 120_000;
        cache.store().set(CACHE_TIMESTAMP_KEY, old.to_string());
        drop(cache);

        let reopened = EventListCache::with_ttl(
            FileSessionStore::open(&path).unwrap(),
            CountingFeed::default(),
            Duration::from_secs(60),
        );
        assert!(!reopened.cache_status().is_valid);
        reopened.feed().fail();
        assert_eq!(reopened.fetch_event_list(false).await.unwrap(), list);
        assert_eq!(reopened.feed().calls(), 1);
    }

    #[test]
    fn cached_events_purges_stale_entry() {
        let cache = cache_with(Vec::new());
        cache.cache_events(&catalog()).unwrap();
        assert_eq!(cache.cached_events().map(|events| events.len()), Some(2));

        age_past_ttl(&cache);
        assert_eq!(cache.cached_events(), None);
        assert!(!cache.cache_status().has_cache);
        assert_eq!(cache.store().get(CACHE_KEY), None);
    }

    #[test]
    fn unreadable_entry_counts_as_absent() {
        let cache = cache_with(Vec::new());
        cache.store().set(CACHE_KEY, "{not json".to_string());
        cache
            .store()
            .set(CACHE_TIMESTAMP_KEY, Utc::now().timestamp_millis().to_string());

        assert!(!cache.cache_status().has_cache);
        assert_eq!(cache.cached_events(), None);
        assert_eq!(cache.store().get(CACHE_TIMESTAMP_KEY), None);
    }

    #[test]
    fn status_and_clear_on_empty_cache() {
        let cache = cache_with(Vec::new());
        cache.clear_cache();
        cache.clear_cache();
        assert_eq!(
            cache.cache_status(),
            CacheStatus {
                has_cache: false,
                is_valid: false,
                age_ms: 0,
                remaining_ms: 0,
            }
        );
    }

    #[test]
    fn fresh_entry_reports_remaining_time() {
        let cache = EventListCache::with_ttl(
            MemorySessionStore::default(),
            CountingFeed::default(),
            Duration::from_secs(60),
        );
        cache.cache_events(&catalog()).unwrap();
        let status = cache.cache_status();
        assert!(status.is_valid);
        assert!(status.remaining_ms > 0 && status.remaining_ms <= 60_000);
        assert_eq!(status.age_ms + status.remaining_ms, 60_000);
    }

    #[test]
    fn filters_combine_with_and() {
        let mut workshop = event("Rust Workshop", EventCategory::Association, 5, date(2026, 6, 1));
        workshop.organizer = "Open Source Society".to_string();
        let mut talk = event("Alumni Talk", EventCategory::Faculty, 3, date(2026, 6, 2));
        talk.description = "Hosted by the open source lab".to_string();
        talk.status = EventStatus::Upcoming;
        let gala = event("Gala Night", EventCategory::College, 4, date(2026, 6, 3));
        let events = vec![workshop, talk, gala];

        let search_only = EventFilter {
            search: Some("OPEN source".to_string()),
            ..EventFilter::default()
        };
        let titles: Vec<String> = filter_events(&events, &search_only)
            .into_iter()
            .map(|event| event.title)
            .collect();
        assert_eq!(titles, vec!["Rust Workshop", "Alumni Talk"]);

        let narrowed = EventFilter {
            status: Some(EventStatus::Upcoming),
            ..search_only
        };
        let matched = filter_events(&events, &narrowed);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].title, "Alumni Talk");

        let by_category = EventFilter {
            category: Some(EventCategory::College),
            ..EventFilter::default()
        };
        assert_eq!(filter_events(&events, &by_category)[0].title, "Gala Night");
        assert_eq!(filter_events(&events, &EventFilter::default()).len(), 3);
        assert_eq!(events.len(), 3);
    }
}
