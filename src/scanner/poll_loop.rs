use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::filter::qualifies;
use super::seen_set::SeenSet;
use crate::api::{ItemInfo, MarketSource, TrackedItem};
use crate::core::{Clock, TokioClock};
use crate::notification::{NotificationDispatcher, NotificationEvent};

/// Pause between idle checks once every item has been disabled.
const IDLE_FLOOR: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching(String),
    Filtering(String),
    Dispatching(String),
    Sleeping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Active,
    /// Permanently skipped for the rest of the run.
    Disabled(String),
}

struct ItemSlot {
    item: TrackedItem,
    status: ItemStatus,
    info: Option<ItemInfo>,
}

impl ItemSlot {
    fn is_active(&self) -> bool {
        self.status == ItemStatus::Active
    }
}

/// What happened during one pass over the items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub items_polled: usize,
    pub listings_fetched: usize,
    pub qualified: usize,
    pub duplicates: usize,
    pub dispatched: usize,
    pub transient_failures: usize,
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    pub cycles: u64,
    pub items_polled: u64,
    pub listings_fetched: u64,
    pub notifications: u64,
    pub transient_failures: u64,
    pub disabled_items: u64,
}

impl PollStats {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.items_polled += report.items_polled as u64;
        self.listings_fetched += report.listings_fetched as u64;
        self.notifications += report.dispatched as u64;
        self.transient_failures += report.transient_failures as u64;
        self.disabled_items += report.disabled.len() as u64;
    }
}

/// Fetch, filter, dedup and dispatch for each item in configured order, then sleep.
pub struct PollLoop<M: MarketSource> {
    market: M,
    dispatcher: NotificationDispatcher,
    seen: SeenSet,
    items: Vec<ItemSlot>,
    interval: Duration,
    ping_ids: Vec<u64>,
    clock: Arc<dyn Clock>,
    state: PollState,
    stats: PollStats,
    idle_warned: bool,
}

impl<M: MarketSource> PollLoop<M> {
    pub fn new(
        market: M,
        dispatcher: NotificationDispatcher,
        items: Vec<TrackedItem>,
        interval: Duration,
    ) -> Self {
        let items = items
            .into_iter()
            .map(|item| ItemSlot {
                item,
                status: ItemStatus::Active,
                info: None,
            })
            .collect();

        Self {
            market,
            dispatcher,
            seen: SeenSet::new(),
            items,
            interval,
            ping_ids: Vec::new(),
            clock: Arc::new(TokioClock),
            state: PollState::Idle,
            stats: PollStats::default(),
            idle_warned: false,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_seen_set(mut self, seen: SeenSet) -> Self {
        self.seen = seen;
        self
    }

    #[must_use]
    pub fn with_ping_ids(mut self, ping_ids: Vec<u64>) -> Self {
        self.ping_ids = ping_ids;
        self
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    pub fn active_items(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|slot| slot.is_active())
            .map(|slot| slot.item.slug.as_str())
            .collect()
    }

    pub fn item_status(&self, slug: &str) -> Option<&ItemStatus> {
        self.items
            .iter()
            .find(|slot| slot.item.slug == slug)
            .map(|slot| &slot.status)
    }

    fn transition(&mut self, state: PollState) {
        tracing::trace!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// One pass over every active item. Errors are contained per item.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        for index in 0..self.items.len() {
            if self.items[index].is_active() {
                self.poll_item(index, &mut report).await;
            }
            self.transition(PollState::Idle);
        }

        self.stats.record(&report);
        report
    }

    async fn poll_item(&mut self, index: usize, report: &mut CycleReport) {
        let item = self.items[index].item.clone();
        report.items_polled += 1;

        self.transition(PollState::Fetching(item.slug.clone()));
        let listings = match self.market.fetch_listings(&item).await {
            Ok(listings) => listings,
            Err(e) if e.is_fatal() => {
                tracing::error!("❌ {}; {} will not be polled again this run", e, item.slug);
                self.items[index].status = ItemStatus::Disabled(e.to_string());
                report.disabled.push(item.slug);
                return;
            }
            Err(e) => {
                tracing::warn!("⚠️  {}; retrying next cycle", e);
                report.transient_failures += 1;
                return;
            }
        };
        report.listings_fetched += listings.len();

        self.transition(PollState::Filtering(item.slug.clone()));
        let mut fresh = Vec::new();
        for listing in listings {
            if !qualifies(&item, &listing) {
                continue;
            }
            report.qualified += 1;

            if self.seen.has_seen(&listing.seen_key()) {
                report.duplicates += 1;
                continue;
            }
            fresh.push(listing);
        }

        if fresh.is_empty() {
            return;
        }

        self.transition(PollState::Dispatching(item.slug.clone()));
        let info = self.item_info(index).await;

        for listing in fresh {
            // Recorded before sending, so a listing is attempted at most once.
            if !self.seen.mark_seen(listing.seen_key()) {
                report.duplicates += 1;
                continue;
            }

            tracing::info!(
                "🎯 {} listed at {}p by {} (threshold {}p)",
                info.name,
                listing.price,
                listing.seller.ingame_name,
                item.threshold
            );

            let event = NotificationEvent::compose(&info, &listing, &self.ping_ids);
            let result = self.dispatcher.dispatch(&event).await;
            tracing::debug!("Dispatch for {}: {:?}", listing.id, result.outcomes);
            report.dispatched += 1;
        }
    }

    /// Cached after the first successful lookup.
    async fn item_info(&mut self, index: usize) -> ItemInfo {
        if let Some(info) = &self.items[index].info {
            return info.clone();
        }

        let slug = self.items[index].item.slug.clone();
        match self.market.fetch_item(&slug).await {
            Ok(info) => {
                self.items[index].info = Some(info.clone());
                info
            }
            Err(e) => {
                tracing::warn!("⚠️  Using fallback name for {}: {}", slug, e);
                let fallback = ItemInfo::fallback(&slug);
                if e.is_fatal() {
                    self.items[index].info = Some(fallback.clone());
                }
                fallback
            }
        }
    }

    /// Loops until `shutdown` resolves and returns the run totals.
    pub async fn run<F>(&mut self, shutdown: F) -> PollStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tracing::info!(
            "🔎 Watching {} items, checking every {:?}",
            self.items.len(),
            self.interval
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("🛑 Shutdown requested, stopping poll loop");
                    break;
                }
                _ = self.tick() => {}
            }
        }

        self.transition(PollState::Idle);
        self.stats.clone()
    }

    async fn tick(&mut self) {
        let any_active = self.items.iter().any(ItemSlot::is_active);

        if any_active {
            let report = self.run_cycle().await;
            tracing::debug!(
                "📊 Cycle {}: {} listings, {} qualified, {} notified, {} duplicates, {} transient failures",
                self.stats.cycles,
                report.listings_fetched,
                report.qualified,
                report.dispatched,
                report.duplicates,
                report.transient_failures
            );
        } else if !self.idle_warned {
            tracing::warn!("⚠️  Every item is disabled, idling until interrupted");
            self.idle_warned = true;
        }

        self.transition(PollState::Sleeping);
        let pause = if any_active {
            self.interval
        } else {
            self.interval.max(IDLE_FLOOR)
        };
        self.clock.sleep(pause).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::market::MockMarketSource;
    use crate::api::{Listing, Seller};
    use crate::core::{FetchError, SinkError};
    use crate::notification::NotificationSink;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingSink {
        events: Arc<Mutex<Vec<NotificationEvent>>>,
    }

    impl RecordingSink {
        fn ids(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|event| format!("{}/{}", event.item_slug, event.listing_id))
                .collect()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn enabled(&self) -> bool {
            true
        }

        async fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn listing(id: &str, slug: &str, price: u32) -> Listing {
        Listing::new(id, slug, price, Seller::new("X"))
    }

    fn with_item_names(market: &mut MockMarketSource) {
        market
            .expect_fetch_item()
            .returning(|slug: &str| Ok(ItemInfo::fallback(slug)));
    }

    fn build(
        market: MockMarketSource,
        items: Vec<TrackedItem>,
    ) -> (PollLoop<MockMarketSource>, RecordingSink) {
        let recorder = RecordingSink::default();
        let dispatcher = NotificationDispatcher::new(vec![Box::new(recorder.clone())]);
        let poll = PollLoop::new(market, dispatcher, items, Duration::from_secs(1));
        (poll, recorder)
    }

    #[tokio::test]
    async fn test_qualifying_listing_notified_once_across_cycles() {
        let mut market = MockMarketSource::new();
        market
            .expect_fetch_listings()
            .times(2)
            .returning(|item: &TrackedItem| Ok(vec![listing("abc", &item.slug, 12)]));
        with_item_names(&mut market);

        let (mut poll, recorder) = build(market, vec![TrackedItem::new("fang_prime", 15)]);

        let first = poll.run_cycle().await;
        assert_eq!(first.qualified, 1);
        assert_eq!(first.dispatched, 1);
        assert_eq!(recorder.ids(), vec!["fang_prime/abc"]);

        let second = poll.run_cycle().await;
        assert_eq!(second.qualified, 1);
        assert_eq!(second.duplicates, 1);
        assert_eq!(second.dispatched, 0);
        assert_eq!(recorder.ids().len(), 1);
        assert_eq!(poll.seen().len(), 1);
        assert_eq!(poll.stats().notifications, 1);
    }

    #[tokio::test]
    async fn test_fatal_error_disables_item_for_the_run() {
        let mut market = MockMarketSource::new();
        market
            .expect_fetch_listings()
            .withf(|item: &TrackedItem| item.slug == "bad_slug")
            .times(1)
            .returning(|item: &TrackedItem| Err(FetchError::fatal(&item.slug, "HTTP 404")));
        market
            .expect_fetch_listings()
            .withf(|item: &TrackedItem| item.slug == "fang_prime")
            .times(3)
            .returning(|_| Ok(Vec::new()));

        let (mut poll, _recorder) = build(
            market,
            vec![
                TrackedItem::new("bad_slug", 15),
                TrackedItem::new("fang_prime", 15),
            ],
        );

        let first = poll.run_cycle().await;
        assert_eq!(first.disabled, vec!["bad_slug".to_string()]);
        assert_eq!(first.items_polled, 2);

        for _ in 0..2 {
            let report = poll.run_cycle().await;
            assert_eq!(report.items_polled, 1);
            assert!(report.disabled.is_empty());
        }

        assert_eq!(poll.active_items(), vec!["fang_prime"]);
        assert!(matches!(
            poll.item_status("bad_slug"),
            Some(ItemStatus::Disabled(_))
        ));
        assert_eq!(poll.stats().disabled_items, 1);
    }

    #[tokio::test]
    async fn test_listing_over_threshold_is_ignored() {
        let mut market = MockMarketSource::new();
        market
            .expect_fetch_listings()
            .returning(|item: &TrackedItem| Ok(vec![listing("abc", &item.slug, 20)]));
        market.expect_fetch_item().never();

        let (mut poll, recorder) = build(market, vec![TrackedItem::new("fang_prime", 15)]);

        let report = poll.run_cycle().await;

        assert_eq!(report.listings_fetched, 1);
        assert_eq!(report.qualified, 0);
        assert_eq!(report.dispatched, 0);
        assert!(poll.seen().is_empty());
        assert!(recorder.ids().is_empty());
    }

    #[tokio::test]
    async fn test_transient_error_retries_next_cycle() {
        let mut market = MockMarketSource::new();
        let mut calls = 0;
        market
            .expect_fetch_listings()
            .times(2)
            .returning(move |item: &TrackedItem| {
                calls += 1;
                if calls == 1 {
                    Err(FetchError::transient(&item.slug, "HTTP 503"))
                } else {
                    Ok(vec![listing("abc", &item.slug, 10)])
                }
            });
        with_item_names(&mut market);

        let (mut poll, recorder) = build(market, vec![TrackedItem::new("fang_prime", 15)]);

        let first = poll.run_cycle().await;
        assert_eq!(first.transient_failures, 1);
        assert!(first.disabled.is_empty());

        let second = poll.run_cycle().await;
        assert_eq!(second.dispatched, 1);
        assert_eq!(recorder.ids(), vec!["fang_prime/abc"]);
        assert_eq!(poll.active_items(), vec!["fang_prime"]);
    }

    #[tokio::test]
    async fn test_notifications_follow_item_order() {
        let mut market = MockMarketSource::new();
        market
            .expect_fetch_listings()
            .returning(|item: &TrackedItem| Ok(vec![listing("1", &item.slug, 5)]));
        with_item_names(&mut market);

        let (mut poll, recorder) = build(
            market,
            vec![
                TrackedItem::new("zaw_strike", 10),
                TrackedItem::new("arcane_energize", 10),
                TrackedItem::new("fang_prime", 10),
            ],
        );

        poll.run_cycle().await;

        assert_eq!(
            recorder.ids(),
            vec!["zaw_strike/1", "arcane_energize/1", "fang_prime/1"]
        );
    }

    #[tokio::test]
    async fn test_only_new_listings_notified() {
        let mut market = MockMarketSource::new();
        let mut calls = 0;
        market
            .expect_fetch_listings()
            .returning(move |item: &TrackedItem| {
                calls += 1;
                let mut listings = vec![listing("abc", &item.slug, 12)];
                if calls > 1 {
                    listings.push(listing("def", &item.slug, 14));
                    listings.push(listing("ghi", &item.slug, 99));
                }
                Ok(listings)
            });
        with_item_names(&mut market);

        let (mut poll, recorder) = build(market, vec![TrackedItem::new("fang_prime", 15)]);

        poll.run_cycle().await;
        let second = poll.run_cycle().await;

        assert_eq!(second.qualified, 2);
        assert_eq!(second.dispatched, 1);
        assert_eq!(recorder.ids(), vec!["fang_prime/abc", "fang_prime/def"]);
    }

    #[tokio::test]
    async fn test_repeated_listing_in_one_response_notified_once() {
        let mut market = MockMarketSource::new();
        market
            .expect_fetch_listings()
            .returning(|item: &TrackedItem| {
                Ok(vec![listing("abc", &item.slug, 12), listing("abc", &item.slug, 12)])
            });
        with_item_names(&mut market);

        let (mut poll, recorder) = build(market, vec![TrackedItem::new("fang_prime", 15)]);

        let report = poll.run_cycle().await;

        assert_eq!(report.dispatched, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(recorder.ids().len(), 1);
    }

    #[tokio::test]
    async fn test_item_info_fetched_once() {
        let mut market = MockMarketSource::new();
        let mut calls = 0;
        market
            .expect_fetch_listings()
            .returning(move |item: &TrackedItem| {
                calls += 1;
                Ok(vec![listing(&calls.to_string(), &item.slug, 12)])
            });
        market.expect_fetch_item().times(1).returning(|slug: &str| {
            Ok(ItemInfo {
                id: "item-1".to_string(),
                slug: slug.to_string(),
                name: "Fang Prime Blade".to_string(),
                icon: None,
                thumb: None,
            })
        });

        let (mut poll, recorder) = build(market, vec![TrackedItem::new("fang_prime_blade", 15)]);

        poll.run_cycle().await;
        poll.run_cycle().await;

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[1].whisper.contains("\"Fang Prime Blade\""));
    }

    #[tokio::test]
    async fn test_item_info_failure_uses_fallback_name() {
        let mut market = MockMarketSource::new();
        market
            .expect_fetch_listings()
            .returning(|item: &TrackedItem| Ok(vec![listing("abc", &item.slug, 12)]));
        market
            .expect_fetch_item()
            .returning(|slug: &str| Err(FetchError::transient(slug, "timeout")));

        let (mut poll, recorder) = build(market, vec![TrackedItem::new("fang_prime_blade", 15)]);

        let report = poll.run_cycle().await;

        assert_eq!(report.dispatched, 1);
        let events = recorder.events.lock().unwrap();
        assert!(events[0].message.contains("Fang Prime Blade"));
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_abort_cycle() {
        struct FailingSink;

        #[async_trait]
        impl NotificationSink for FailingSink {
            fn name(&self) -> &'static str {
                "webhook"
            }

            fn enabled(&self) -> bool {
                true
            }

            async fn deliver(&self, _event: &NotificationEvent) -> Result<(), SinkError> {
                Err(SinkError::WebhookStatus(502))
            }
        }

        let mut market = MockMarketSource::new();
        market
            .expect_fetch_listings()
            .returning(|item: &TrackedItem| Ok(vec![listing("abc", &item.slug, 12)]));
        with_item_names(&mut market);

        let recorder = RecordingSink::default();
        let dispatcher =
            NotificationDispatcher::new(vec![Box::new(FailingSink), Box::new(recorder.clone())]);
        let mut poll = PollLoop::new(
            market,
            dispatcher,
            vec![TrackedItem::new("fang_prime", 15), TrackedItem::new("zaw_strike", 15)],
            Duration::from_secs(1),
        );

        let report = poll.run_cycle().await;

        assert_eq!(report.dispatched, 2);
        assert_eq!(recorder.ids(), vec!["fang_prime/abc", "zaw_strike/abc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sleeps_between_cycles_until_shutdown() {
        let mut market = MockMarketSource::new();
        market.expect_fetch_listings().returning(|_| Ok(Vec::new()));

        let (mut poll, _recorder) = build(market, vec![TrackedItem::new("fang_prime", 15)]);

        let stats = poll
            .run(tokio::time::sleep(Duration::from_millis(2_500)))
            .await;

        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.items_polled, 3);
        assert_eq!(poll.state(), &PollState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_idling_when_every_item_is_disabled() {
        let mut market = MockMarketSource::new();
        market
            .expect_fetch_listings()
            .times(1)
            .returning(|item: &TrackedItem| Err(FetchError::fatal(&item.slug, "HTTP 404")));

        let (mut poll, _recorder) = build(market, vec![TrackedItem::new("bad_slug", 15)]);

        let start = tokio::time::Instant::now();
        let stats = poll.run(tokio::time::sleep(Duration::from_secs(5))).await;

        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.disabled_items, 1);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(poll.active_items().is_empty());
    }

    #[derive(Default)]
    struct RecordingClock {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Clock for RecordingClock {
        fn now(&self) -> tokio::time::Instant {
            tokio::time::Instant::now()
        }

        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    #[tokio::test]
    async fn test_tick_sleeps_through_injected_clock() {
        let mut market = MockMarketSource::new();
        market
            .expect_fetch_listings()
            .times(1)
            .returning(|item: &TrackedItem| Err(FetchError::fatal(&item.slug, "HTTP 404")));

        let clock = Arc::new(RecordingClock::default());
        let (poll, _recorder) = build(market, vec![TrackedItem::new("bad_slug", 15)]);
        let mut poll = poll.with_clock(clock.clone());
        poll.interval = Duration::ZERO;

        poll.tick().await;
        poll.tick().await;

        assert_eq!(
            *clock.sleeps.lock().unwrap(),
            vec![Duration::ZERO, IDLE_FLOOR]
        );
        assert_eq!(poll.stats().cycles, 1);
        assert_eq!(poll.state(), &PollState::Sleeping);
    }

    #[tokio::test]
    async fn test_initial_state() {
        let market = MockMarketSource::new();
        let (poll, _recorder) = build(market, vec![TrackedItem::new("fang_prime", 15)]);

        assert_eq!(poll.state(), &PollState::Idle);
        assert!(poll.seen().is_empty());
        assert_eq!(poll.item_status("fang_prime"), Some(&ItemStatus::Active));
        assert_eq!(poll.stats(), &PollStats::default());
    }
}
