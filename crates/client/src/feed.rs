use async_trait::async_trait;
use domain::{protocol, CoreError, EntityKind, Identified, Page};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch_page(&self, cursor: &str) -> Result<Page<T>, CoreError>;
}

#[async_trait]
impl<T, S> PageSource<T> for Arc<S>
where
    T: Send + 'static,
    S: PageSource<T> + ?Sized,
{
    async fn fetch_page(&self, cursor: &str) -> Result<Page<T>, CoreError> {
        (**self).fetch_page(cursor).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Exhausted,
    InFlight,
    /// Mount trigger on a feed that already has items.
    AlreadyLoaded,
    /// The feed was reset while the page was in flight.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Appended(usize),
    Skipped(SkipReason),
    // 状态不变，下次触发重试同一游标
    Failed(CoreError),
}

struct FeedState<T> {
    items: Vec<T>,
    seen: HashSet<String>,
    next_cursor: Option<String>,
    is_fetching: bool,
    total: Option<u64>,
    generation: u64,
}

/// Accumulated, deduplicated items of a paginated feed plus the cursor of
/// the next page. `fetch_next_page` is safe to call on every scroll event.
pub struct PaginationController<T, S> {
    source: S,
    state: Mutex<FeedState<T>>,
}

struct FetchGuard<'a, T> {
    state: &'a Mutex<FeedState<T>>,
    generation: u64,
}

impl<T> Drop for FetchGuard<'_, T> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        // reset 之后的新请求由它自己的 guard 负责
        if state.generation == self.generation {
            state.is_fetching = false;
        }
    }
}

fn lock<T>(state: &Mutex<FeedState<T>>) -> MutexGuard<'_, FeedState<T>> {
    // 单线程 UI 模型下不会出现 panic 中途持锁，直接沿用已有状态
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T, S> PaginationController<T, S>
where
    T: Identified + Clone + Send + 'static,
    S: PageSource<T>,
{
    pub fn new(source: S, start_cursor: impl Into<String>) -> Self {
        Self::with_cursor(source, Some(start_cursor.into()))
    }

    pub fn with_cursor(source: S, start_cursor: Option<String>) -> Self {
        Self {
            source,
            state: Mutex::new(FeedState {
                items: Vec::new(),
                seen: HashSet::new(),
                next_cursor: start_cursor,
                is_fetching: false,
                total: None,
                generation: 0,
            }),
        }
    }

    pub async fn fetch_next_page(&self) -> FetchOutcome {
        let (cursor, generation) = {
            let mut state = lock(&self.state);
            if state.is_fetching {
                return FetchOutcome::Skipped(SkipReason::InFlight);
            }
            let Some(cursor) = state.next_cursor.clone() else {
                return FetchOutcome::Skipped(SkipReason::Exhausted);
            };
            state.is_fetching = true;
            (cursor, state.generation)
        };
        let _guard = FetchGuard {
            state: &self.state,
            generation,
        };

        debug!("Fetching page {}", cursor);
        let page = match self.source.fetch_page(&cursor).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Fetching {} failed, will retry on next trigger: {}", cursor, e);
                return FetchOutcome::Failed(e);
            }
        };
        let next_cursor = match protocol::to_cursor(page.next.as_deref()) {
            Ok(next) => next,
            Err(e) => {
                warn!("Page {} has an unusable next link: {}", cursor, e);
                return FetchOutcome::Failed(e);
            }
        };

        let mut state = lock(&self.state);
        if state.generation != generation {
            debug!("Discarding page {} fetched before a reset", cursor);
            return FetchOutcome::Skipped(SkipReason::Stale);
        }
        let before = state.items.len();
        for item in page.results {
            if state.seen.insert(item.id().to_string()) {
                state.items.push(item);
            }
        }
        let appended = state.items.len() - before;
        state.next_cursor = next_cursor;
        state.total = Some(page.count);

        info!(
            "Page {} merged: {} new, {} total, has_more={}",
            cursor,
            appended,
            state.items.len(),
            state.next_cursor.is_some()
        );
        FetchOutcome::Appended(appended)
    }

    pub async fn load_more(&self) {
        let _ = self.fetch_next_page().await;
    }

    pub async fn on_mount(&self) -> FetchOutcome {
        if !lock(&self.state).items.is_empty() {
            return FetchOutcome::Skipped(SkipReason::AlreadyLoaded);
        }
        self.fetch_next_page().await
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn items(&self) -> Vec<T> {
        lock(&self.state).items.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_more(&self) -> bool {
        lock(&self.state).next_cursor.is_some()
    }

    pub fn next_cursor(&self) -> Option<String> {
        lock(&self.state).next_cursor.clone()
    }

    pub fn is_fetching(&self) -> bool {
        lock(&self.state).is_fetching
    }

    pub fn total(&self) -> Option<u64> {
        lock(&self.state).total
    }

    pub fn update_item<F>(&self, id: &str, kind: EntityKind, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(T) -> T,
    {
        let mut state = lock(&self.state);
        let slot = state
            .items
            .iter_mut()
            .find(|item| item.id() == id)
            .ok_or_else(|| CoreError::not_found(kind, id))?;
        *slot = f(slot.clone());
        Ok(slot.clone())
    }

    /// Overwrites the local copy with the server's. `false` if the id is unknown.
    pub fn reconcile(&self, server: T) -> bool {
        let mut state = lock(&self.state);
        match state.items.iter_mut().find(|item| item.id() == server.id()) {
            Some(slot) => {
                *slot = server;
                true
            }
            None => false,
        }
    }

    /// Drops everything fetched so far and starts over from `start_cursor`.
    /// A page still in flight is discarded when it lands.
    pub fn reset(&self, start_cursor: Option<String>) {
        let mut state = lock(&self.state);
        state.generation += 1;
        state.items.clear();
        state.seen.clear();
        state.next_cursor = start_cursor;
        state.total = None;
        state.is_fetching = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        likes: u32,
    }

    impl Identified for Item {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn item(id: &str) -> Item {
        Item {
            id: id.into(),
            likes: 0,
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> Page<Item> {
        Page {
            count: 100,
            next: next.map(Into::into),
            previous: None,
            results: ids.iter().map(|id| item(id)).collect(),
        }
    }

    #[derive(Default)]
    struct MockSource {
        responses: Mutex<HashMap<String, VecDeque<Result<Page<Item>, CoreError>>>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl MockSource {
        fn respond(self, cursor: &str, response: Result<Page<Item>, CoreError>) -> Self {
            self.responses
                .lock()
                .unwrap()
                .entry(cursor.to_string())
                .or_default()
                .push_back(response);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource<Item> for MockSource {
        async fn fetch_page(&self, cursor: &str) -> Result<Page<Item>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .get_mut(cursor)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(CoreError::NetworkFailure(format!("no mock for {}", cursor))))
        }
    }

    fn ids(feed: &PaginationController<Item, Arc<MockSource>>) -> Vec<String> {
        feed.items().into_iter().map(|i| i.id).collect()
    }

    #[tokio::test]
    async fn overlapping_pages_are_deduped_in_first_seen_order() {
        let source = Arc::new(
            MockSource::default()
                .respond("/posts/?page=1", Ok(page(&["a", "b", "c"], Some("https://api.example/posts/?page=2"))))
                .respond("/posts/?page=2", Ok(page(&["c", "b", "d", "d"], None))),
        );
        let feed = PaginationController::new(source.clone(), "/posts/?page=1");

        assert_eq!(feed.fetch_next_page().await, FetchOutcome::Appended(3));
        assert_eq!(feed.next_cursor().as_deref(), Some("/posts/?page=2"));
        assert_eq!(feed.fetch_next_page().await, FetchOutcome::Appended(1));

        assert_eq!(ids(&feed), ["a", "b", "c", "d"]);
        assert_eq!(feed.total(), Some(100));
    }

    #[tokio::test]
    async fn exhausted_feed_stops_fetching() {
        let source = Arc::new(MockSource::default().respond("/posts/", Ok(page(&["a"], None))));
        let feed = PaginationController::new(source.clone(), "/posts/");

        feed.load_more().await;
        assert!(!feed.has_more());

        feed.load_more().await;
        feed.load_more().await;
        assert_eq!(
            feed.fetch_next_page().await,
            FetchOutcome::Skipped(SkipReason::Exhausted)
        );
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn failure_keeps_state_and_allows_retry() {
        let source = Arc::new(
            MockSource::default()
                .respond("/p1", Ok(page(&["a"], Some("/p2"))))
                .respond("/p2", Err(CoreError::NetworkFailure("timeout".into())))
                .respond("/p2", Ok(page(&["b"], None))),
        );
        let feed = PaginationController::new(source.clone(), "/p1");
        feed.load_more().await;

        let outcome = feed.fetch_next_page().await;
        assert!(matches!(outcome, FetchOutcome::Failed(CoreError::NetworkFailure(_))));
        assert_eq!(ids(&feed), ["a"]);
        assert_eq!(feed.next_cursor().as_deref(), Some("/p2"));
        assert!(!feed.is_fetching());

        assert_eq!(feed.fetch_next_page().await, FetchOutcome::Appended(1));
        assert_eq!(ids(&feed), ["a", "b"]);
        assert!(!feed.has_more());
    }

    #[tokio::test]
    async fn malformed_next_link_is_treated_as_failure() {
        let source = Arc::new(
            MockSource::default().respond("/p1", Ok(page(&["a"], Some("::not a link::")))),
        );
        let feed = PaginationController::new(source.clone(), "/p1");

        let outcome = feed.fetch_next_page().await;
        assert!(matches!(outcome, FetchOutcome::Failed(CoreError::MalformedResponse(_))));
        assert!(feed.is_empty());
        assert_eq!(feed.next_cursor().as_deref(), Some("/p1"));
        assert!(!feed.is_fetching());
    }

    #[tokio::test]
    async fn concurrent_triggers_issue_a_single_fetch() {
        let source = Arc::new(
            MockSource {
                delay: Some(Duration::from_millis(20)),
                ..MockSource::default()
            }
            .respond("/p1", Ok(page(&["a", "b"], Some("/p2")))),
        );
        let feed = PaginationController::new(source.clone(), "/p1");

        let (first, second, third) = tokio::join!(
            feed.fetch_next_page(),
            feed.fetch_next_page(),
            feed.fetch_next_page()
        );

        assert_eq!(first, FetchOutcome::Appended(2));
        assert_eq!(second, FetchOutcome::Skipped(SkipReason::InFlight));
        assert_eq!(third, FetchOutcome::Skipped(SkipReason::InFlight));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn dropped_fetch_releases_the_lock() {
        let source = Arc::new(MockSource {
            delay: Some(Duration::from_secs(60)),
            ..MockSource::default()
        });
        let feed = PaginationController::new(source.clone(), "/p1");

        let timed_out = tokio::time::timeout(Duration::from_millis(10), feed.fetch_next_page()).await;
        assert!(timed_out.is_err());
        assert!(!feed.is_fetching());
        assert_eq!(feed.next_cursor().as_deref(), Some("/p1"));
    }

    #[tokio::test]
    async fn mount_only_fetches_an_empty_feed() {
        let source = Arc::new(
            MockSource::default()
                .respond("/p1", Ok(page(&["a"], Some("/p2"))))
                .respond("/p2", Ok(page(&["b"], None))),
        );
        let feed = PaginationController::new(source.clone(), "/p1");

        assert_eq!(feed.on_mount().await, FetchOutcome::Appended(1));
        assert_eq!(
            feed.on_mount().await,
            FetchOutcome::Skipped(SkipReason::AlreadyLoaded)
        );
        assert_eq!(source.calls(), 1);

        let empty = PaginationController::<Item, _>::with_cursor(source.clone(), None);
        assert_eq!(
            empty.on_mount().await,
            FetchOutcome::Skipped(SkipReason::Exhausted)
        );
    }

    #[tokio::test]
    async fn optimistic_update_and_reconcile() {
        let source = Arc::new(MockSource::default().respond("/p1", Ok(page(&["a"], None))));
        let feed = PaginationController::new(source, "/p1");
        feed.load_more().await;

        let updated = feed
            .update_item("a", EntityKind::Post, |mut i| {
                i.likes += 1;
                i
            })
            .unwrap();
        assert_eq!(updated.likes, 1);
        assert!(feed
            .update_item("zz", EntityKind::Post, |i| i)
            .unwrap_err()
            .is_not_found());

        assert!(feed.reconcile(Item {
            id: "a".into(),
            likes: 7
        }));
        assert_eq!(feed.items()[0].likes, 7);
        assert!(!feed.reconcile(item("zz")));

        feed.reset(Some("/p1".into()));
        assert!(feed.is_empty());
        assert!(feed.has_more());
    }

    #[tokio::test]
    async fn reset_discards_the_page_in_flight() {
        let source = Arc::new(
            MockSource {
                delay: Some(Duration::from_millis(50)),
                ..MockSource::default()
            }
            .respond("/old", Ok(page(&["stale-1", "stale-2"], Some("/old?page=2"))))
            .respond("/new", Ok(page(&["fresh"], None))),
        );
        let feed = PaginationController::new(source.clone(), "/old");

        let reset_midway = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            feed.reset(Some("/new".into()));
        };
        let (outcome, ()) = tokio::join!(feed.fetch_next_page(), reset_midway);

        assert_eq!(outcome, FetchOutcome::Skipped(SkipReason::Stale));
        assert!(feed.is_empty());
        assert_eq!(feed.next_cursor().as_deref(), Some("/new"));
        assert_eq!(feed.total(), None);
        assert!(!feed.is_fetching());

        assert_eq!(feed.fetch_next_page().await, FetchOutcome::Appended(1));
        assert_eq!(ids(&feed), ["fresh"]);
    }

    #[tokio::test]
    async fn stale_fetch_does_not_unlock_the_fetch_after_reset() {
        let source = Arc::new(
            MockSource {
                delay: Some(Duration::from_millis(100)),
                ..MockSource::default()
            }
            .respond("/old", Ok(page(&["stale"], None)))
            .respond("/new", Ok(page(&["fresh"], None))),
        );
        let feed = PaginationController::new(source.clone(), "/old");

        // /old 在 100ms 落地，/new 在 120ms 落地
        let fresh = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            feed.reset(Some("/new".into()));
            feed.fetch_next_page().await
        };
        let between = async {
            tokio::time::sleep(Duration::from_millis(110)).await;
            feed.fetch_next_page().await
        };
        let (stale, fresh, between) = tokio::join!(feed.fetch_next_page(), fresh, between);

        assert_eq!(stale, FetchOutcome::Skipped(SkipReason::Stale));
        assert_eq!(between, FetchOutcome::Skipped(SkipReason::InFlight));
        assert_eq!(fresh, FetchOutcome::Appended(1));
        assert_eq!(ids(&feed), ["fresh"]);
        assert_eq!(source.calls(), 2);
    }
}
