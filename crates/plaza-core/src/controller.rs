//! Drives the feed: first load, infinite scroll, the category advance
//! effect and the single post actions. Network results only reach the
//! state through the store.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    api::FeedApi,
    category::{Scope, CATEGORY_CYCLE},
    config::PlazaConfig,
    events::{EventBus, FeedEvent},
    feed::{Action, FeedState},
    interleave,
    pager::Claim,
    post::{verify_comment, NewPost, Post, PostEdit, PostPatch},
    scroll::{self, ScrollPosition, Viewport},
    store::{FeedHandle, FeedStore, InitialClaim},
    PlazaError, PlazaResult,
};

/// What `load_initial_data` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialLoad {
    /// The store was empty and page 1 was fetched.
    Fetched,
    /// The store already had posts; nothing was fetched and the caller
    /// should scroll back to the given position.
    Restored(Option<ScrollPosition>),
    /// Another initial load holds the claim, or a refresh overtook this
    /// one.
    InProgress,
}

pub struct FeedController<A: FeedApi> {
    api: Arc<A>,
    store: FeedHandle,
    bus: EventBus,
    config: PlazaConfig,
}

impl<A: FeedApi> Clone for FeedController<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: self.store.clone(),
            bus: self.bus.clone(),
            config: self.config.clone(),
        }
    }
}

impl<A: FeedApi> FeedController<A> {
    /// Start a fresh store for this controller.
    pub fn new(api: Arc<A>, config: PlazaConfig) -> Self {
        let bus = EventBus::default();
        let store = FeedStore::spawn(&bus);
        Self::with_store(api, config, store, bus)
    }

    /// Share an existing store and bus, e.g. between screens.
    pub fn with_store(api: Arc<A>, config: PlazaConfig, store: FeedHandle, bus: EventBus) -> Self {
        Self {
            api,
            store,
            bus,
            config,
        }
    }

    pub fn store(&self) -> &FeedHandle {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &PlazaConfig {
        &self.config
    }

    pub async fn snapshot(&self) -> PlazaResult<FeedState> {
        self.store.snapshot().await
    }

    // ***
    // Loading
    // ***

    /// Fill an empty store with page 1 of the posts and of every category,
    /// or, if posts are already there, hand back the scroll position to
    /// restore without touching the network.
    pub async fn load_initial_data(&self) -> PlazaResult<InitialLoad> {
        let generation = match self.store.begin_initial().await? {
            InitialClaim::Restore(position) => {
                debug!(?position, "feed already populated; restoring");
                return Ok(InitialLoad::Restored(position));
            }
            InitialClaim::Busy => return Ok(InitialLoad::InProgress),
            InitialClaim::Fetch { generation } => generation,
        };

        let (posts, categories) = tokio::join!(
            self.api.fetch_posts(1, self.config.posts_per_page),
            self.fetch_categories(1, generation),
        );
        categories?;

        match posts {
            Ok(fetched) => {
                let count = fetched.posts.len();
                let pages = fetched.page.total;
                let taken = self
                    .store
                    .dispatch(Action::PostsLoaded {
                        generation,
                        page: fetched.page,
                        posts: fetched.posts,
                    })
                    .await?;
                if !taken {
                    // A refresh started after this load; its own load owns
                    // the store now.
                    return Ok(InitialLoad::InProgress);
                }
                info!(count, pages, "initial feed loaded");
                Ok(InitialLoad::Fetched)
            }
            Err(err) => {
                warn!(%err, "initial feed load failed");
                self.store
                    .dispatch(Action::LoadFailed {
                        generation,
                        error: err.to_string(),
                    })
                    .await?;
                Err(err)
            }
        }
    }

    /// Drop everything the store holds and load page 1 again. Also the way
    /// out of a failed pagination. Fetches still running from before the
    /// reset are dropped when they land.
    pub async fn refresh(&self) -> PlazaResult<InitialLoad> {
        self.store.dispatch(Action::Reset).await?;
        self.load_initial_data().await
    }

    /// Fetch and append the next page of posts. Returns false without any
    /// request when a fetch is already running, the last page is loaded or
    /// an earlier fetch failed, and false as well when the page arrives
    /// after a refresh and is dropped.
    pub async fn load_more_posts(&self) -> PlazaResult<bool> {
        let Some(Claim { page, generation }) = self.store.begin_load_more().await? else {
            return Ok(false);
        };
        match self.api.fetch_posts(page, self.config.posts_per_page).await {
            Ok(fetched) => {
                debug!(page, count = fetched.posts.len(), "posts page fetched");
                self.store
                    .dispatch(Action::PostsLoaded {
                        generation,
                        page: fetched.page,
                        posts: fetched.posts,
                    })
                    .await
            }
            Err(err) => {
                warn!(page, %err, "loading more posts failed");
                self.store
                    .dispatch(Action::LoadFailed {
                        generation,
                        error: err.to_string(),
                    })
                    .await?;
                Err(err)
            }
        }
    }

    /// Fetch `page` of every category. Each category settles on its own; a
    /// failing one keeps its current items and never fails the others.
    async fn fetch_categories(&self, page: u32, generation: u64) -> PlazaResult<()> {
        let limit = self.config.category_page_size;
        let fetches = CATEGORY_CYCLE.iter().map(|category| async move {
            let result = self
                .api
                .fetch_category(*category, page, limit, &Scope::Global)
                .await;
            (*category, result)
        });

        for (category, result) in join_all(fetches).await {
            let action = match result {
                Ok(fetched) => Action::CategoryLoaded {
                    generation,
                    category,
                    page,
                    items: fetched.items,
                },
                Err(err) => Action::CategoryFailed {
                    generation,
                    category,
                    error: err.to_string(),
                },
            };
            self.store.dispatch(action).await?;
        }
        Ok(())
    }

    // ***
    // Triggers
    // ***

    /// Effect for the post at `index` coming into view. Crossing a batch
    /// threshold moves every category to its next page, once.
    pub async fn reveal(&self, index: usize) -> PlazaResult<bool> {
        let position = interleave::position_of(index);
        let Some(Claim { page, generation }) = self.store.reveal(position).await? else {
            return Ok(false);
        };
        debug!(position, page, "advancing category carousels");
        self.fetch_categories(page, generation).await?;
        Ok(true)
    }

    /// Desktop trigger: the entry at `last_visible_entry` is on screen.
    /// Loads more once the sentinel after the last entry is reached.
    pub async fn on_entries_visible(&self, last_visible_entry: usize) -> PlazaResult<bool> {
        let entries = self.store.entries_len().await?;
        if !scroll::sentinel_visible(last_visible_entry, entries) {
            return Ok(false);
        }
        self.load_more_posts().await
    }

    /// Scroll listener. Records the offset and, on mobile, loads more once
    /// the remaining distance drops under the configured threshold.
    pub async fn on_scroll(
        &self,
        offset: f64,
        content_height: f64,
        viewport_height: f64,
    ) -> PlazaResult<bool> {
        self.record_scroll(offset).await?;
        if self.config.viewport != Viewport::Mobile {
            return Ok(false);
        }
        if !scroll::near_bottom(
            offset,
            content_height,
            viewport_height,
            self.config.mobile_load_threshold,
        ) {
            return Ok(false);
        }
        self.load_more_posts().await
    }

    pub async fn record_scroll(&self, offset: f64) -> PlazaResult<()> {
        let position = ScrollPosition::new(self.config.viewport, offset);
        self.store.dispatch(Action::ScrollRecorded(position)).await?;
        Ok(())
    }

    // ***
    // Ad spots
    // ***

    /// Next page of the ad-spot carousel for `scope`, same gating as posts.
    pub async fn load_more_ad_spots(&self, scope: Scope) -> PlazaResult<bool> {
        let claim = self.store.begin_ad_spots(scope.clone()).await?;
        let Some(Claim { page, generation }) = claim else {
            return Ok(false);
        };
        match self
            .api
            .fetch_ad_spots(&scope, page, self.config.ad_spot_page_size)
            .await
        {
            Ok(fetched) => {
                self.store
                    .dispatch(Action::AdSpotsLoaded {
                        generation,
                        scope,
                        page: fetched.page,
                        items: fetched.items,
                    })
                    .await
            }
            Err(err) => {
                self.store
                    .dispatch(Action::AdSpotsFailed {
                        generation,
                        scope,
                        error: err.to_string(),
                    })
                    .await?;
                Err(err)
            }
        }
    }

    // ***
    // Post actions. The state only changes after the server confirmed.
    // ***

    fn user(&self) -> PlazaResult<&str> {
        self.config.user()
    }

    async fn post_in_feed(&self, post_id: &str) -> PlazaResult<Post> {
        self.store.post(post_id).await?.ok_or_else(|| {
            PlazaError::InvalidId {
                id: post_id.to_string(),
            }
            .into()
        })
    }

    async fn post_owned_by_user(&self, post_id: &str) -> PlazaResult<Post> {
        let post = self.post_in_feed(post_id).await?;
        if !post.is_owned_by(self.user()?) {
            return Err(PlazaError::NotOwner {
                id: post_id.to_string(),
            }
            .into());
        }
        Ok(post)
    }

    async fn patch(&self, patch: PostPatch) -> PlazaResult<()> {
        self.store.dispatch(Action::PostPatched(patch)).await?;
        Ok(())
    }

    pub async fn like(&self, post_id: &str) -> PlazaResult<()> {
        let likes = self
            .api
            .like_post(post_id)
            .await
            .inspect_err(|err| warn!(post_id, %err, "like failed"))?;
        self.patch(PostPatch::new(post_id).likes(likes)).await
    }

    pub async fn unlike(&self, post_id: &str) -> PlazaResult<()> {
        let likes = self
            .api
            .unlike_post(post_id)
            .await
            .inspect_err(|err| warn!(post_id, %err, "unlike failed"))?;
        self.patch(PostPatch::new(post_id).likes(likes)).await
    }

    /// Like or unlike depending on whether the user already likes the
    /// post. Returns the new liked state.
    pub async fn toggle_like(&self, post_id: &str) -> PlazaResult<bool> {
        let post = self.post_in_feed(post_id).await?;
        if post.is_liked_by(self.user()?) {
            self.unlike(post_id).await?;
            Ok(false)
        } else {
            self.like(post_id).await?;
            Ok(true)
        }
    }

    pub async fn comment(&self, post_id: &str, text: &str) -> PlazaResult<()> {
        let text = verify_comment(text)?;
        let comments = self
            .api
            .add_comment(post_id, &text)
            .await
            .inspect_err(|err| warn!(post_id, %err, "comment failed"))?;
        self.patch(PostPatch::new(post_id).comments(comments)).await
    }

    pub async fn report(&self, post_id: &str, reason: &str) -> PlazaResult<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PlazaError::EmptyReason.into());
        }
        self.api
            .report_post(post_id, reason)
            .await
            .inspect_err(|err| warn!(post_id, %err, "report failed"))
    }

    /// Edit the user's own post. Fields left `None` keep their value.
    pub async fn edit(
        &self,
        post_id: &str,
        content: Option<String>,
        media: Option<Vec<String>>,
    ) -> PlazaResult<Post> {
        let post = self.post_owned_by_user(post_id).await?;
        let edit = PostEdit::from_post(&post, content, media)?;
        let diff = edit.media_diff(&post.media);
        debug!(
            post_id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "editing post"
        );
        let edited = self
            .api
            .edit_post(post_id, &edit)
            .await
            .inspect_err(|err| warn!(post_id, %err, "edit failed"))?;
        self.patch(PostPatch::from_edited(&edited)).await?;
        Ok(edited)
    }

    /// Delete the user's own post and announce it on the bus.
    pub async fn delete(&self, post_id: &str) -> PlazaResult<()> {
        self.post_owned_by_user(post_id).await?;
        self.api
            .delete_post(post_id)
            .await
            .inspect_err(|err| warn!(post_id, %err, "delete failed"))?;
        self.bus.publish(FeedEvent::PostDeleted {
            post_id: post_id.to_string(),
        });
        Ok(())
    }

    /// Publish a new post and announce it on the bus.
    pub async fn create(&self, draft: NewPost) -> PlazaResult<Post> {
        draft.verify()?;
        let post = self
            .api
            .create_post(&draft)
            .await
            .inspect_err(|err| warn!(%err, "create failed"))?;
        self.bus.publish(FeedEvent::PostCreated(post.clone()));
        Ok(post)
    }

    /// Follow or unfollow an organizer; every post of theirs is updated.
    pub async fn follow(&self, organizer_id: &str, follow: bool) -> PlazaResult<()> {
        let response = self
            .api
            .follow(organizer_id, follow)
            .await
            .inspect_err(|err| warn!(organizer_id, %err, "follow failed"))?;
        self.store
            .dispatch(Action::FollowChanged {
                author_id: organizer_id.to_string(),
                is_followed: response.is_followed,
                followers: response.followers,
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        category::{AdSpot, Category, CategoryItem},
        pager::PageCursor,
        post::{tests::mock_post, Comment, Like},
        state::{AdSpotPage, CategoryPage, FollowResponse, PostsPage},
    };
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// In-memory marketplace. Pages of posts are fixed up front.
    #[derive(Default)]
    pub(crate) struct FakeApi {
        pub pages: Vec<Vec<Post>>,
        pub failing_categories: HashSet<Category>,
        pub fail_posts: AtomicBool,
        pub fail_mutations: AtomicBool,
        pub posts_calls: AtomicUsize,
        pub mutation_calls: AtomicUsize,
        pub category_calls: Mutex<Vec<(Category, u32)>>,
        /// When set, `fetch_posts` waits for a permit before answering.
        pub gate: Option<Semaphore>,
        pub fail_ad_spots: AtomicBool,
        pub ad_calls: AtomicUsize,
        /// Same as `gate`, for `fetch_ad_spots`.
        pub ad_gate: Option<Semaphore>,
    }

    impl FakeApi {
        pub(crate) fn with_pages(pages: Vec<Vec<Post>>) -> Self {
            Self {
                pages,
                ..Default::default()
            }
        }

        fn mutation(&self) -> PlazaResult<()> {
            self.mutation_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_mutations.load(Ordering::SeqCst) {
                return Err(PlazaError::Http {
                    status: 500,
                    body: "boom".into(),
                }
                .into());
            }
            Ok(())
        }
    }

    pub(crate) fn posts(prefix: &str, count: usize) -> Vec<Post> {
        (0..count)
            .map(|i| mock_post(&format!("{prefix}{i}"), "author"))
            .collect()
    }

    fn at(secs: i64) -> DateTime<chrono::Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[async_trait]
    impl FeedApi for FakeApi {
        async fn fetch_posts(&self, page: u32, _limit: u32) -> PlazaResult<PostsPage> {
            self.posts_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await?.forget();
            }
            if self.fail_posts.load(Ordering::SeqCst) {
                return Err(PlazaError::Http {
                    status: 503,
                    body: "unavailable".into(),
                }
                .into());
            }
            let posts = self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default();
            Ok(PostsPage {
                posts,
                page: PageCursor::new(page, self.pages.len() as u32),
            })
        }

        async fn fetch_category(
            &self,
            category: Category,
            page: u32,
            limit: u32,
            _scope: &Scope,
        ) -> PlazaResult<CategoryPage> {
            self.category_calls
                .lock()
                .unwrap()
                .push((category, page));
            if self.failing_categories.contains(&category) {
                return Err(PlazaError::Http {
                    status: 500,
                    body: format!("{category} down"),
                }
                .into());
            }
            let items = (0..limit)
                .map(|i| CategoryItem {
                    id: format!("{category}-{page}-{i}"),
                    title: format!("{} {i}", category.title()),
                    media: None,
                    type_label: None,
                    kind: category,
                    meta: Default::default(),
                })
                .collect();
            Ok(CategoryPage {
                category,
                items,
                page: PageCursor::new(page, 10),
            })
        }

        async fn fetch_ad_spots(
            &self,
            scope: &Scope,
            page: u32,
            _limit: u32,
        ) -> PlazaResult<AdSpotPage> {
            self.ad_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.ad_gate {
                gate.acquire().await?.forget();
            }
            if self.fail_ad_spots.load(Ordering::SeqCst) {
                return Err(PlazaError::Http {
                    status: 502,
                    body: "bad gateway".into(),
                }
                .into());
            }
            Ok(AdSpotPage {
                items: vec![AdSpot {
                    id: format!("{scope}-ad-{page}"),
                    title: "ad".into(),
                    media: vec![],
                    link: None,
                    place_id: None,
                    shop_id: None,
                }],
                page: PageCursor::new(page, 2),
            })
        }

        async fn like_post(&self, _post_id: &str) -> PlazaResult<Vec<Like>> {
            self.mutation()?;
            Ok(vec![Like {
                user_id: "me".into(),
                created_at: at(1_700_000_900),
            }])
        }

        async fn unlike_post(&self, _post_id: &str) -> PlazaResult<Vec<Like>> {
            self.mutation()?;
            Ok(vec![])
        }

        async fn add_comment(&self, post_id: &str, text: &str) -> PlazaResult<Vec<Comment>> {
            self.mutation()?;
            Ok(vec![Comment {
                id: format!("{post_id}-c1"),
                user_id: "me".into(),
                user_name: None,
                text: text.to_string(),
                created_at: at(1_700_000_901),
            }])
        }

        async fn report_post(&self, _post_id: &str, _reason: &str) -> PlazaResult<()> {
            self.mutation()
        }

        async fn delete_post(&self, _post_id: &str) -> PlazaResult<()> {
            self.mutation()
        }

        async fn edit_post(&self, post_id: &str, edit: &PostEdit) -> PlazaResult<Post> {
            self.mutation()?;
            let mut post = mock_post(post_id, "me");
            post.content = edit.content.clone();
            post.media = edit.media.clone();
            post.updated_at = Some(at(1_700_001_000));
            Ok(post)
        }

        async fn create_post(&self, draft: &NewPost) -> PlazaResult<Post> {
            self.mutation()?;
            let mut post = mock_post("fresh", "me");
            post.content = draft.content.clone();
            post.media = draft.media.clone();
            Ok(post)
        }

        async fn follow(&self, _organizer_id: &str, follow: bool) -> PlazaResult<FollowResponse> {
            self.mutation()?;
            Ok(FollowResponse {
                is_followed: follow,
                followers: if follow { 4 } else { 3 },
            })
        }
    }

    fn config() -> PlazaConfig {
        PlazaConfig {
            user_id: Some("me".into()),
            posts_per_page: 4,
            category_page_size: 2,
            ..Default::default()
        }
    }

    fn controller(api: FakeApi) -> (FeedController<FakeApi>, Arc<FakeApi>) {
        let api = Arc::new(api);
        (FeedController::new(Arc::clone(&api), config()), api)
    }

    #[tokio::test]
    async fn initial_load_fills_empty_store() {
        let (feed, api) = controller(FakeApi::with_pages(vec![
            posts("a", 4),
            posts("b", 4),
            posts("c", 2),
        ]));

        assert_eq!(feed.load_initial_data().await.unwrap(), InitialLoad::Fetched);

        let state = feed.snapshot().await.unwrap();
        let ids: Vec<&str> = state.posts.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a0", "a1", "a2", "a3"]);
        assert_eq!(state.page(), PageCursor::new(1, 3));
        assert_eq!(state.horizontal_page, 1);
        for category in CATEGORY_CYCLE {
            assert_eq!(state.category(category).len(), 2);
        }
        assert_eq!(api.posts_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.category_calls.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn populated_store_restores_without_network() {
        let (feed, api) = controller(FakeApi::with_pages(vec![posts("a", 4)]));
        feed.load_initial_data().await.unwrap();
        feed.record_scroll(640.0).await.unwrap();

        match feed.load_initial_data().await.unwrap() {
            InitialLoad::Restored(Some(position)) => {
                assert_eq!(position.offset, 640.0);
                assert_eq!(position.viewport, Viewport::Desktop);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(api.posts_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.category_calls.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn failing_category_does_not_fail_the_load() {
        let mut api = FakeApi::with_pages(vec![posts("a", 4)]);
        api.failing_categories.insert(Category::Places);
        let (feed, _api) = controller(api);

        assert_eq!(feed.load_initial_data().await.unwrap(), InitialLoad::Fetched);

        let state = feed.snapshot().await.unwrap();
        assert!(state.category(Category::Places).is_empty());
        for category in [
            Category::Events,
            Category::Opportunities,
            Category::Products,
            Category::Shops,
        ] {
            assert_eq!(state.category(category).len(), 2, "{category}");
        }
        assert_eq!(state.posts.len(), 4);
        assert!(state.error().is_none());
    }

    #[tokio::test]
    async fn failed_initial_load_is_reported_and_retried_later() {
        let (feed, api) = controller(FakeApi::with_pages(vec![posts("a", 4)]));
        api.fail_posts.store(true, Ordering::SeqCst);

        assert!(feed.load_initial_data().await.is_err());
        let state = feed.snapshot().await.unwrap();
        assert!(state.error().unwrap().contains("503"));
        assert!(!state.is_loading_more());

        api.fail_posts.store(false, Ordering::SeqCst);
        assert_eq!(feed.load_initial_data().await.unwrap(), InitialLoad::Fetched);
        assert!(feed.snapshot().await.unwrap().error().is_none());
    }

    #[tokio::test]
    async fn load_more_appends_one_page() {
        let (feed, api) = controller(FakeApi::with_pages(vec![
            posts("a", 4),
            posts("b", 4),
            posts("c", 4),
        ]));
        feed.load_initial_data().await.unwrap();

        assert!(feed.load_more_posts().await.unwrap());
        let state = feed.snapshot().await.unwrap();
        assert_eq!(state.posts.len(), 8);
        assert_eq!(state.page().current, 2);

        assert!(feed.load_more_posts().await.unwrap());
        // past the last page nothing is requested
        assert!(!feed.load_more_posts().await.unwrap());
        assert_eq!(api.posts_calls.load(Ordering::SeqCst), 3);
        assert_eq!(feed.snapshot().await.unwrap().posts.len(), 12);
    }

    #[tokio::test]
    async fn load_more_is_single_flight() {
        let mut api = FakeApi::with_pages(vec![posts("a", 4), posts("b", 4), posts("c", 4)]);
        api.gate = Some(Semaphore::new(1));
        let (feed, api) = controller(api);
        // the single permit is used by the initial load
        feed.load_initial_data().await.unwrap();

        let first = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_more_posts().await })
        };
        while api.posts_calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        assert!(!feed.load_more_posts().await.unwrap());
        assert!(feed.snapshot().await.unwrap().is_loading_more());

        api.gate.as_ref().unwrap().add_permits(1);
        assert!(first.await.unwrap().unwrap());
        assert_eq!(api.posts_calls.load(Ordering::SeqCst), 2);
        assert_eq!(feed.snapshot().await.unwrap().posts.len(), 8);
    }

    #[tokio::test]
    async fn refresh_drops_the_page_requested_before_it() {
        let mut api = FakeApi::with_pages(vec![posts("a", 4), posts("b", 4), posts("c", 4)]);
        api.gate = Some(Semaphore::new(1));
        let (feed, api) = controller(api);
        feed.load_initial_data().await.unwrap();

        let more = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_more_posts().await })
        };
        while api.posts_calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        let refresh = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.refresh().await })
        };
        while api.posts_calls.load(Ordering::SeqCst) < 3 {
            tokio::task::yield_now().await;
        }

        // page 2 from before the reset lands first and is dropped
        api.gate.as_ref().unwrap().add_permits(1);
        assert!(!more.await.unwrap().unwrap());
        let state = feed.snapshot().await.unwrap();
        assert!(state.posts.is_empty());
        assert!(state.is_loading_more());
        assert_eq!(feed.load_initial_data().await.unwrap(), InitialLoad::InProgress);
        assert_eq!(api.posts_calls.load(Ordering::SeqCst), 3);

        api.gate.as_ref().unwrap().add_permits(1);
        assert_eq!(refresh.await.unwrap().unwrap(), InitialLoad::Fetched);
        let state = feed.snapshot().await.unwrap();
        let ids: Vec<&str> = state.posts.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a0", "a1", "a2", "a3"]);
        assert_eq!(state.page(), PageCursor::new(1, 3));
        assert!(!state.is_loading_more());
    }

    #[tokio::test]
    async fn refresh_overtakes_a_running_initial_load() {
        let mut api = FakeApi::with_pages(vec![posts("a", 4), posts("b", 4)]);
        api.gate = Some(Semaphore::new(0));
        let (feed, api) = controller(api);

        let first = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_initial_data().await })
        };
        while api.posts_calls.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }
        let refresh = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.refresh().await })
        };
        while api.posts_calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        api.gate.as_ref().unwrap().add_permits(1);
        assert_eq!(first.await.unwrap().unwrap(), InitialLoad::InProgress);
        assert!(feed.snapshot().await.unwrap().posts.is_empty());

        api.gate.as_ref().unwrap().add_permits(1);
        assert_eq!(refresh.await.unwrap().unwrap(), InitialLoad::Fetched);
        let state = feed.snapshot().await.unwrap();
        assert_eq!(state.posts.len(), 4);
        for category in CATEGORY_CYCLE {
            assert_eq!(state.category(category).len(), 2);
        }
        assert_eq!(api.posts_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_page_stops_pagination() {
        let (feed, api) = controller(FakeApi::with_pages(vec![posts("a", 4), posts("b", 4)]));
        feed.load_initial_data().await.unwrap();
        api.fail_posts.store(true, Ordering::SeqCst);

        assert!(feed.load_more_posts().await.is_err());
        api.fail_posts.store(false, Ordering::SeqCst);
        assert!(!feed.load_more_posts().await.unwrap());
        assert_eq!(api.posts_calls.load(Ordering::SeqCst), 2);
        assert_eq!(feed.snapshot().await.unwrap().posts.len(), 4);

        assert_eq!(feed.refresh().await.unwrap(), InitialLoad::Fetched);
        assert!(feed.load_more_posts().await.unwrap());
        let state = feed.snapshot().await.unwrap();
        assert!(state.error().is_none());
        assert_eq!(state.posts.len(), 8);
    }

    #[tokio::test]
    async fn reveal_fetches_next_category_page_once() {
        let (feed, api) = controller(FakeApi::with_pages(vec![posts("a", 4)]));
        feed.load_initial_data().await.unwrap();

        // post 20 starts batch 5
        assert!(!feed.reveal(19).await.unwrap());
        assert!(feed.reveal(20).await.unwrap());
        assert!(!feed.reveal(21).await.unwrap());
        assert!(!feed.reveal(20).await.unwrap());

        let calls = api.category_calls.lock().unwrap().clone();
        let second: Vec<&(Category, u32)> = calls.iter().filter(|(_, page)| *page == 2).collect();
        assert_eq!(second.len(), 5);

        let state = feed.snapshot().await.unwrap();
        assert_eq!(state.horizontal_page, 2);
        assert_eq!(state.category(Category::Events).len(), 4);
    }

    #[tokio::test]
    async fn concurrent_reveals_fetch_once() {
        let (feed, api) = controller(FakeApi::with_pages(vec![posts("a", 4)]));
        feed.load_initial_data().await.unwrap();

        let (a, b) = tokio::join!(feed.reveal(20), feed.reveal(22));
        assert!(a.unwrap() ^ b.unwrap());
        assert_eq!(api.category_calls.lock().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn sentinel_and_mobile_triggers() {
        let (feed, api) = controller(FakeApi::with_pages(vec![posts("a", 4), posts("b", 4)]));
        feed.load_initial_data().await.unwrap();

        // 4 posts and one carousel: entries 0..=4
        assert!(!feed.on_entries_visible(2).await.unwrap());
        assert!(feed.on_entries_visible(4).await.unwrap());
        assert_eq!(api.posts_calls.load(Ordering::SeqCst), 2);

        let mobile = FeedController::with_store(
            Arc::clone(&api),
            PlazaConfig {
                viewport: Viewport::Mobile,
                ..config()
            },
            feed.store().clone(),
            feed.bus().clone(),
        );
        assert!(!mobile.on_scroll(100.0, 3000.0, 800.0).await.unwrap());
        // far enough down, but no pages left
        assert!(!mobile.on_scroll(2000.0, 3000.0, 800.0).await.unwrap());
        let state = feed.snapshot().await.unwrap();
        assert_eq!(state.scroll.unwrap().offset, 2000.0);
        assert_eq!(state.scroll.unwrap().viewport, Viewport::Mobile);
    }

    #[tokio::test]
    async fn like_patch_changes_only_likes() {
        let (feed, _api) = controller(FakeApi::with_pages(vec![posts("a", 4)]));
        feed.load_initial_data().await.unwrap();
        let before = feed.snapshot().await.unwrap().posts.items;

        feed.like("a1").await.unwrap();
        let after = feed.snapshot().await.unwrap().posts.items;
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2..], before[2..]);
        assert_eq!(after[1].likes.len(), 1);
        assert_eq!(after[1].content, before[1].content);

        assert!(!feed.toggle_like("a1").await.unwrap());
        assert!(feed.snapshot().await.unwrap().posts.items[1].likes.is_empty());
    }

    #[tokio::test]
    async fn failed_action_leaves_state_untouched() {
        let (feed, api) = controller(FakeApi::with_pages(vec![posts("a", 4)]));
        feed.load_initial_data().await.unwrap();
        let before = feed.snapshot().await.unwrap().posts.items;

        api.fail_mutations.store(true, Ordering::SeqCst);
        assert!(feed.like("a0").await.is_err());
        assert!(feed.comment("a0", "hi").await.is_err());
        assert_eq!(feed.snapshot().await.unwrap().posts.items, before);
    }

    #[tokio::test]
    async fn comment_is_validated_before_the_request() {
        let (feed, api) = controller(FakeApi::with_pages(vec![posts("a", 4)]));
        feed.load_initial_data().await.unwrap();

        assert!(feed.comment("a0", "   ").await.is_err());
        assert!(feed.report("a0", "").await.is_err());
        assert_eq!(api.mutation_calls.load(Ordering::SeqCst), 0);

        feed.comment("a0", "  lovely place ").await.unwrap();
        let state = feed.snapshot().await.unwrap();
        assert_eq!(state.posts.items[0].comments[0].text, "lovely place");
    }

    #[tokio::test]
    async fn delete_goes_through_the_bus() {
        let mut first = posts("a", 3);
        first.push(mock_post("mine", "me"));
        let (feed, _api) = controller(FakeApi::with_pages(vec![first]));
        feed.load_initial_data().await.unwrap();
        let mut listener = feed.bus().subscribe();

        let err = feed.delete("a0").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlazaError>(),
            Some(PlazaError::NotOwner { .. })
        ));

        feed.delete("mine").await.unwrap();
        assert_eq!(
            listener.recv().await.unwrap(),
            FeedEvent::PostDeleted {
                post_id: "mine".into()
            }
        );
        let state = feed.snapshot().await.unwrap();
        let ids: Vec<&str> = state.posts.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a0", "a1", "a2"]);
    }

    #[tokio::test]
    async fn created_post_shows_up_first() {
        let (feed, _api) = controller(FakeApi::with_pages(vec![posts("a", 4)]));
        feed.load_initial_data().await.unwrap();

        let draft =
            NewPost::new("Grand opening!".into(), vec!["https://cdn/x.png".into()]).unwrap();
        let post = feed.create(draft).await.unwrap();
        let state = feed.snapshot().await.unwrap();
        assert_eq!(state.posts.items[0].id, post.id);
        assert_eq!(state.posts.len(), 5);
    }

    #[tokio::test]
    async fn edit_patches_content_and_media() {
        let mut first = posts("a", 3);
        first.push(mock_post("mine", "me"));
        let (feed, _api) = controller(FakeApi::with_pages(vec![first]));
        feed.load_initial_data().await.unwrap();

        feed.edit("mine", Some("updated".into()), Some(vec!["https://cdn/n.png".into()]))
            .await
            .unwrap();
        let state = feed.snapshot().await.unwrap();
        let post = state.post("mine").unwrap();
        assert_eq!(post.content, "updated");
        assert_eq!(post.media, vec!["https://cdn/n.png".to_string()]);
        assert!(post.updated_at.is_some());
        assert_eq!(post.author.name, "user me");

        assert!(feed.edit("nope", None, None).await.is_err());
    }

    #[tokio::test]
    async fn follow_updates_author_everywhere() {
        let (feed, _api) = controller(FakeApi::with_pages(vec![posts("a", 4)]));
        feed.load_initial_data().await.unwrap();

        feed.follow("author", true).await.unwrap();
        let state = feed.snapshot().await.unwrap();
        assert!(state
            .posts
            .items
            .iter()
            .all(|p| p.author.is_followed && p.author.followers == 4));
    }

    #[tokio::test]
    async fn ad_spots_paginate_per_scope() {
        let (feed, _api) = controller(FakeApi::default());
        let shop = Scope::Shop("s1".into());

        assert!(feed.load_more_ad_spots(shop.clone()).await.unwrap());
        assert!(feed.load_more_ad_spots(shop.clone()).await.unwrap());
        assert!(!feed.load_more_ad_spots(shop.clone()).await.unwrap());
        assert!(feed.load_more_ad_spots(Scope::Global).await.unwrap());

        let state = feed.snapshot().await.unwrap();
        assert_eq!(state.ad_spots[&shop].len(), 2);
        assert_eq!(state.ad_spots[&Scope::Global].len(), 1);
    }

    #[tokio::test]
    async fn ad_spots_are_single_flight() {
        let api = FakeApi {
            ad_gate: Some(Semaphore::new(0)),
            ..Default::default()
        };
        let (feed, api) = controller(api);
        let place = Scope::Place("pl1".into());

        let first = {
            let feed = feed.clone();
            let place = place.clone();
            tokio::spawn(async move { feed.load_more_ad_spots(place).await })
        };
        while api.ad_calls.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }

        assert!(!feed.load_more_ad_spots(place.clone()).await.unwrap());
        assert!(feed.snapshot().await.unwrap().ad_spots[&place].is_loading);
        assert_eq!(api.ad_calls.load(Ordering::SeqCst), 1);

        api.ad_gate.as_ref().unwrap().add_permits(1);
        assert!(first.await.unwrap().unwrap());
        let state = feed.snapshot().await.unwrap();
        assert_eq!(state.ad_spots[&place].len(), 1);
        assert!(!state.ad_spots[&place].is_loading);
    }

    #[tokio::test]
    async fn failed_ad_spots_stop_only_their_scope() {
        let (feed, api) = controller(FakeApi::default());
        let shop = Scope::Shop("s1".into());
        api.fail_ad_spots.store(true, Ordering::SeqCst);

        assert!(feed.load_more_ad_spots(shop.clone()).await.is_err());
        let state = feed.snapshot().await.unwrap();
        assert!(state.ad_spots[&shop].error.as_deref().unwrap().contains("502"));
        assert!(!state.ad_spots[&shop].is_loading);

        api.fail_ad_spots.store(false, Ordering::SeqCst);
        assert!(!feed.load_more_ad_spots(shop.clone()).await.unwrap());
        assert_eq!(api.ad_calls.load(Ordering::SeqCst), 1);

        assert!(feed.load_more_ad_spots(Scope::Global).await.unwrap());
        let state = feed.snapshot().await.unwrap();
        assert!(state.ad_spots[&shop].is_empty());
        assert_eq!(state.ad_spots[&Scope::Global].len(), 1);
    }
}
