//! The feed's state and the reducer that is the only way to change it.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::{
    category::{AdSpot, Category, CategoryItem, Scope, CATEGORY_CYCLE},
    interleave::{self, FeedEntry},
    pager::{Claim, PageCursor, Paginated},
    post::{Post, PostPatch},
    scroll::ScrollPosition,
};

/// Everything the feed keeps between navigations. There is no eviction:
/// posts and category items accumulate for the whole session.
#[derive(Debug, Clone)]
pub struct FeedState {
    pub posts: Paginated<Post>,
    pub categories: BTreeMap<Category, Vec<CategoryItem>>,
    /// Last category page fetched; 1 once the initial load is done.
    pub horizontal_page: u32,
    pub scroll: Option<ScrollPosition>,
    pub ad_spots: BTreeMap<Scope, Paginated<AdSpot>>,
    /// Bumped by every reset. Claims carry it and results that come back
    /// with an older one are dropped.
    pub generation: u64,
}

impl Default for FeedState {
    fn default() -> Self {
        FeedState {
            posts: Paginated::default(),
            categories: CATEGORY_CYCLE.iter().map(|cat| (*cat, Vec::new())).collect(),
            horizontal_page: 1,
            scroll: None,
            ad_spots: BTreeMap::new(),
            generation: 0,
        }
    }
}

/// Changes applied to [`FeedState`], one at a time. Results of a fetch
/// carry the `generation` of the claim that started it.
#[derive(Debug, Clone)]
pub enum Action {
    PostsLoaded {
        generation: u64,
        page: PageCursor,
        posts: Vec<Post>,
    },
    LoadFailed { generation: u64, error: String },
    CategoryLoaded {
        generation: u64,
        category: Category,
        page: u32,
        items: Vec<CategoryItem>,
    },
    CategoryFailed {
        generation: u64,
        category: Category,
        error: String,
    },
    PostPatched(PostPatch),
    PostDeleted(String),
    PostCreated(Post),
    FollowChanged {
        author_id: String,
        is_followed: bool,
        followers: u64,
    },
    ScrollRecorded(ScrollPosition),
    AdSpotsLoaded {
        generation: u64,
        scope: Scope,
        page: PageCursor,
        items: Vec<AdSpot>,
    },
    AdSpotsFailed {
        generation: u64,
        scope: Scope,
        error: String,
    },
    Reset,
}

impl Action {
    /// Generation of the claim behind a fetch result; `None` for actions
    /// that apply to whatever state is current.
    fn generation(&self) -> Option<u64> {
        match self {
            Action::PostsLoaded { generation, .. }
            | Action::LoadFailed { generation, .. }
            | Action::CategoryLoaded { generation, .. }
            | Action::CategoryFailed { generation, .. }
            | Action::AdSpotsLoaded { generation, .. }
            | Action::AdSpotsFailed { generation, .. } => Some(*generation),
            _ => None,
        }
    }
}

impl FeedState {
    /// Apply one action. Returns false when the action was dropped or
    /// changed nothing.
    pub fn apply(&mut self, action: Action) -> bool {
        if let Some(generation) = action.generation() {
            if generation != self.generation {
                debug!(
                    generation,
                    current = self.generation,
                    "dropping result claimed before a reset"
                );
                return false;
            }
        }

        match action {
            Action::PostsLoaded { page, posts, .. } => {
                let count = posts.len();
                let taken = self.posts.accept(page, posts);
                if taken {
                    debug!(page = page.current, total = page.total, count, "posts page stored");
                } else {
                    warn!(
                        page = page.current,
                        current = self.posts.page.current,
                        "dropping stale posts page"
                    );
                    // The only posts request of this generation came back
                    // with a page we can't place; let the next claim retry.
                    self.posts.is_loading = false;
                }
                taken
            }

            Action::LoadFailed { error, .. } => {
                self.posts.fail(error);
                true
            }

            Action::CategoryLoaded {
                category,
                page,
                items,
                ..
            } => {
                let list = self.categories.entry(category).or_default();
                if page <= 1 {
                    *list = items;
                } else {
                    list.extend(items);
                }
                true
            }

            Action::CategoryFailed {
                category,
                error,
                ..
            } => {
                warn!(%category, %error, "category fetch failed; keeping current items");
                false
            }

            Action::PostPatched(patch) => {
                let patched = self
                    .posts
                    .items
                    .iter_mut()
                    .find(|post| post.id == patch.post_id)
                    .map(|post| post.apply_patch(&patch))
                    .unwrap_or(false);
                if !patched {
                    debug!(post_id = %patch.post_id, "patch for a post not in the feed");
                }
                patched
            }

            Action::PostDeleted(post_id) => {
                let before = self.posts.items.len();
                self.posts.items.retain(|post| post.id != post_id);
                before != self.posts.items.len()
            }

            Action::PostCreated(post) => {
                if self.posts.items.iter().any(|val| val.id == post.id) {
                    return false;
                }
                self.posts.items.insert(0, post);
                true
            }

            Action::FollowChanged {
                author_id,
                is_followed,
                followers,
            } => {
                let mut changed = false;
                for post in self
                    .posts
                    .items
                    .iter_mut()
                    .filter(|post| post.author.id == author_id)
                {
                    post.author.is_followed = is_followed;
                    post.author.followers = followers;
                    changed = true;
                }
                changed
            }

            Action::ScrollRecorded(position) => {
                self.scroll = Some(position);
                true
            }

            Action::AdSpotsLoaded {
                scope,
                page,
                items,
                ..
            } => {
                let pager = self.ad_spots.entry(scope).or_default();
                let taken = pager.accept(page, items);
                if !taken {
                    warn!(page = page.current, "dropping stale ad spot page");
                    pager.is_loading = false;
                }
                taken
            }

            Action::AdSpotsFailed { scope, error, .. } => {
                warn!(%scope, %error, "ad spot fetch failed");
                self.ad_spots.entry(scope).or_default().fail(error);
                true
            }

            Action::Reset => {
                *self = FeedState {
                    generation: self.generation + 1,
                    ..FeedState::default()
                };
                true
            }
        }
    }

    pub fn page(&self) -> PageCursor {
        self.posts.page
    }

    pub fn error(&self) -> Option<&str> {
        self.posts.error.as_deref()
    }

    pub fn is_loading_more(&self) -> bool {
        self.posts.is_loading
    }

    pub fn post(&self, post_id: &str) -> Option<&Post> {
        self.posts.items.iter().find(|post| post.id == post_id)
    }

    pub fn category(&self, category: Category) -> &[CategoryItem] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The composite feed: posts with their carousels.
    pub fn entries(&self) -> Vec<FeedEntry> {
        interleave::layout(self.posts.len())
    }

    // ***
    // Claims; only the store calls these, one command at a time.
    // ***

    fn claim(&self, page: u32) -> Claim {
        Claim {
            page,
            generation: self.generation,
        }
    }

    /// Claim the initial load. `None` when posts are already present or a
    /// load is running.
    pub(crate) fn begin_initial(&mut self) -> Option<Claim> {
        if !self.posts.is_empty() || self.posts.is_loading {
            return None;
        }
        self.posts.error = None;
        self.posts.is_loading = true;
        Some(self.claim(1))
    }

    /// Claim the next posts page. Only once something has been loaded.
    pub(crate) fn begin_load_more(&mut self) -> Option<Claim> {
        if self.posts.page.is_empty() {
            return None;
        }
        let page = self.posts.begin()?;
        Some(self.claim(page))
    }

    /// Claim the category advance for `position`. The counter moves in the
    /// same step so a repeated reveal of the position does nothing.
    pub(crate) fn reveal(&mut self, position: usize) -> Option<Claim> {
        if !interleave::should_advance(position, self.horizontal_page) {
            return None;
        }
        self.horizontal_page += 1;
        Some(self.claim(self.horizontal_page))
    }

    pub(crate) fn begin_ad_spots(&mut self, scope: Scope) -> Option<Claim> {
        let page = self.ad_spots.entry(scope).or_default().begin()?;
        Some(self.claim(page))
    }
}
