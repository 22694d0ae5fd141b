use async_trait::async_trait;

use crate::{
    category::{Category, Scope},
    post::{Comment, Like, NewPost, Post, PostEdit},
    state::{AdSpotPage, CategoryPage, FollowResponse, PostsPage},
    PlazaResult,
};

/// The marketplace endpoints the feed depends on. [`crate::http::HttpApi`]
/// talks to the real server; tests use an in-memory fake.
#[async_trait]
pub trait FeedApi: Send + Sync {
    async fn fetch_posts(&self, page: u32, limit: u32) -> PlazaResult<PostsPage>;

    async fn fetch_category(
        &self,
        category: Category,
        page: u32,
        limit: u32,
        scope: &Scope,
    ) -> PlazaResult<CategoryPage>;

    async fn fetch_ad_spots(&self, scope: &Scope, page: u32, limit: u32)
        -> PlazaResult<AdSpotPage>;

    /// Returns the post's likes after the change.
    async fn like_post(&self, post_id: &str) -> PlazaResult<Vec<Like>>;

    async fn unlike_post(&self, post_id: &str) -> PlazaResult<Vec<Like>>;

    /// Returns the post's comments after the change.
    async fn add_comment(&self, post_id: &str, text: &str) -> PlazaResult<Vec<Comment>>;

    async fn report_post(&self, post_id: &str, reason: &str) -> PlazaResult<()>;

    async fn delete_post(&self, post_id: &str) -> PlazaResult<()>;

    async fn edit_post(&self, post_id: &str, edit: &PostEdit) -> PlazaResult<Post>;

    async fn create_post(&self, draft: &NewPost) -> PlazaResult<Post>;

    async fn follow(&self, organizer_id: &str, follow: bool) -> PlazaResult<FollowResponse>;
}
