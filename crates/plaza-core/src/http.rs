//! `reqwest` implementation of [`FeedApi`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    api::FeedApi,
    category::{Category, Scope},
    config::PlazaConfig,
    post::{Comment, Like, NewPost, Post, PostEdit},
    state::{
        AdSpotPage, AdSpotResponse, CategoryPage, CommentsResponse, FollowResponse,
        LikesResponse, PostResponse, PostsPage, PostsResponse,
    },
    PlazaError, PlazaResult,
};

pub struct HttpApi {
    base: String,
    user_id: Option<String>,
    client: reqwest::Client,
}

impl HttpApi {
    pub fn new(config: &PlazaConfig) -> PlazaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            base: config.api_base.trim_end_matches('/').to_string(),
            user_id: config.user_id.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn user(&self) -> PlazaResult<&str> {
        self.user_id
            .as_deref()
            .ok_or_else(|| PlazaError::MissingUser.into())
    }

    fn page_query(page: u32, limit: u32, scope: &Scope) -> Vec<(&'static str, String)> {
        let mut query = vec![("page", page.to_string()), ("limit", limit.to_string())];
        if let Some((key, id)) = scope.query_param() {
            query.push((key, id.to_string()));
        }
        query
    }

    /// Turn a response into `T`, or into `PlazaError::Http` for a non
    /// success status.
    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> PlazaResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlazaError::Http {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        let body = response
            .json::<T>()
            .await
            .map_err(|err| PlazaError::decode_error(err.to_string()))?;
        Ok(body)
    }
}

#[async_trait]
impl FeedApi for HttpApi {
    async fn fetch_posts(&self, page: u32, limit: u32) -> PlazaResult<PostsPage> {
        let mut query = Self::page_query(page, limit, &Scope::Global);
        if let Some(user_id) = &self.user_id {
            query.push(("currentUserId", user_id.clone()));
        }
        debug!(page, limit, "fetching posts");
        let response = self
            .client
            .get(self.url("/api/posts/get"))
            .query(&query)
            .send()
            .await?;
        let body: PostsResponse = Self::read(response).await?;
        Ok(body.into_page(page))
    }

    async fn fetch_category(
        &self,
        category: Category,
        page: u32,
        limit: u32,
        scope: &Scope,
    ) -> PlazaResult<CategoryPage> {
        debug!(%category, page, limit, %scope, "fetching category");
        let response = self
            .client
            .get(self.url(&format!("/api/{}/get", category.segment())))
            .query(&Self::page_query(page, limit, scope))
            .send()
            .await?;
        let body: Value = Self::read(response).await?;
        CategoryPage::parse(category, &body, page, limit)
    }

    async fn fetch_ad_spots(
        &self,
        scope: &Scope,
        page: u32,
        limit: u32,
    ) -> PlazaResult<AdSpotPage> {
        debug!(page, limit, %scope, "fetching ad spots");
        let response = self
            .client
            .get(self.url("/api/adspots/get"))
            .query(&Self::page_query(page, limit, scope))
            .send()
            .await?;
        let body: AdSpotResponse = Self::read(response).await?;
        let mut page = body.into_page(page);
        page.items.truncate(limit as usize);
        Ok(page)
    }

    async fn like_post(&self, post_id: &str) -> PlazaResult<Vec<Like>> {
        let response = self
            .client
            .post(self.url(&format!("/api/posts/{post_id}/like")))
            .json(&json!({ "userId": self.user()? }))
            .send()
            .await?;
        let body: LikesResponse = Self::read(response).await?;
        Ok(body.likes)
    }

    async fn unlike_post(&self, post_id: &str) -> PlazaResult<Vec<Like>> {
        let response = self
            .client
            .delete(self.url(&format!("/api/posts/{post_id}/like")))
            .json(&json!({ "userId": self.user()? }))
            .send()
            .await?;
        let body: LikesResponse = Self::read(response).await?;
        Ok(body.likes)
    }

    async fn add_comment(&self, post_id: &str, text: &str) -> PlazaResult<Vec<Comment>> {
        let response = self
            .client
            .post(self.url(&format!("/api/posts/{post_id}/comments")))
            .json(&json!({ "userId": self.user()?, "text": text }))
            .send()
            .await?;
        let body: CommentsResponse = Self::read(response).await?;
        Ok(body.comments)
    }

    async fn report_post(&self, post_id: &str, reason: &str) -> PlazaResult<()> {
        let response = self
            .client
            .post(self.url(&format!("/api/posts/{post_id}/report")))
            .json(&json!({ "userId": self.user()?, "reason": reason }))
            .send()
            .await?;
        let _: Value = Self::read(response).await?;
        info!(post_id, "post reported");
        Ok(())
    }

    async fn delete_post(&self, post_id: &str) -> PlazaResult<()> {
        let response = self
            .client
            .delete(self.url("/api/posts/delete"))
            .json(&json!({ "postId": post_id, "userId": self.user()? }))
            .send()
            .await?;
        let _: Value = Self::read(response).await?;
        info!(post_id, "post deleted");
        Ok(())
    }

    async fn edit_post(&self, post_id: &str, edit: &PostEdit) -> PlazaResult<Post> {
        let response = self
            .client
            .put(self.url(&format!("/api/posts/{post_id}/edit")))
            .json(&json!({
                "userId": self.user()?,
                "content": edit.content,
                "media": edit.media,
            }))
            .send()
            .await?;
        let body: PostResponse = Self::read(response).await?;
        Ok(body.post)
    }

    async fn create_post(&self, draft: &NewPost) -> PlazaResult<Post> {
        let response = self
            .client
            .post(self.url("/api/posts/create"))
            .json(&json!({
                "userId": self.user()?,
                "content": draft.content,
                "media": draft.media,
            }))
            .send()
            .await?;
        let body: PostResponse = Self::read(response).await?;
        info!(post_id = %body.post.id, "post created");
        Ok(body.post)
    }

    async fn follow(&self, organizer_id: &str, follow: bool) -> PlazaResult<FollowResponse> {
        let url = self.url(&format!("/api/users/{organizer_id}/follow"));
        let request = if follow {
            self.client.post(url)
        } else {
            self.client.delete(url)
        };
        let response = request
            .json(&json!({ "userId": self.user()? }))
            .send()
            .await?;
        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_and_queries() {
        let config = PlazaConfig {
            api_base: "https://plaza.example.com/".into(),
            ..Default::default()
        };
        let api = HttpApi::new(&config).unwrap();
        assert_eq!(
            api.url("/api/posts/get"),
            "https://plaza.example.com/api/posts/get"
        );

        let query = HttpApi::page_query(2, 5, &Scope::Shop("s1".into()));
        assert_eq!(
            query,
            vec![
                ("page", "2".to_string()),
                ("limit", "5".to_string()),
                ("shopId", "s1".to_string())
            ]
        );
        assert_eq!(HttpApi::page_query(1, 5, &Scope::Global).len(), 2);
    }

    #[test]
    fn mutations_need_a_user() {
        let api = HttpApi::new(&PlazaConfig::default()).unwrap();
        assert!(api.user().is_err());
    }
}
