//! Response bodies of the marketplace API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    category::{AdSpot, Category, CategoryItem},
    pager::PageCursor,
    post::{Comment, Like, Post},
    PlazaError, PlazaResult,
};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub current: Option<u32>,
}

impl Pagination {
    /// Cursor for a page of this listing; the server's `current` wins
    /// over the page that was asked for.
    pub fn cursor(&self, requested: u32) -> PageCursor {
        PageCursor::new(self.current.unwrap_or(requested), self.pages)
    }
}

/// `GET /api/posts/get`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PostsResponse {
    pub posts: Vec<Post>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone)]
pub struct PostsPage {
    pub posts: Vec<Post>,
    pub page: PageCursor,
}

impl PostsResponse {
    pub fn into_page(self, requested: u32) -> PostsPage {
        PostsPage {
            page: self.pagination.cursor(requested),
            posts: self.posts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryPage {
    pub category: Category,
    pub items: Vec<CategoryItem>,
    pub page: PageCursor,
}

impl CategoryPage {
    /// Parse `{ <category>: Item[], pagination }`, keeping at most `limit`
    /// items. Documents that cannot become a card are skipped.
    pub fn parse(
        category: Category,
        body: &Value,
        requested: u32,
        limit: u32,
    ) -> PlazaResult<Self> {
        let list = body
            .get(category.response_key())
            .and_then(Value::as_array)
            .ok_or_else(|| {
                PlazaError::decode_error(format!(
                    "missing `{}` array in response",
                    category.response_key()
                ))
            })?;
        let pagination = match body.get("pagination") {
            Some(raw) => serde_json::from_value::<Pagination>(raw.clone())?,
            None => Pagination::default(),
        };
        let items = list
            .iter()
            .filter_map(|doc| CategoryItem::from_value(category, doc))
            .take(limit as usize)
            .collect();
        Ok(Self {
            category,
            items,
            page: pagination.cursor(requested),
        })
    }
}

/// `GET /api/adspots/get`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdSpotResponse {
    pub ad_spots: Vec<AdSpot>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone)]
pub struct AdSpotPage {
    pub items: Vec<AdSpot>,
    pub page: PageCursor,
}

impl AdSpotResponse {
    pub fn into_page(self, requested: u32) -> AdSpotPage {
        AdSpotPage {
            page: self.pagination.cursor(requested),
            items: self.ad_spots,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LikesResponse {
    pub likes: Vec<Like>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CommentsResponse {
    pub comments: Vec<Comment>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PostResponse {
    pub post: Post,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    pub is_followed: bool,
    #[serde(default, alias = "followerCount")]
    pub followers: u64,
}
