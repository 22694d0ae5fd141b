//! Welcome to the documentation of Plaza. This crate holds the feed of
//! the marketplace: posts fetched page by page, category carousels woven
//! between them, and the actions a user can take on a single post.
//!
//! All feed state lives in one store task (see [`store`]); the
//! [`controller::FeedController`] talks to the API and feeds the results
//! back into it.
mod error;
pub mod api;
pub mod category;
pub mod config;
pub mod controller;
pub mod events;
pub mod feed;
pub mod http;
pub mod interleave;
pub mod pager;
pub mod post;
pub mod scroll;
pub mod state;
pub mod store;

pub use error::{PlazaError, PlazaResult};

pub mod constant {
    pub const MAX_POST_LEN: usize = 2000;
    pub const MAX_POST_MEDIA: usize = 5;
    pub const MAX_COMMENT_LEN: usize = 1000;
    /// A category carousel follows this many posts.
    pub const POSTS_PER_BATCH: usize = 4;
    pub const CATEGORY_CYCLE_LEN: usize = 5;
    pub const STORE_CHANNEL_SIZE: usize = 16;
    pub const EVENT_BUS_CAPACITY: usize = 64;
    pub const CONFIG_DIR: &str = ".plaza";
    pub const CONFIG_FILE: &str = "plaza.toml";
    pub const CONFIG_ENV: &str = "PLAZACONF";
}

/// Used to send replies back from the store task.
pub type Responder<T> = tokio::sync::oneshot::Sender<T>;
