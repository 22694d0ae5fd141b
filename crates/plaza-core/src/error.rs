use thiserror::Error;

pub type PlazaResult<T> = anyhow::Result<T>;

#[derive(Error, Debug)]
pub enum PlazaError {
    /// A post needs either some text or at least one media item.
    #[error("Post cannot be empty")]
    EmptyPost,
    /// An empty (or whitespace only) comment was provided.
    #[error("Comment cannot be empty")]
    EmptyComment,
    /// The post text exceeds the maximum length.
    #[error("Max allowed size of post: {max_size}, current size: {curr_size}")]
    InvalidPostLength { max_size: usize, curr_size: usize },
    /// The comment text exceeds the maximum length.
    #[error("Max allowed size of comment: {max_size}, current size: {curr_size}")]
    InvalidCommentLength { max_size: usize, curr_size: usize },
    /// More media attached than a post can carry.
    #[error("Max allowed media per post: {max_count}, current count: {curr_count}")]
    TooManyMedia { max_count: usize, curr_count: usize },
    /// One of the media urls is blank.
    #[error("Media url at position {index} is empty")]
    EmptyMediaUrl { index: usize },
    /// The requested/specified ID does not exist in the feed.
    #[error("Post does not exist with the given ID: {id}")]
    InvalidId { id: String },
    /// Only the author of a post may change or remove it.
    #[error("Post {id} belongs to another user")]
    NotOwner { id: String },
    /// A report needs a reason.
    #[error("Report reason cannot be empty")]
    EmptyReason,
    /// An action needs a signed in user but none is configured.
    #[error("No user configured; set `user_id` in the config or pass --user")]
    MissingUser,
    /// The API answered with a non success status.
    #[error("Request failed with status {status}: {body}")]
    Http { status: u16, body: String },
    /// The API answered, but the payload had an unexpected shape.
    #[error("Unable to decode response: {msg}")]
    Decode { msg: String },
    /// The store task is gone, usually because the runtime is shutting down.
    #[error("Feed store is not running")]
    StoreClosed,
    #[error("Unexpected reply from the feed store to `{cmd}`")]
    UnexpectedReply { cmd: &'static str },
    #[error("Config error: {msg}")]
    ConfigError { msg: String },
}

impl PlazaError {

    pub fn config_error(msg: String) -> Self {
        Self::ConfigError { msg }
    }

    pub fn decode_error(msg: String) -> Self {
        Self::Decode { msg }
    }
}
