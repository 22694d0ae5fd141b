//! This module defines the `Post` struct which is the heart of the feed,
//! together with the drafts used to create or edit one and the patches
//! applied to it after a successful action.

use crate::{constant, PlazaError, PlazaResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use textwrap::core::display_width;
use textwrap::{self, wrap};

/// The user (or place) that published a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default, alias = "followerCount", alias = "followersCount")]
    pub followers: u64,
    #[serde(default)]
    pub is_followed: bool,
    #[serde(default)]
    pub follows_you: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub user_id: String,
    #[serde(alias = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(alias = "content")]
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A post as served by `/api/posts/get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(alias = "user")]
    pub author: Author,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media: Vec<String>,
    #[serde(default)]
    pub likes: Vec<Like>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|like| like.user_id == user_id)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.author.id == user_id
    }

    /// Apply a patch in place. Only the fields present in the patch are
    /// replaced. Returns false if the patch targets another post.
    pub fn apply_patch(&mut self, patch: &PostPatch) -> bool {
        if patch.post_id != self.id {
            return false;
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(media) = &patch.media {
            self.media = media.clone();
        }
        if let Some(likes) = &patch.likes {
            self.likes = likes.clone();
        }
        if let Some(comments) = &patch.comments {
            self.comments = comments.clone();
        }
        if let Some(author) = &patch.author {
            self.author = author.clone();
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = Some(updated_at);
        }
        true
    }
}

/// Partial post keyed by `post_id`, produced once a single item action
/// has been confirmed by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    pub post_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<Vec<Like>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PostPatch {
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            ..Default::default()
        }
    }

    pub fn likes(mut self, likes: Vec<Like>) -> Self {
        self.likes = Some(likes);
        self
    }

    pub fn comments(mut self, comments: Vec<Comment>) -> Self {
        self.comments = Some(comments);
        self
    }

    /// Patch carrying the editable fields of a freshly edited post.
    pub fn from_edited(post: &Post) -> Self {
        Self {
            post_id: post.id.clone(),
            content: Some(post.content.clone()),
            media: Some(post.media.clone()),
            updated_at: post.updated_at,
            ..Default::default()
        }
    }
}

/// Draft of a post that has not been published yet. Media are urls
/// already produced by the upload service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub content: String,
    pub media: Vec<String>,
}

impl NewPost {
    pub fn new(content: String, media: Vec<String>) -> PlazaResult<Self> {
        let draft = Self {
            content: content.trim().to_string(),
            media,
        };
        draft.verify()?;
        Ok(draft)
    }

    pub fn verify(&self) -> PlazaResult<()> {
        verify_post_body(&self.content, &self.media)
    }
}

/// Requested changes to an existing post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostEdit {
    pub content: String,
    pub media: Vec<String>,
}

impl PostEdit {
    /// Build an edit from the current post, keeping any field not given.
    pub fn from_post(
        post: &Post,
        content: Option<String>,
        media: Option<Vec<String>>,
    ) -> PlazaResult<Self> {
        let edit = Self {
            content: content
                .map(|val| val.trim().to_string())
                .unwrap_or_else(|| post.content.clone()),
            media: media.unwrap_or_else(|| post.media.clone()),
        };
        verify_post_body(&edit.content, &edit.media)?;
        Ok(edit)
    }

    pub fn media_diff(&self, old_media: &[String]) -> MediaDiff {
        MediaDiff::between(old_media, &self.media)
    }
}

/// Difference between the media of a post before and after an edit.
/// Every list keeps the order of the side it was taken from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaDiff {
    pub kept: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl MediaDiff {
    pub fn between(old: &[String], new: &[String]) -> Self {
        let kept = old.iter().filter(|url| new.contains(url)).cloned().collect();
        let removed = old.iter().filter(|url| !new.contains(url)).cloned().collect();
        let added = new.iter().filter(|url| !old.contains(url)).cloned().collect();
        Self {
            kept,
            added,
            removed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Some necessary checks for a post's text and media.
fn verify_post_body(content: &str, media: &[String]) -> PlazaResult<()> {
    if content.trim().is_empty() && media.is_empty() {
        return Err(PlazaError::EmptyPost.into());
    }
    let curr_size = content.chars().count();
    if curr_size > constant::MAX_POST_LEN {
        return Err(PlazaError::InvalidPostLength {
            max_size: constant::MAX_POST_LEN,
            curr_size,
        }
        .into());
    }
    if media.len() > constant::MAX_POST_MEDIA {
        return Err(PlazaError::TooManyMedia {
            max_count: constant::MAX_POST_MEDIA,
            curr_count: media.len(),
        }
        .into());
    }
    if let Some(index) = media.iter().position(|url| url.trim().is_empty()) {
        return Err(PlazaError::EmptyMediaUrl { index }.into());
    }
    Ok(())
}

/// Some necessary checks for a comment.
pub fn verify_comment(text: &str) -> PlazaResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PlazaError::EmptyComment.into());
    }
    let curr_size = text.chars().count();
    if curr_size > constant::MAX_COMMENT_LEN {
        return Err(PlazaError::InvalidCommentLength {
            max_size: constant::MAX_COMMENT_LEN,
            curr_size,
        }
        .into());
    }
    Ok(text.to_string())
}

impl Display for Post {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let content_width = 50;
        let follow = if self.author.is_followed {
            "following"
        } else {
            ""
        };
        writeln!(f, "{:-<54}", "")?;
        writeln!(f, "| {:<38}{:>12} |", self.author.name, follow)?;
        let date = self.created_at.format("%Y-%m-%d %H:%M").to_string();
        writeln!(f, "| {:<50} |", date)?;
        let wrapping_config = textwrap::Options::new(content_width).break_words(true);
        for line in wrap(&self.content, wrapping_config) {
            let text_width = display_width(&line);
            let whitespace = content_width.saturating_sub(text_width);
            writeln!(f, "| {}{} |", line, " ".repeat(whitespace))?;
        }
        for url in self.media.iter() {
            let label = format!("[media] {url}");
            let text_width = display_width(&label);
            let whitespace = content_width.saturating_sub(text_width);
            writeln!(f, "| {}{} |", label, " ".repeat(whitespace))?;
        }
        let counters = format!(
            "{} likes, {} comments   #{}",
            self.likes.len(),
            self.comments.len(),
            self.id
        );
        writeln!(f, "| {:<50} |", counters)?;
        write!(f, "{:-<54}", "")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn mock_post(id: &str, author_id: &str) -> Post {
        Post {
            id: id.to_string(),
            author: Author {
                id: author_id.to_string(),
                name: format!("user {author_id}"),
                avatar: None,
                followers: 3,
                is_followed: false,
                follows_you: false,
            },
            content: format!("content of {id}"),
            media: vec![],
            likes: vec![],
            comments: vec![],
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn post_formatting_using_display() {
        let mut post = mock_post("p1", "u1");
        post.content =
            String::from("This is a demo post with emojis to test formatting 😃😃 and wrapping");
        post.media = vec![String::from("https://cdn.example/a.jpg")];
        let rendered = format!("{}", post);
        assert!(rendered.contains("user u1"));
        assert!(rendered.contains("[media] https://cdn.example/a.jpg"));
        assert!(rendered.contains("0 likes, 0 comments"));
    }

    #[test]
    fn post_deserializes_from_api_shape() {
        let raw = r#"{
            "_id": "p1",
            "user": { "_id": "u1", "name": "Ana", "followerCount": 12, "isFollowed": true },
            "content": "hello",
            "media": ["https://cdn.example/1.png"],
            "likes": [{ "userId": "u2", "createdAt": "2024-05-01T10:00:00Z" }],
            "comments": [],
            "createdAt": "2024-05-01T09:00:00Z"
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.author.followers, 12);
        assert!(post.author.is_followed);
        assert!(!post.author.follows_you);
        assert!(post.is_liked_by("u2"));
        assert_eq!(post.media.len(), 1);
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut post = mock_post("p1", "u1");
        let before = post.clone();
        let like = Like {
            user_id: "u9".into(),
            created_at: DateTime::from_timestamp(1_700_000_100, 0).unwrap(),
        };
        assert!(post.apply_patch(&PostPatch::new("p1").likes(vec![like.clone()])));
        assert_eq!(post.likes, vec![like]);
        assert_eq!(post.content, before.content);
        assert_eq!(post.author, before.author);
        assert_eq!(post.comments, before.comments);

        assert!(!post.apply_patch(&PostPatch::new("p2").likes(vec![])));
        assert_eq!(post.likes.len(), 1);
    }

    #[test]
    fn draft_validation() {
        assert!(NewPost::new("   ".into(), vec![]).is_err());
        assert!(NewPost::new(String::new(), vec!["https://cdn/x.png".into()]).is_ok());

        let too_many = (0..6).map(|i| format!("https://cdn/{i}.png")).collect();
        let err = NewPost::new("hi".into(), too_many).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlazaError>(),
            Some(PlazaError::TooManyMedia { curr_count: 6, .. })
        ));

        let err = NewPost::new("hi".into(), vec!["  ".into()]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlazaError>(),
            Some(PlazaError::EmptyMediaUrl { index: 0 })
        ));

        let long = "a".repeat(constant::MAX_POST_LEN + 1);
        assert!(NewPost::new(long, vec![]).is_err());
    }

    #[test]
    fn comment_validation_trims() {
        assert_eq!(verify_comment("  nice  ").unwrap(), "nice");
        assert!(verify_comment(" \n ").is_err());
        assert!(verify_comment(&"b".repeat(constant::MAX_COMMENT_LEN + 1)).is_err());
    }

    #[test]
    fn edit_keeps_unspecified_fields_and_diffs_media() {
        let mut post = mock_post("p1", "u1");
        post.media = vec!["a".into(), "b".into(), "c".into()];

        let edit = PostEdit::from_post(&post, None, Some(vec!["c".into(), "d".into()])).unwrap();
        assert_eq!(edit.content, post.content);

        let diff = edit.media_diff(&post.media);
        assert_eq!(diff.kept, vec!["c".to_string()]);
        assert_eq!(diff.removed, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(diff.added, vec!["d".to_string()]);
        assert!(!diff.is_empty());

        let same = PostEdit::from_post(&post, Some("new text".into()), None).unwrap();
        assert!(same.media_diff(&post.media).is_empty());
    }
}
