//! Placement of category carousels between the posts of the feed.
//!
//! A carousel follows every [`POSTS_PER_BATCH`]th post and the carousels
//! cycle through [`CATEGORY_CYCLE`]. Every [`CATEGORY_CYCLE_LEN`] batches the
//! category lists move on to their next page.

use crate::category::{Category, CATEGORY_CYCLE};
use crate::constant::{CATEGORY_CYCLE_LEN, POSTS_PER_BATCH};

/// One row of the composite feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEntry {
    /// Index into the posts list.
    Post(usize),
    Carousel { category: Category, position: usize },
}

/// Batch number of the post at `index`.
pub fn position_of(index: usize) -> usize {
    index / POSTS_PER_BATCH
}

/// Category carousel shown right after the post at `index`, if any.
pub fn interstitial_at(index: usize) -> Option<Category> {
    if (index + 1) % POSTS_PER_BATCH != 0 {
        return None;
    }
    Some(category_for(position_of(index)))
}

pub fn category_for(position: usize) -> Category {
    CATEGORY_CYCLE[position % CATEGORY_CYCLE_LEN]
}

/// True when reaching `position` should move the category lists past
/// `horizontal_page`.
pub fn should_advance(position: usize, horizontal_page: u32) -> bool {
    position > 0
        && position % CATEGORY_CYCLE_LEN == 0
        && (position / CATEGORY_CYCLE_LEN) as u64 >= horizontal_page as u64
}

/// Lay out `posts_len` posts with their carousels.
pub fn layout(posts_len: usize) -> Vec<FeedEntry> {
    let mut entries = Vec::with_capacity(posts_len + posts_len / POSTS_PER_BATCH);
    for index in 0..posts_len {
        entries.push(FeedEntry::Post(index));
        if let Some(category) = interstitial_at(index) {
            entries.push(FeedEntry::Carousel {
                category,
                position: position_of(index),
            });
        }
    }
    entries
}
