use plaza_core::{
    category::{AdSpot, Category, CategoryItem},
    feed::FeedState,
    interleave::FeedEntry,
    post::Post,
};
use textwrap::core::display_width;

const STRIP_WIDTH: usize = 54;
/// How many items of a carousel fit on its one-line strip.
const STRIP_ITEMS: usize = 3;

/// Render `entries` of the composite feed, posts as cards and carousels
/// as one-line strips.
pub fn entries(state: &FeedState, entries: &[FeedEntry]) -> String {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            FeedEntry::Post(index) => {
                if let Some(post) = state.posts.items.get(*index) {
                    out.push(post.to_string());
                }
            }
            FeedEntry::Carousel { category, .. } => {
                out.push(carousel(*category, state.category(*category)));
            }
        }
    }
    out.join("\n")
}

/// `== Events ==  Jazz night | Market day | +2 more`
pub fn carousel(category: Category, items: &[CategoryItem]) -> String {
    let header = format!("== {} ==", category.title());
    if items.is_empty() {
        return format!("{header}  (nothing yet)");
    }
    let mut parts: Vec<String> = items
        .iter()
        .take(STRIP_ITEMS)
        .map(|item| item.to_string())
        .collect();
    if items.len() > STRIP_ITEMS {
        parts.push(format!("+{} more", items.len() - STRIP_ITEMS));
    }
    let strip = format!("{header}  {}", parts.join(" | "));
    if display_width(&strip) <= STRIP_WIDTH * 2 {
        return strip;
    }
    let mut cut: String = strip.chars().take(STRIP_WIDTH * 2 - 3).collect();
    cut.push_str("...");
    cut
}

/// Full view of one post, with its comments.
pub fn post_detail(post: &Post) -> String {
    let mut out = post.to_string();
    if post.author.followers > 0 || post.author.is_followed {
        out.push_str(&format!(
            "\n{} followers{}",
            post.author.followers,
            if post.author.is_followed {
                " (following)"
            } else {
                ""
            }
        ));
    }
    for comment in &post.comments {
        let who = comment.user_name.as_deref().unwrap_or(&comment.user_id);
        let wrapped = textwrap::fill(
            &comment.text,
            textwrap::Options::new(STRIP_WIDTH - 4)
                .initial_indent("    ")
                .subsequent_indent("    "),
        );
        out.push_str(&format!("\n  {who}:\n{wrapped}"));
    }
    out
}

pub fn ad_spots(items: &[AdSpot]) -> String {
    if items.is_empty() {
        return String::from("No ad spots");
    }
    items
        .iter()
        .map(|spot| {
            let mut line = format!("[{}] {}", spot.id, spot.title);
            if let Some(link) = &spot.link {
                line.push_str(&format!(" -> {link}"));
            }
            for url in &spot.media {
                line.push_str(&format!("\n    [media] {url}"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Footer shown under the feed.
pub fn status(state: &FeedState) -> String {
    let page = state.page();
    if let Some(error) = state.error() {
        return format!("-- failed to load more posts: {error} --");
    }
    if state.is_loading_more() {
        return String::from("-- loading... --");
    }
    if page.has_more() {
        format!("-- page {} of {}; `more` for the next --", page.current, page.total)
    } else {
        format!("-- end of feed, {} posts --", state.posts.len())
    }
}
