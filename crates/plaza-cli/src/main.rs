mod browse;
mod error;
mod render;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use plaza_core::{
    api::FeedApi,
    category::Scope,
    config::PlazaConfig,
    controller::FeedController,
    http::HttpApi,
    post::{NewPost, Post},
    PlazaResult,
};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use error::CliError;

const DEFAULT_LOG_FILTER: &str = "plaza=info,plaza_core=info";

#[derive(Parser)]
#[command(author, version, about, long_about=None)]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    /// Path to config file; defaults to ~/.plaza/plaza.toml
    config: Option<PathBuf>,

    #[arg(short, long)]
    /// Base url of the marketplace API, for ex. https://plaza.example.com
    api: Option<String>,

    #[arg(short, long)]
    /// Id of the signed in user
    user: Option<String>,

    #[arg(short, long, action = ArgAction::SetTrue)]
    /// Select if the output should be json
    json: bool,

    #[command(subcommand)]
    command: PlazaCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum PlazaCommand {
    /// Print the feed, with its category carousels
    Feed {
        #[arg(short, long, default_value_t = 1)]
        pages: u32,
    },

    Like {
        id: String,
    },

    Unlike {
        id: String,
    },

    Comment {
        id: String,
        text: String,
    },

    Report {
        id: String,
        reason: String,
    },

    /// Deletes one of your posts
    Delete {
        id: String,
    },

    /// Creates a new post; the content is read from stdin when not given
    Post {
        #[arg(short, long)]
        content: Option<String>,
        #[arg(short, long)]
        media: Vec<String>,
    },

    /// Edits one of your posts. `--media` replaces the whole list
    Edit {
        id: String,
        #[arg(short, long)]
        content: Option<String>,
        #[arg(short, long)]
        media: Vec<String>,
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "media")]
        clear_media: bool,
    },

    Follow {
        id: String,
    },

    Unfollow {
        id: String,
    },

    /// List the ad spots of a place, a shop or the whole marketplace
    Ads {
        #[arg(long, conflicts_with = "shop")]
        place: Option<String>,
        #[arg(long)]
        shop: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        pages: u32,
    },

    /// Scroll the feed interactively
    Browse,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> PlazaResult<PlazaConfig> {
    let mut config = PlazaConfig::load(cli.config.as_deref())?;
    if let Some(api) = &cli.api {
        config.api_base = api.clone();
    }
    if let Some(user) = &cli.user {
        config.user_id = Some(user.clone());
    }
    Ok(config)
}

fn print_post(post: &Post, json: bool) -> PlazaResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(post)?);
    } else {
        println!("{}", render::post_detail(post));
    }
    Ok(())
}

/// Page through the feed until `id` shows up.
async fn find_post<A: FeedApi>(feed: &FeedController<A>, id: &str) -> PlazaResult<Post> {
    feed.load_initial_data().await?;
    loop {
        if let Some(post) = feed.store().post(id).await? {
            return Ok(post);
        }
        if !feed.load_more_posts().await? {
            return Err(CliError::PostNotFound { id: id.to_string() }.into());
        }
    }
}

async fn show_feed<A: FeedApi>(
    feed: &FeedController<A>,
    pages: u32,
    json: bool,
) -> PlazaResult<()> {
    feed.load_initial_data().await?;
    for _ in 1..pages {
        if !feed.load_more_posts().await? {
            break;
        }
    }
    let posts = feed.snapshot().await?.posts.len();
    for index in 0..posts {
        feed.reveal(index).await?;
    }

    let state = feed.snapshot().await?;
    if json {
        let out = json!({
            "posts": state.posts.items,
            "pagination": state.page(),
            "categories": state.categories,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", render::entries(&state, &state.entries()));
        println!("{}", render::status(&state));
    }
    Ok(())
}

async fn show_ads<A: FeedApi>(
    feed: &FeedController<A>,
    scope: Scope,
    pages: u32,
    json: bool,
) -> PlazaResult<()> {
    for _ in 0..pages {
        if !feed.load_more_ad_spots(scope.clone()).await? {
            break;
        }
    }
    let state = feed.snapshot().await?;
    let spots = state
        .ad_spots
        .get(&scope)
        .map(|pager| pager.items.as_slice())
        .unwrap_or_default();
    if json {
        println!("{}", serde_json::to_string_pretty(spots)?);
    } else {
        println!("{}", render::ad_spots(spots));
    }
    Ok(())
}

fn read_content(content: Option<String>) -> PlazaResult<String> {
    if let Some(content) = content {
        return Ok(content);
    }
    println!("Enter post content(Press Ctrl-d on new line to end): ");
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

async fn run(cli: Cli) -> PlazaResult<()> {
    let config = load_config(&cli)?;
    let api = HttpApi::new(&config)?;
    let feed = FeedController::new(Arc::new(api), config);
    let json = cli.json;

    match cli.command {
        PlazaCommand::Feed { pages } => show_feed(&feed, pages.max(1), json).await?,
        PlazaCommand::Like { id } => {
            feed.like(&id).await?;
            println!("Liked {id}");
        }
        PlazaCommand::Unlike { id } => {
            feed.unlike(&id).await?;
            println!("Unliked {id}");
        }
        PlazaCommand::Comment { id, text } => {
            feed.comment(&id, &text).await?;
            println!("Comment added to {id}");
        }
        PlazaCommand::Report { id, reason } => {
            feed.report(&id, &reason).await?;
            println!("Reported {id}");
        }
        PlazaCommand::Delete { id } => {
            find_post(&feed, &id).await?;
            feed.delete(&id).await?;
            println!("Deleted {id}");
        }
        PlazaCommand::Post { content, media } => {
            let draft = NewPost::new(read_content(content)?, media)?;
            let post = feed.create(draft).await?;
            print_post(&post, json)?;
        }
        PlazaCommand::Edit {
            id,
            content,
            media,
            clear_media,
        } => {
            let media = match (media.is_empty(), clear_media) {
                (_, true) => Some(vec![]),
                (true, false) => None,
                (false, false) => Some(media),
            };
            if content.is_none() && media.is_none() {
                return Err(CliError::EmptyEdit.into());
            }
            find_post(&feed, &id).await?;
            let post = feed.edit(&id, content, media).await?;
            print_post(&post, json)?;
        }
        PlazaCommand::Follow { id } => {
            feed.follow(&id, true).await?;
            println!("Following {id}");
        }
        PlazaCommand::Unfollow { id } => {
            feed.follow(&id, false).await?;
            println!("Unfollowed {id}");
        }
        PlazaCommand::Ads { place, shop, pages } => {
            let scope = match (place, shop) {
                (Some(place), _) => Scope::Place(place),
                (None, Some(shop)) => Scope::Shop(shop),
                (None, None) => Scope::Global,
            };
            show_ads(&feed, scope, pages.max(1), json).await?
        }
        PlazaCommand::Browse => browse::run(feed).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    debug!(command = ?cli.command, "starting");

    if let Err(err) = run(cli).await {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}
