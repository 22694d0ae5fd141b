//! Interactive feed session. Opening a post and coming back goes through
//! the same first-load path as starting the feed, so the shared store
//! hands back the scroll position instead of refetching.

use std::str::FromStr;

use plaza_core::{
    api::FeedApi,
    controller::{FeedController, InitialLoad},
    events::FeedEvent,
    interleave::FeedEntry,
    scroll::Viewport,
    PlazaResult,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::debug;

use crate::{error::CliError, render};

/// Height of one rendered entry, used to turn entry counts into offsets.
const ROW_HEIGHT: f64 = 120.0;
const VIEWPORT_ROWS: f64 = 6.0;

const HELP: &str = "\
commands:
  more                  scroll to the end of the feed
  open <id>             show one post
  back                  return to the feed
  refresh               reload the feed from page 1
  like <id>             like or unlike a post
  comment <id> <text>   add a comment
  delete <id>           delete one of your posts
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum BrowseCommand {
    More,
    Open(String),
    Back,
    Refresh,
    Like(String),
    Comment { id: String, text: String },
    Delete(String),
    Help,
    Quit,
}

impl FromStr for BrowseCommand {
    type Err = CliError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let id = |cmd: &'static str| {
            rest.split_whitespace()
                .next()
                .map(str::to_string)
                .ok_or(CliError::MissingArgument { cmd, arg: "a post id" })
        };

        match cmd {
            "more" | "m" | "" => Ok(Self::More),
            "open" | "o" => Ok(Self::Open(id("open")?)),
            "back" | "b" => Ok(Self::Back),
            "refresh" | "r" => Ok(Self::Refresh),
            "like" | "l" => Ok(Self::Like(id("like")?)),
            "comment" | "c" => {
                let id = id("comment")?;
                let text = rest[id.len()..].trim().to_string();
                if text.is_empty() {
                    return Err(CliError::MissingArgument {
                        cmd: "comment",
                        arg: "some text",
                    });
                }
                Ok(Self::Comment { id, text })
            }
            "delete" | "d" => Ok(Self::Delete(id("delete")?)),
            "help" | "h" | "?" => Ok(Self::Help),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            other => Err(CliError::UnknownCommand {
                cmd: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum View {
    Feed,
    Post(String),
}

struct Session<A: FeedApi> {
    feed: FeedController<A>,
    events: broadcast::Receiver<FeedEvent>,
    view: View,
    /// Entries of the composite feed already printed.
    shown: usize,
}

impl<A: FeedApi> Session<A> {
    fn offset(&self) -> f64 {
        self.shown as f64 * ROW_HEIGHT
    }

    /// Enter the feed: first load, or restore where the user left it.
    async fn enter_feed(&mut self) -> PlazaResult<()> {
        self.view = View::Feed;
        match self.feed.load_initial_data().await? {
            InitialLoad::Fetched => {
                self.shown = 0;
                self.show_new_entries().await
            }
            InitialLoad::Restored(position) => {
                let offset = position.map(|pos| pos.offset).unwrap_or_default();
                self.shown = (offset / ROW_HEIGHT).round() as usize;
                debug!(offset, shown = self.shown, "scroll restored");
                println!("(back at entry {} of the feed)", self.shown);
                let state = self.feed.snapshot().await?;
                println!("{}", render::status(&state));
                Ok(())
            }
            InitialLoad::InProgress => {
                println!("-- still loading --");
                Ok(())
            }
        }
    }

    /// Print the entries past `shown`, advancing the carousels for every
    /// post that comes into view first.
    async fn show_new_entries(&mut self) -> PlazaResult<()> {
        let entries = self.feed.snapshot().await?.entries();
        let fresh = entries.get(self.shown..).unwrap_or_default();
        for entry in fresh {
            if let FeedEntry::Post(index) = entry {
                self.feed.reveal(*index).await?;
            }
        }

        let state = self.feed.snapshot().await?;
        let entries = state.entries();
        let fresh = entries.get(self.shown..).unwrap_or_default();
        if !fresh.is_empty() {
            println!("{}", render::entries(&state, fresh));
        }
        self.shown = entries.len();
        self.feed.record_scroll(self.offset()).await?;
        println!("{}", render::status(&state));
        Ok(())
    }

    /// The user reached the bottom of what is printed.
    async fn scroll_to_end(&mut self) -> PlazaResult<()> {
        if self.view != View::Feed {
            return self.enter_feed().await;
        }
        let loaded = match self.feed.config().viewport {
            Viewport::Desktop => {
                self.feed
                    .on_entries_visible(self.shown.saturating_sub(1))
                    .await?
            }
            Viewport::Mobile => {
                let viewport = VIEWPORT_ROWS * ROW_HEIGHT;
                let content = self.offset().max(viewport);
                self.feed
                    .on_scroll(content - viewport, content, viewport)
                    .await?
            }
        };
        if loaded {
            self.show_new_entries().await
        } else {
            let state = self.feed.snapshot().await?;
            println!("{}", render::status(&state));
            Ok(())
        }
    }

    async fn open(&mut self, id: String) -> PlazaResult<()> {
        let Some(post) = self.feed.store().post(&id).await? else {
            return Err(CliError::PostNotFound { id }.into());
        };
        self.feed.record_scroll(self.offset()).await?;
        println!("{}", render::post_detail(&post));
        self.view = View::Post(id);
        Ok(())
    }

    async fn refresh_open_post(&self) -> PlazaResult<()> {
        if let View::Post(id) = &self.view {
            if let Some(post) = self.feed.store().post(id).await? {
                println!("{}", render::post_detail(&post));
            }
        }
        Ok(())
    }

    async fn handle(&mut self, cmd: BrowseCommand) -> PlazaResult<()> {
        match cmd {
            BrowseCommand::More => self.scroll_to_end().await,
            BrowseCommand::Open(id) => self.open(id).await,
            BrowseCommand::Back => self.enter_feed().await,
            BrowseCommand::Refresh => {
                self.view = View::Feed;
                self.shown = 0;
                if self.feed.refresh().await? == InitialLoad::Fetched {
                    self.show_new_entries().await?;
                }
                Ok(())
            }
            BrowseCommand::Like(id) => {
                let liked = self.feed.toggle_like(&id).await?;
                println!("{} {id}", if liked { "Liked" } else { "Unliked" });
                self.refresh_open_post().await
            }
            BrowseCommand::Comment { id, text } => {
                self.feed.comment(&id, &text).await?;
                println!("Comment added to {id}");
                self.refresh_open_post().await
            }
            BrowseCommand::Delete(id) => {
                self.feed.delete(&id).await?;
                if self.view == View::Post(id) {
                    self.view = View::Feed;
                }
                Ok(())
            }
            BrowseCommand::Help => {
                println!("{HELP}");
                Ok(())
            }
            BrowseCommand::Quit => Ok(()),
        }
    }

    /// Print what other parts of the app announced since the last command.
    fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(FeedEvent::PostDeleted { post_id }) => println!("(post {post_id} removed)"),
                Ok(FeedEvent::PostCreated(post)) => println!("(new post {} on top)", post.id),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }
}

pub async fn run<A: FeedApi>(feed: FeedController<A>) -> PlazaResult<()> {
    let events = feed.bus().subscribe();
    let mut session = Session {
        feed,
        events,
        view: View::Feed,
        shown: 0,
    };
    session.enter_feed().await?;
    println!("type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let cmd = match line.parse::<BrowseCommand>() {
            Ok(cmd) => cmd,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        if cmd == BrowseCommand::Quit {
            break;
        }
        if let Err(err) = session.handle(cmd).await {
            eprintln!("ERROR: {err}");
        }
        session.drain_events();
    }
    Ok(())
}
