//! The feed store: a task that owns the [`FeedState`] and applies every
//! read and write in the order the commands arrive.

use tokio::sync::{broadcast::error::RecvError, mpsc, oneshot};
use tracing::{debug, warn};

use crate::{
    category::Scope,
    constant::STORE_CHANNEL_SIZE,
    events::{EventBus, FeedEvent},
    feed::{Action, FeedState},
    pager::Claim,
    post::Post,
    scroll::ScrollPosition,
    PlazaError, PlazaResult, Responder,
};

#[derive(Debug)]
pub enum Command {
    Snapshot,
    EntriesLen,
    Post(String),
    Apply(Action),
    BeginInitial,
    BeginLoadMore,
    Reveal { position: usize },
    BeginAdSpots { scope: Scope },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Snapshot => "snapshot",
            Command::EntriesLen => "entries_len",
            Command::Post(_) => "post",
            Command::Apply(_) => "apply",
            Command::BeginInitial => "begin_initial",
            Command::BeginLoadMore => "begin_load_more",
            Command::Reveal { .. } => "reveal",
            Command::BeginAdSpots { .. } => "begin_ad_spots",
        }
    }
}

/// Outcome of claiming the initial load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialClaim {
    /// The store is empty; the caller must fetch page 1 and report back
    /// with this generation.
    Fetch { generation: u64 },
    /// Posts are already there; restore this scroll position instead.
    Restore(Option<ScrollPosition>),
    /// Another initial load is still running.
    Busy,
}

#[derive(Debug)]
pub enum Reply {
    State(Box<FeedState>),
    Len(usize),
    Post(Option<Box<Post>>),
    Applied(bool),
    Initial(InitialClaim),
    Claim(Option<Claim>),
}

pub struct StoreCommand {
    pub cmd: Command,
    pub resp: Option<Responder<Reply>>,
}

/// Sending on a oneshot channel hands the value back on failure, which
/// only means the requester stopped waiting.
fn respond(responder: Responder<Reply>, reply: Reply) {
    let _ = responder.send(reply);
}

fn handle_command(state: &mut FeedState, cmd: Command) -> Reply {
    match cmd {
        Command::Snapshot => Reply::State(Box::new(state.clone())),
        Command::EntriesLen => Reply::Len(state.entries().len()),
        Command::Post(id) => Reply::Post(state.post(&id).cloned().map(Box::new)),
        Command::Apply(action) => Reply::Applied(state.apply(action)),
        Command::BeginInitial => {
            if !state.posts.is_empty() {
                return Reply::Initial(InitialClaim::Restore(state.scroll));
            }
            match state.begin_initial() {
                Some(claim) => Reply::Initial(InitialClaim::Fetch {
                    generation: claim.generation,
                }),
                None => Reply::Initial(InitialClaim::Busy),
            }
        }
        Command::BeginLoadMore => Reply::Claim(state.begin_load_more()),
        Command::Reveal { position } => Reply::Claim(state.reveal(position)),
        Command::BeginAdSpots { scope } => Reply::Claim(state.begin_ad_spots(scope)),
    }
}

/// Owner of the feed state. Created once per session; every component
/// talks to it through a [`FeedHandle`].
pub struct FeedStore;

impl FeedStore {
    /// Start the store task on the current runtime. Events published on
    /// `bus` are applied before any command sent after them.
    pub fn spawn(bus: &EventBus) -> FeedHandle {
        let (tx, rx) = mpsc::channel(STORE_CHANNEL_SIZE);
        let events = bus.subscribe();
        tokio::spawn(run(rx, events));
        FeedHandle { tx }
    }
}

async fn run(
    mut rx: mpsc::Receiver<StoreCommand>,
    mut events: tokio::sync::broadcast::Receiver<FeedEvent>,
) {
    debug!("feed store running");
    let mut state = FeedState::default();
    let mut events_open = true;

    loop {
        tokio::select! {
            biased;

            event = events.recv(), if events_open => match event {
                Ok(event) => {
                    debug!(?event, "applying feed event");
                    state.apply(event.into_action());
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "feed store lagged behind the event bus");
                }
                Err(RecvError::Closed) => events_open = false,
            },

            cmd = rx.recv() => match cmd {
                Some(StoreCommand { cmd, resp }) => {
                    let reply = handle_command(&mut state, cmd);
                    if let Some(resp) = resp {
                        respond(resp, reply);
                    }
                }
                None => break,
            },
        }
    }
    debug!("feed store stopped");
}

/// Cloneable access to the feed store.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl FeedHandle {
    async fn request(&self, cmd: Command) -> PlazaResult<Reply> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand {
                cmd,
                resp: Some(resp),
            })
            .await
            .map_err(|_| PlazaError::StoreClosed)?;
        Ok(rx.await.map_err(|_| PlazaError::StoreClosed)?)
    }

    async fn request_claim(&self, cmd: Command) -> PlazaResult<Option<Claim>> {
        let name = cmd.name();
        match self.request(cmd).await? {
            Reply::Claim(claim) => Ok(claim),
            _ => Err(PlazaError::UnexpectedReply { cmd: name }.into()),
        }
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> PlazaResult<FeedState> {
        match self.request(Command::Snapshot).await? {
            Reply::State(state) => Ok(*state),
            _ => Err(PlazaError::UnexpectedReply { cmd: "snapshot" }.into()),
        }
    }

    /// Number of entries in the composite feed, carousels included.
    pub async fn entries_len(&self) -> PlazaResult<usize> {
        match self.request(Command::EntriesLen).await? {
            Reply::Len(len) => Ok(len),
            _ => Err(PlazaError::UnexpectedReply { cmd: "entries_len" }.into()),
        }
    }

    /// A copy of one post, if it is in the feed.
    pub async fn post(&self, post_id: &str) -> PlazaResult<Option<Post>> {
        match self.request(Command::Post(post_id.to_string())).await? {
            Reply::Post(post) => Ok(post.map(|post| *post)),
            _ => Err(PlazaError::UnexpectedReply { cmd: "post" }.into()),
        }
    }

    /// Apply an action and report whether it changed anything.
    pub async fn dispatch(&self, action: Action) -> PlazaResult<bool> {
        match self.request(Command::Apply(action)).await? {
            Reply::Applied(changed) => Ok(changed),
            _ => Err(PlazaError::UnexpectedReply { cmd: "apply" }.into()),
        }
    }

    pub async fn begin_initial(&self) -> PlazaResult<InitialClaim> {
        match self.request(Command::BeginInitial).await? {
            Reply::Initial(claim) => Ok(claim),
            _ => Err(PlazaError::UnexpectedReply {
                cmd: "begin_initial",
            }
            .into()),
        }
    }

    /// Page to fetch next, if pagination may proceed.
    pub async fn begin_load_more(&self) -> PlazaResult<Option<Claim>> {
        self.request_claim(Command::BeginLoadMore).await
    }

    /// Category page to fetch because `position` was reached, if any.
    pub async fn reveal(&self, position: usize) -> PlazaResult<Option<Claim>> {
        self.request_claim(Command::Reveal { position }).await
    }

    pub async fn begin_ad_spots(&self, scope: Scope) -> PlazaResult<Option<Claim>> {
        self.request_claim(Command::BeginAdSpots { scope }).await
    }
}
