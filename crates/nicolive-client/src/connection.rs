//! Connection manager and post coordinator.
//!
//! One [`CommentClient`] owns at most one TCP connection to the comment
//! server and drives the lifecycle state machine:
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──first <thread>──▶ Connected
//!      ▲                                                        │
//!      └── disconnect() / server close / dispose() ◀────────────┘
//! ```
//!
//! Inbound bytes flow through a spawned read task: socket read →
//! [`FrameSplitter`] → [`parse_frame`] → event publication on the bus.
//! The read task is wired up as soon as the socket exists – before the
//! connect frame goes out – so early errors and data surface correctly.
//!
//! Posting is a four-step orchestration per call: guards (empty text,
//! connection present) → fresh post key over HTTP → post frame on the
//! socket → wait for the correlated `chat_result`, racing a timer.  The
//! subscription for the result is opened *before* the frame is written,
//! so the result cannot slip past; whichever of result and timer fires
//! first drops the other.
//!
//! Concurrency note: the post credentials live in a single shared slot
//! (ticket from the connection response, key/thread written per post).
//! Two overlapping `post_comment` calls can overwrite each other's key and
//! observe a crossed result.  The client does not serialize posts; callers
//! that need concurrent posting must queue the calls themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use nicolive_core::{
    connect_frame, parse_frame, post_frame, Comment, FrameSplitter, PostFrame, PostStatus,
    ServerEvent, FRAME_DELIMITER,
};

use crate::error::ChatError;
use crate::events::{ChatEvent, EventBus};
use crate::postkey::{HttpPostKeySource, PostKeySource};
use crate::session::LiveSession;

// ── Options ───────────────────────────────────────────────────────────────────

/// Options for [`CommentClient::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// How many backlog comments to request on connect.
    pub first_get_comments: u32,
    /// How long to wait for the server's connection response.
    pub timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            first_get_comments: 100,
            timeout: Duration::from_millis(5000),
        }
    }
}

/// Options for [`CommentClient::post_comment`].
#[derive(Debug, Clone)]
pub struct PostOptions {
    /// Command directives for the `mail` field, joined with single spaces
    /// (`["184", "big"]` → `mail="184 big"`).
    pub command: Vec<String>,
    /// How long to wait for the server's `chat_result`.
    pub timeout: Duration,
}

impl Default for PostOptions {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout: Duration::from_millis(3000),
        }
    }
}

/// Lifecycle state of the single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── Shared state ──────────────────────────────────────────────────────────────

/// Credentials for posting.  The ticket persists for the connection; the
/// key and thread id are overwritten per post attempt (single shared slot).
#[derive(Debug, Default)]
struct PostCredentials {
    ticket: Option<String>,
    post_key: Option<String>,
    thread: Option<String>,
}

#[derive(Default)]
struct SocketSlot {
    writer: Option<OwnedWriteHalf>,
    reader: Option<JoinHandle<()>>,
}

/// State shared between the client facade and the read task.
struct Shared {
    bus: EventBus,
    state: StdMutex<ConnectionState>,
    credentials: StdMutex<PostCredentials>,
    io: AsyncMutex<SocketSlot>,
    /// Guards the once-per-connection `Connected` event.
    connected_announced: AtomicBool,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Chat client for one live session: connection lifecycle, decoded event
/// stream, and comment posting.
pub struct CommentClient {
    /// `None` after [`dispose`](CommentClient::dispose).
    session: RwLock<Option<Arc<LiveSession>>>,
    shared: Arc<Shared>,
    post_key_source: Arc<dyn PostKeySource>,
}

impl CommentClient {
    /// Client using the production post-key endpoint, authenticated with
    /// the session's cookie.
    pub fn new(session: Arc<LiveSession>) -> Self {
        let source = Arc::new(HttpPostKeySource::new(session.cookie.clone()));
        Self::with_post_key_source(session, source)
    }

    /// Client with a custom post-key source (tests, alternative endpoints).
    pub fn with_post_key_source(
        session: Arc<LiveSession>,
        post_key_source: Arc<dyn PostKeySource>,
    ) -> Self {
        Self {
            session: RwLock::new(Some(session)),
            shared: Arc::new(Shared {
                bus: EventBus::default(),
                state: StdMutex::new(ConnectionState::Disconnected),
                credentials: StdMutex::new(PostCredentials::default()),
                io: AsyncMutex::new(SocketSlot::default()),
                connected_announced: AtomicBool::new(false),
            }),
            post_key_source,
        }
    }

    /// Opens a subscription to the client's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.shared.bus.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock().expect("state lock poisoned")
    }

    /// The live session this client was built for.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Disposed`] after [`dispose`](CommentClient::dispose).
    pub fn session(&self) -> Result<Arc<LiveSession>, ChatError> {
        self.session
            .read()
            .expect("session lock poisoned")
            .clone()
            .ok_or(ChatError::Disposed)
    }

    /// Connects to the comment server.
    ///
    /// Idempotent: when a socket already exists the call resolves
    /// immediately without opening a second one.  Otherwise it dials,
    /// writes the connect frame, and resolves once the server's first
    /// `thread` response is decoded.  Dial and write failures during
    /// establishment are published as [`ChatEvent::SocketError`] – the
    /// caller observes [`ChatError::ConnectionTimeout`] when the timer
    /// fires, and the connection is left `Disconnected`.
    pub async fn connect(&self, options: ConnectOptions) -> Result<(), ChatError> {
        let session = self.session()?;
        // Subscribe before anything touches the socket so the connection
        // response cannot be missed.
        let mut events = self.shared.bus.subscribe();

        match timeout(options.timeout, self.establish(&session, &options, &mut events)).await {
            Ok(result) => result,
            Err(_) => {
                self.teardown().await;
                Err(ChatError::ConnectionTimeout)
            }
        }
    }

    async fn establish(
        &self,
        session: &Arc<LiveSession>,
        options: &ConnectOptions,
        events: &mut broadcast::Receiver<ChatEvent>,
    ) -> Result<(), ChatError> {
        let mut io = self.shared.io.lock().await;
        if io.writer.is_some() {
            return Ok(());
        }

        self.shared.set_state(ConnectionState::Connecting);
        self.shared
            .connected_announced
            .store(false, Ordering::SeqCst);

        let stream = match TcpStream::connect((session.addr.as_str(), session.port)).await {
            Ok(stream) => stream,
            Err(e) => {
                self.shared.set_state(ConnectionState::Disconnected);
                self.shared
                    .bus
                    .publish(ChatEvent::SocketError(e.to_string()));
                // Dial failures surface as events only; the caller's
                // outcome is the connect timer.
                return std::future::pending().await;
            }
        };

        let (read_half, mut write_half) = stream.into_split();

        // Wire the read task before the connect frame goes out.
        let reader = tokio::spawn(read_loop(
            read_half,
            Arc::clone(&self.shared),
            Arc::clone(session),
        ));
        io.reader = Some(reader);

        let frame = connect_frame(&session.thread(), options.first_get_comments);
        if let Err(e) = write_frame(&mut write_half, &frame).await {
            self.shared
                .bus
                .publish(ChatEvent::SocketError(e.to_string()));
            return std::future::pending().await;
        }
        io.writer = Some(write_half);
        drop(io);

        // Resolve on the connection response for this attempt.
        loop {
            match events.recv().await {
                Ok(ChatEvent::Connected) => return Ok(()),
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return std::future::pending().await,
            }
        }
    }

    /// Destroys any existing socket (ignoring its close semantics),
    /// discards the captured ticket, and performs a fresh connect.
    pub async fn reconnect(&self, options: ConnectOptions) -> Result<(), ChatError> {
        self.session()?;
        self.teardown().await;
        {
            let mut credentials = self
                .shared
                .credentials
                .lock()
                .expect("credentials lock poisoned");
            credentials.ticket = None;
        }
        self.connect(options).await
    }

    /// Closes the connection.  A no-op when there is no socket.
    pub async fn disconnect(&self) -> Result<(), ChatError> {
        self.session()?;
        self.teardown().await;
        Ok(())
    }

    /// Releases the session reference and credentials, disconnects, and
    /// makes every subsequent call fail with [`ChatError::Disposed`].
    /// Idempotent.
    pub async fn dispose(&self) {
        let session = self.session.write().expect("session lock poisoned").take();
        if session.is_none() {
            return;
        }
        self.teardown().await;
        let mut credentials = self
            .shared
            .credentials
            .lock()
            .expect("credentials lock poisoned");
        *credentials = PostCredentials::default();
    }

    /// Posts a comment and waits for the server's verdict.
    ///
    /// # Errors
    ///
    /// - [`ChatError::EmptyComment`] when `text` is whitespace-only (no
    ///   network traffic happens).
    /// - [`ChatError::NotConnected`] without an open socket.
    /// - [`ChatError::PostKey`] when the key fetch fails, unchanged.
    /// - [`ChatError::PostRejected`] for a non-success status, carrying
    ///   both the classification and the raw wire code.
    /// - [`ChatError::PostTimeout`] when no result arrives in time.
    /// - [`ChatError::ConnectionClosed`] when the socket dies mid-wait.
    pub async fn post_comment(&self, text: &str, options: PostOptions) -> Result<(), ChatError> {
        let session = self.session()?;

        if text.chars().all(char::is_whitespace) {
            return Err(ChatError::EmptyComment);
        }
        {
            let io = self.shared.io.lock().await;
            if io.writer.is_none() {
                return Err(ChatError::NotConnected);
            }
        }

        let command = options.command.join(" ");

        // The previous key is spent; every post needs a fresh one.
        let thread = session.thread();
        let post_key = self.post_key_source.fetch_post_key(&thread).await?;

        // Write the fresh key and the thread id into the shared slot, then
        // build the frame from the slot – the single-writer race under
        // concurrent posts lives exactly here.
        let frame = {
            let mut credentials = self
                .shared
                .credentials
                .lock()
                .expect("credentials lock poisoned");
            credentials.post_key = Some(post_key);
            credentials.thread = Some(thread);
            post_frame(&PostFrame {
                thread: credentials.thread.as_deref().unwrap_or(""),
                ticket: credentials.ticket.as_deref().unwrap_or(""),
                post_key: credentials.post_key.as_deref().unwrap_or(""),
                command: &command,
                user_id: session.user_id,
                premium: session.is_premium,
                body: text,
            })
        };

        // Subscribe before writing so the result cannot slip past.
        let mut events = self.shared.bus.subscribe();

        {
            let mut io = self.shared.io.lock().await;
            let writer = io.writer.as_mut().ok_or(ChatError::NotConnected)?;
            if let Err(e) = write_frame(writer, &frame).await {
                self.shared
                    .bus
                    .publish(ChatEvent::SocketError(e.to_string()));
                return Err(ChatError::Socket(e));
            }
        }

        // Race the next post result against the timer; whichever side
        // finishes first drops the other.
        let wait_for_result = async {
            loop {
                match events.recv().await {
                    Ok(ChatEvent::PostResult { status, .. }) => return Ok(status),
                    Ok(ChatEvent::ConnectionClosed) => return Err(ChatError::ConnectionClosed),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return Err(ChatError::ConnectionClosed),
                }
            }
        };

        match timeout(options.timeout, wait_for_result).await {
            Err(_) => Err(ChatError::PostTimeout),
            Ok(Err(e)) => Err(e),
            Ok(Ok(code)) => {
                let status = PostStatus::from_code(code);
                if status.is_success() {
                    Ok(())
                } else {
                    Err(ChatError::PostRejected { status, code })
                }
            }
        }
    }

    /// Test hook: feeds one frame of text through the decode-and-dispatch
    /// path as if the socket had received it.
    #[doc(hidden)]
    pub async fn pour_frame(&self, frame: &str) -> Result<(), ChatError> {
        let session = self.session()?;
        let mut batch = Vec::new();
        let mut ended = false;
        match parse_frame(frame) {
            Ok(events) => {
                for event in events {
                    if handle_server_event(&self.shared, &session, event, &mut batch) {
                        ended = true;
                    }
                }
            }
            Err(e) => warn!(error = %e, "dropping undecodable frame"),
        }
        if ended {
            self.teardown().await;
        }
        Ok(())
    }

    /// Tears down the socket if one exists and publishes the close event.
    /// Returns whether there was anything to tear down.
    async fn teardown(&self) -> bool {
        let mut io = self.shared.io.lock().await;
        let had_socket = io.writer.is_some() || io.reader.is_some();
        if let Some(reader) = io.reader.take() {
            reader.abort();
        }
        io.writer = None;
        drop(io);

        self.shared.set_state(ConnectionState::Disconnected);
        if had_socket {
            self.shared.bus.publish(ChatEvent::ConnectionClosed);
        }
        had_socket
    }
}

// ── Read task ─────────────────────────────────────────────────────────────────

/// Drives one connection's inbound stream until close, error, or broadcast
/// end.  A TCP read may deliver a partial frame or several frames at once;
/// the splitter buffers across reads and yields complete frames only.
async fn read_loop(mut read_half: OwnedReadHalf, shared: Arc<Shared>, session: Arc<LiveSession>) {
    let mut splitter = FrameSplitter::new();
    let mut chunk = vec![0u8; 4096];
    let mut first_response_pending = true;

    loop {
        match read_half.read(&mut chunk).await {
            Ok(0) => {
                debug!("comment server closed the connection");
                close_from_reader(&shared).await;
                return;
            }
            Ok(n) => {
                let data = &chunk[..n];
                shared
                    .bus
                    .publish(ChatEvent::RawData(String::from_utf8_lossy(data).into_owned()));

                let mut batch = Vec::new();
                let mut saw_frame = false;
                let mut end_of_broadcast = false;
                for frame in splitter.push(data) {
                    saw_frame = true;
                    match parse_frame(&frame) {
                        Ok(events) => {
                            for event in events {
                                if handle_server_event(&shared, &session, event, &mut batch) {
                                    end_of_broadcast = true;
                                }
                            }
                        }
                        Err(e) => warn!(error = %e, "dropping undecodable frame"),
                    }
                }

                if first_response_pending && saw_frame {
                    first_response_pending = false;
                    shared.bus.publish(ChatEvent::FirstResponseProcessed(batch));
                }

                if end_of_broadcast {
                    close_from_reader(&shared).await;
                    return;
                }
            }
            Err(e) => {
                shared
                    .bus
                    .publish(ChatEvent::SocketError(e.to_string()));
                close_from_reader(&shared).await;
                return;
            }
        }
    }
}

/// Dispatches one decoded server event.  Returns `true` when the event
/// signalled the end of the broadcast and the connection should close.
fn handle_server_event(
    shared: &Shared,
    session: &LiveSession,
    event: ServerEvent,
    batch: &mut Vec<Comment>,
) -> bool {
    match event {
        ServerEvent::Thread { ticket } => {
            {
                let mut credentials = shared
                    .credentials
                    .lock()
                    .expect("credentials lock poisoned");
                credentials.ticket = ticket;
            }
            if !shared.connected_announced.swap(true, Ordering::SeqCst) {
                shared.set_state(ConnectionState::Connected);
                shared.bus.publish(ChatEvent::Connected);
            }
            false
        }
        ServerEvent::Chat(element) => {
            let comment = Comment::from_element(&element, session.user_id);
            batch.push(comment.clone());
            shared
                .bus
                .publish(ChatEvent::CommentReceived(comment.clone()));

            if comment.is_from_distributor() && comment.text == "/disconnect" {
                shared.bus.publish(ChatEvent::BroadcastEnded);
                return true;
            }
            false
        }
        ServerEvent::ChatResult { status, chat } => {
            let comment = chat.map(|element| Comment::from_element(&element, session.user_id));
            shared.bus.publish(ChatEvent::PostResult {
                status,
                comment: comment.clone(),
            });
            // The echoed comment is a received comment too.
            if let Some(comment) = comment {
                shared.bus.publish(ChatEvent::CommentReceived(comment));
            }
            false
        }
    }
}

/// Close path driven from inside the read task (EOF, error, broadcast end).
async fn close_from_reader(shared: &Shared) {
    shared.set_state(ConnectionState::Disconnected);
    shared.bus.publish(ChatEvent::ConnectionClosed);

    let mut io = shared.io.lock().await;
    io.writer = None;
    // Dropping our own join handle detaches the task; it returns right after.
    io.reader = None;
}

async fn write_frame(writer: &mut OwnedWriteHalf, frame: &str) -> std::io::Result<()> {
    let mut bytes = Vec::with_capacity(frame.len() + 1);
    bytes.extend_from_slice(frame.as_bytes());
    bytes.push(FRAME_DELIMITER);
    writer.write_all(&bytes).await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
