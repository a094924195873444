//! The per-session protocol engine: receive loop, dispatch, send path.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{watch, Mutex};

use crate::core::{
    next_counter, FRAME_FIXED_BODY_SIZE, INITIAL_COUNTER_RANGE, UNSECURED_KEY_NUMBER,
};
use crate::keys::KeyTable;
use crate::wire::{Frame, FrameAssembler, InformationId, Message};

use super::queue::TransmitQueue;
use super::{Role, SessionConfig, SessionError};

/// Write-side state guarded by the session's single write lock.
///
/// Every send, reactive or caller-initiated, runs "compose frame, write,
/// advance counter" while holding this lock, so header fields of two sends
/// can never interleave. The peer counter also lives here because dispatch
/// updates it immediately before composing a response.
struct TxState {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    /// Send counter (TC) for the next outgoing frame.
    send_counter: u32,
    /// Mirror of the last counter observed from the peer, already advanced.
    peer_counter: u32,
    /// Key number stamped into outgoing frames.
    key_number: u16,
}

struct Shared {
    config: SessionConfig,
    keys: Arc<KeyTable>,
    tx: Mutex<TxState>,
    queue: TransmitQueue,
    shutdown: watch::Sender<bool>,

    // Lock-free mirrors backing the read-only observers. Authoritative
    // counter state lives in `TxState`; mirrors are updated while the write
    // lock is held.
    active: AtomicBool,
    terminated: AtomicBool,
    acked: AtomicBool,
    secured: AtomicBool,
    send_counter: AtomicU32,
    peer_counter: AtomicU32,
    key_number: AtomicU16,
    /// Peer-declared key length widened to u16; `u16::MAX` means "not yet
    /// learned" so a legitimate declaration of 0 stays distinguishable.
    peer_key_length: AtomicU16,
    last_poll: std::sync::Mutex<Option<Instant>>,
}

impl Shared {
    /// Terminal close sequence: best-effort transport close, then mark the
    /// session inactive. Idempotent.
    async fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(role = %self.config.role, "closing session");

        let mut tx = self.tx.lock().await;
        if let Err(e) = tx.writer.shutdown().await {
            tracing::warn!(error = %e, "transport close failed");
        }
        self.active.store(false, Ordering::SeqCst);
    }

    fn last_poll(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.last_poll.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One protocol session over a duplex byte stream.
///
/// Cloning yields another handle to the same session; handles are cheap and
/// safe to share across tasks.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Open a session over `transport` and start its receive loop.
    ///
    /// The responder takes its key number from the configuration and fails
    /// with [`SessionError::Key`] if the table has no entry for it; the
    /// initiator starts unsecured and learns its key number through the
    /// sync handshake. Must be called within a tokio runtime.
    pub fn open<T>(
        transport: T,
        config: SessionConfig,
        keys: Arc<KeyTable>,
    ) -> Result<Self, SessionError>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let key_number = match config.role {
            Role::Responder => config.key_number,
            Role::Initiator => UNSECURED_KEY_NUMBER,
        };
        if key_number != UNSECURED_KEY_NUMBER {
            keys.lookup(key_number)?;
        }

        // Counters start at a small unpredictable value, never zero.
        let initial = rand::thread_rng().gen_range(INITIAL_COUNTER_RANGE);
        tracing::info!(role = %config.role, counter = initial, "session initialized");

        let (reader, writer) = tokio::io::split(transport);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            tx: Mutex::new(TxState {
                writer: Box::new(writer),
                send_counter: initial,
                peer_counter: 0,
                key_number,
            }),
            queue: TransmitQueue::new(),
            shutdown,
            active: AtomicBool::new(true),
            terminated: AtomicBool::new(false),
            acked: AtomicBool::new(false),
            secured: AtomicBool::new(key_number != UNSECURED_KEY_NUMBER),
            send_counter: AtomicU32::new(initial),
            peer_counter: AtomicU32::new(0),
            key_number: AtomicU16::new(key_number),
            peer_key_length: AtomicU16::new(u16::MAX),
            last_poll: std::sync::Mutex::new(None),
            keys,
            config,
        });

        tokio::spawn(run_loop(Arc::clone(&shared), reader, shutdown_rx));

        Ok(Self { shared })
    }

    /// Queue a payload message for transmission on a later poll cycle.
    ///
    /// Safe to call from any task at any time. Messages are delivered at
    /// most one per poll cycle, in FIFO order, only by the initiator.
    ///
    /// A message that would not fit into one frame alongside the leading
    /// identification (under the configured body limit and the 16-bit wire
    /// length field) is rejected with [`SessionError::MessageTooLarge`]
    /// rather than corrupting the stream later.
    pub fn enqueue(&self, message: Message) -> Result<(), SessionError> {
        if !self.is_active() {
            return Err(SessionError::Closed);
        }
        if message.is_empty() {
            return Err(SessionError::InvalidArgument("message must not be empty"));
        }

        let budget = self.message_budget();
        if message.encoded_len() > budget {
            return Err(SessionError::MessageTooLarge {
                size: message.encoded_len(),
                max: budget,
            });
        }

        self.shared.queue.push(message);
        Ok(())
    }

    /// Largest encodable message that still fits a poll-answer frame.
    ///
    /// The body carries the fixed fields plus the identification message
    /// before any payload, and the declared body length is a 16-bit field.
    fn message_budget(&self) -> usize {
        let overhead = FRAME_FIXED_BODY_SIZE
            + Message::Identification(self.shared.config.device_id).encoded_len();
        self.shared
            .config
            .max_body_length
            .min(usize::from(u16::MAX))
            .saturating_sub(overhead)
    }

    /// Originate a `SyncRequest` or `PollRequestResponse` frame.
    ///
    /// Any other information id is caller misuse and reported as
    /// [`SessionError::UnsupportedRequest`]. Sync requests originate from
    /// the initiator only; a responder asking for one is rejected as
    /// [`SessionError::InvalidArgument`].
    pub async fn request(&self, id: InformationId) -> Result<(), SessionError> {
        if !self.is_active() {
            return Err(SessionError::Closed);
        }
        if id == InformationId::SyncRequest && self.shared.config.role != Role::Initiator {
            return Err(SessionError::InvalidArgument(
                "sync requests originate from the initiator",
            ));
        }

        let messages = match id {
            InformationId::SyncRequest => [Message::Sync {
                key_length: self.shared.config.local_key_length,
            }],
            InformationId::PollRequestResponse => [Message::Empty],
            other => return Err(SessionError::UnsupportedRequest(other)),
        };

        let mut tx = self.shared.tx.lock().await;
        send_frame(&self.shared, &mut tx, id, &messages).await
    }

    /// Request cancellation and run the terminal close sequence.
    ///
    /// Idempotent: closing an already-closed session only repeats the
    /// best-effort transport close check and returns.
    pub async fn close(&self) {
        let _ = self.shared.shutdown.send(true);
        self.shared.terminate().await;
    }

    /// This side's role.
    pub fn role(&self) -> Role {
        self.shared.config.role
    }

    /// True from session start until the receive loop has exited.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// True once the peer's payload acknowledged our last outgoing payload.
    pub fn is_acked(&self) -> bool {
        self.shared.acked.load(Ordering::Relaxed)
    }

    /// Whether payload frames are expected to be secured.
    pub fn is_secured(&self) -> bool {
        self.shared.secured.load(Ordering::Relaxed)
    }

    /// The key number currently stamped into outgoing frames.
    pub fn key_number(&self) -> u16 {
        self.shared.key_number.load(Ordering::Relaxed)
    }

    /// Send counter (TC) for the next outgoing frame.
    pub fn send_counter(&self) -> u32 {
        self.shared.send_counter.load(Ordering::Relaxed)
    }

    /// The last counter observed from the peer, already advanced.
    pub fn peer_send_counter(&self) -> u32 {
        self.shared.peer_counter.load(Ordering::Relaxed)
    }

    /// The peer's declared key-length parameter; `None` until the peer has
    /// declared one (a declared 0 is reported as `Some(0)`).
    pub fn peer_key_length(&self) -> Option<u8> {
        match self.shared.peer_key_length.load(Ordering::Relaxed) {
            u16::MAX => None,
            len => Some(len as u8),
        }
    }

    /// Number of queued payload messages awaiting a poll cycle.
    pub fn queue_depth(&self) -> usize {
        self.shared.queue.len()
    }

    /// When the last poll frame was received, for caller-side liveness.
    pub fn last_poll_received(&self) -> Option<Instant> {
        *self.shared.last_poll()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.shared.config.role)
            .field("active", &self.is_active())
            .field("key_number", &self.key_number())
            .field("queue_depth", &self.queue_depth())
            .finish()
    }
}

/// The per-session worker: read, reassemble, dispatch, until cancellation
/// or an unrecoverable transport condition.
async fn run_loop<R>(shared: Arc<Shared>, mut reader: R, mut shutdown: watch::Receiver<bool>)
where
    R: AsyncRead + Send + Unpin,
{
    let mut assembler = FrameAssembler::with_max_body_length(shared.config.max_body_length);
    let mut scratch = vec![0u8; shared.config.recv_buffer_size];

    'session: loop {
        let read = tokio::select! {
            _ = shutdown.changed() => break 'session,
            read = reader.read(&mut scratch) => read,
        };

        let n = match read {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "transport read failed");
                break 'session;
            }
        };

        if n == 0 {
            // No data yet; bounded wait, then retry.
            tokio::select! {
                _ = shutdown.changed() => break 'session,
                _ = tokio::time::sleep(shared.config.empty_read_delay) => continue 'session,
            }
        }

        let frames = match assembler.feed(&scratch[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                // Oversized or undersized declared lengths leave no safe
                // resynchronization point in a length-driven stream.
                tracing::error!(error = %e, "fatal framing violation");
                break 'session;
            }
        };

        for frame in frames {
            if let Err(e) = dispatch(&shared, frame).await {
                tracing::error!(error = %e, "transport write failed");
                break 'session;
            }
        }
    }

    shared.terminate().await;
}

/// Handle one complete received frame.
///
/// Only transport write failures propagate; malformed peer input is logged
/// and discarded without tearing the session down.
async fn dispatch(shared: &Shared, frame: Frame) -> Result<(), SessionError> {
    tracing::debug!(role = %shared.config.role, frame = %frame, "frame received");

    let mut tx = shared.tx.lock().await;
    tx.peer_counter = next_counter(frame.send_counter);
    shared.peer_counter.store(tx.peer_counter, Ordering::Relaxed);

    match frame.kind() {
        Some(InformationId::SyncRequest) => {
            if shared.config.role != Role::Responder {
                tracing::warn!("sync request ignored by initiator");
                return Ok(());
            }
            let Some(messages) = decode_payload(&frame) else {
                return Ok(());
            };
            record_peer_key_length(shared, &messages);

            let sync = Message::Sync {
                key_length: shared.config.local_key_length,
            };
            send_frame(shared, &mut tx, InformationId::SyncResponse, &[sync]).await?;
        }

        Some(InformationId::SyncResponse) => {
            if shared.config.role != Role::Initiator {
                tracing::warn!("sync response ignored by responder");
                return Ok(());
            }
            let Some(messages) = decode_payload(&frame) else {
                return Ok(());
            };
            record_peer_key_length(shared, &messages);

            tx.key_number = frame.key_number;
            let secured = frame.key_number != UNSECURED_KEY_NUMBER;
            shared.key_number.store(tx.key_number, Ordering::Relaxed);
            shared.secured.store(secured, Ordering::Relaxed);
            if secured && !shared.keys.contains(frame.key_number) {
                // Wire state has to follow the peer; the missing entry will
                // surface as soon as the key is needed.
                tracing::error!(
                    key_number = frame.key_number,
                    "sync response names a key absent from the key table"
                );
            }
            tracing::info!(key_number = frame.key_number, "adopted key number from sync response");
        }

        Some(InformationId::PollRequestResponse) => {
            *shared.last_poll() = Some(Instant::now());
            if shared.config.role != Role::Initiator {
                // Payload attachment is the initiator's job; the responder
                // only records the heartbeat.
                return Ok(());
            }

            // Identification always leads the answer; at most one queued
            // payload message rides along per cycle.
            let mut out = vec![Message::Identification(shared.config.device_id)];
            if let Some(message) = shared.queue.pop() {
                out.push(message);
                shared.acked.store(false, Ordering::Relaxed);
                send_frame(shared, &mut tx, InformationId::Payload, &out).await?;
            } else {
                send_frame(shared, &mut tx, InformationId::PollRequestResponse, &out).await?;
            }
        }

        Some(InformationId::Payload) => {
            // Any payload from the peer acknowledges our last outgoing
            // payload; there is no per-message correlation on the wire.
            shared.acked.store(true, Ordering::Relaxed);

            let ident = Message::Identification(shared.config.device_id);
            send_frame(shared, &mut tx, InformationId::PollRequestResponse, &[ident]).await?;
        }

        Some(InformationId::ErrorUnknownInformationId) => {
            tracing::warn!("peer reported an unknown information id");
        }

        Some(InformationId::ErrorUnknownProtocolId) => {
            tracing::warn!("peer reported an unknown protocol id");
        }

        None => {
            tracing::warn!(id = frame.information_id, "invalid information id ignored");
        }
    }

    Ok(())
}

/// Decode a frame's logical messages, discarding the frame on failure.
fn decode_payload(frame: &Frame) -> Option<Vec<Message>> {
    match Message::decode_all(&frame.payload) {
        Ok(messages) => Some(messages),
        Err(e) => {
            tracing::warn!(error = %e, frame = %frame, "malformed frame discarded");
            None
        }
    }
}

fn record_peer_key_length(shared: &Shared, messages: &[Message]) {
    for message in messages {
        if let Message::Sync { key_length } = message {
            shared
                .peer_key_length
                .store(u16::from(*key_length), Ordering::Relaxed);
        }
    }
}

/// Compose, write and account for one outgoing frame.
///
/// The send counter advances only after the transport write succeeded, so a
/// failed write never burns a counter value.
async fn send_frame(
    shared: &Shared,
    tx: &mut TxState,
    id: InformationId,
    messages: &[Message],
) -> Result<(), SessionError> {
    let frame = Frame::new(
        tx.send_counter,
        tx.peer_counter,
        tx.key_number,
        id,
        Message::encode_all(messages),
    );
    tracing::debug!(role = %shared.config.role, frame = %frame, "frame sent");

    tx.writer.write_all(&frame.serialize()).await?;
    tx.writer.flush().await?;

    tx.send_counter = next_counter(tx.send_counter);
    shared.send_counter.store(tx.send_counter, Ordering::Relaxed);
    Ok(())
}
