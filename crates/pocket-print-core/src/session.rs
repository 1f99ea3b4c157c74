//! Print session controller.
//!
//! A session starts with the first byte received while idle and ends when
//! no byte has arrived for the idle timeout, or when the transport
//! disconnects. Bytes are decoded on a separate task as they arrive; on
//! finalization the task is told the stream has ended and its accumulated
//! parts become one image.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::artifact::PrintedImage;
use crate::encoder::{PngBackend, PngOptions};
use crate::protocol::{self, ByteSink, ByteSource, ChecksumPolicy, PacketFramer};
use crate::raster::Compositor;
use crate::Error;

/// Default idle time that ends a print job.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub idle_timeout: Duration,
    pub checksum_policy: ChecksumPolicy,
    pub png: PngOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            checksum_policy: ChecksumPolicy::default(),
            png: PngOptions::default(),
        }
    }
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No bytes received since the last flush.
    Idle,
    /// Bytes arriving, parts accumulating.
    Receiving,
    /// Stream ended, waiting for the decoder.
    Finalizing,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Receiving => write!(f, "receiving"),
            SessionState::Finalizing => write!(f, "finalizing"),
        }
    }
}

/// Result of one finalized session.
#[derive(Debug)]
pub enum SessionOutcome {
    /// At least one part was printed.
    Image(PrintedImage),
    /// No Print command, or nothing to draw.
    Empty,
    /// Session aborted; nothing is emitted.
    Failed(Error),
}

/// Events delivered by the transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// Bytes received, in arrival order.
    Data(Vec<u8>),
    /// Link dropped.
    Disconnected,
}

/// Cloneable handle the transport uses to feed a running controller.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportHandle {
    /// Delivers received bytes. Returns false once the controller has stopped.
    pub fn deliver(&self, bytes: Vec<u8>) -> bool {
        self.tx.send(TransportEvent::Data(bytes)).is_ok()
    }

    /// Reports that the link dropped, finalizing the current session.
    pub fn disconnect(&self) -> bool {
        self.tx.send(TransportEvent::Disconnected).is_ok()
    }

    /// Returns true if the controller has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Debounce timer: rescheduled on every byte arrival.
#[derive(Debug, Clone)]
pub struct IdleTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl IdleTimer {
    /// Creates a disarmed timer.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Cancels any pending deadline and schedules a new one.
    pub fn reset(&mut self) {
        self.deadline = Some(Instant::now() + self.interval);
    }

    /// Disarms the timer.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Returns the pending deadline, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the debounce interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Completes at `deadline`, or never if there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// What the decode task hands back.
#[derive(Debug)]
struct DecodeReport {
    compositor: Compositor,
    accepted: usize,
    skipped: usize,
    error: Option<Error>,
}

async fn run_decoder(mut source: ByteSource, policy: ChecksumPolicy, resync: bool) -> DecodeReport {
    let mut framer = if resync {
        PacketFramer::resyncing(policy)
    } else {
        PacketFramer::new(policy)
    };
    let mut compositor = Compositor::new();

    let error = loop {
        match framer.next_packet(&mut source).await {
            Ok(Some(packet)) => compositor.apply(&packet),
            Ok(None) => break None,
            Err(e) => break Some(e),
        }
    };

    DecodeReport {
        compositor,
        accepted: framer.accepted(),
        skipped: framer.skipped(),
        error,
    }
}

/// In-flight session.
struct ActiveSession {
    sink: ByteSink,
    decoder: JoinHandle<DecodeReport>,
    bytes: usize,
}

/// Drives one transport's byte stream through the decoder, one session at
/// a time.
pub struct SessionController {
    config: SessionConfig,
    backend: Arc<dyn PngBackend>,
    timer: IdleTimer,
    state: SessionState,
    active: Option<ActiveSession>,
    completed: u64,
}

impl SessionController {
    /// Creates an idle controller.
    pub fn new(config: SessionConfig) -> Self {
        let backend = config.png.build();
        Self::with_backend(config, backend)
    }

    /// Creates an idle controller with a custom PNG backend.
    pub fn with_backend(config: SessionConfig, backend: Arc<dyn PngBackend>) -> Self {
        Self {
            timer: IdleTimer::new(config.idle_timeout),
            config,
            backend,
            state: SessionState::Idle,
            active: None,
            completed: 0,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of sessions finalized so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Returns when the current session will time out, if one is open.
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Feeds received bytes, opening a session if idle and restarting the
    /// idle timer. Must be called from within a Tokio runtime.
    ///
    /// If the open session's decoder already stopped on a fatal error, that
    /// session is finalized first and its outcome returned; the bytes then
    /// open a new session that skips ahead to the next packet.
    pub async fn feed(&mut self, bytes: Vec<u8>) -> Option<SessionOutcome> {
        if bytes.is_empty() {
            return None;
        }

        let mut bytes = bytes;
        let mut closed = None;
        loop {
            if self.active.is_none() {
                self.open(closed.is_some());
            }
            let Some(session) = self.active.as_mut() else {
                return closed;
            };

            let len = bytes.len();
            if !session.decoder.is_finished() {
                match session.sink.try_push(bytes) {
                    Ok(()) => {
                        session.bytes += len;
                        self.timer.reset();
                        return closed;
                    }
                    Err(rejected) => bytes = rejected,
                }
            }

            if closed.is_some() {
                warn!("Decoder stopped immediately, dropping {} bytes", len);
                return closed;
            }
            closed = self.finalize().await;
        }
    }

    fn open(&mut self, resync: bool) {
        let (sink, source) = protocol::channel();
        let decoder = tokio::spawn(run_decoder(source, self.config.checksum_policy, resync));
        debug!("Session {} started", self.completed + 1);
        self.state = SessionState::Receiving;
        self.active = Some(ActiveSession {
            sink,
            decoder,
            bytes: 0,
        });
    }

    /// Ends the current session and waits for its outcome.
    ///
    /// Returns `None` if no session was open.
    pub async fn finalize(&mut self) -> Option<SessionOutcome> {
        let session = self.active.take()?;
        self.state = SessionState::Finalizing;
        self.timer.cancel();

        session.sink.end();
        let outcome = match session.decoder.await {
            Ok(report) => self.conclude(report, session.bytes),
            Err(e) => SessionOutcome::Failed(Error::DecodeTask(e.to_string())),
        };

        self.completed += 1;
        self.state = SessionState::Idle;
        Some(outcome)
    }

    fn conclude(&self, report: DecodeReport, bytes: usize) -> SessionOutcome {
        let session = self.completed + 1;
        match report.error {
            Some(e) if e.is_fatal() => {
                warn!("Session {} aborted after {} bytes: {}", session, bytes, e);
                return SessionOutcome::Failed(e);
            }
            Some(e) => warn!(
                "Session {} ended mid-packet, keeping {} parts: {}",
                session,
                report.compositor.parts().len(),
                e
            ),
            None => {}
        }

        let parts = report.compositor.parts().len();
        let Some(raster) = report.compositor.render() else {
            debug!(
                "Session {}: {} bytes, {} packets, no image",
                session, bytes, report.accepted
            );
            return SessionOutcome::Empty;
        };

        info!(
            "Session {}: {} bytes, {} packets ({} skipped), {} parts, {}x{}",
            session,
            bytes,
            report.accepted,
            report.skipped,
            parts,
            raster.width(),
            raster.height()
        );

        match self
            .backend
            .encode(raster.data(), raster.width(), raster.height())
        {
            Ok(png) => {
                SessionOutcome::Image(PrintedImage::new(png, raster.width(), raster.height()))
            }
            Err(e) => {
                warn!("Session {}: {} encoding failed: {}", session, self.backend.name(), e);
                SessionOutcome::Failed(e)
            }
        }
    }

    /// Processes transport events until every [`TransportHandle`] is
    /// dropped, calling `on_image` once per finalized, non-empty session.
    pub async fn run<F>(mut self, mut events: mpsc::UnboundedReceiver<TransportEvent>, mut on_image: F)
    where
        F: FnMut(PrintedImage),
    {
        loop {
            let deadline = self.timer.deadline();
            tokio::select! {
                biased;

                event = events.recv() => match event {
                    Some(TransportEvent::Data(bytes)) => {
                        if let Some(outcome) = self.feed(bytes).await {
                            report(outcome, &mut on_image);
                        }
                    }
                    Some(TransportEvent::Disconnected) => {
                        debug!("Transport disconnected");
                        self.flush(&mut on_image).await;
                    }
                    None => {
                        self.flush(&mut on_image).await;
                        break;
                    }
                },
                _ = sleep_until(deadline), if deadline.is_some() => {
                    debug!("Idle for {:?}, finalizing", self.timer.interval());
                    self.flush(&mut on_image).await;
                }
            }
        }
    }

    async fn flush<F>(&mut self, on_image: &mut F)
    where
        F: FnMut(PrintedImage),
    {
        if let Some(outcome) = self.finalize().await {
            report(outcome, on_image);
        }
    }

    /// Spawns the controller on the runtime and returns the transport handle.
    pub fn spawn<F>(self, on_image: F) -> (TransportHandle, JoinHandle<()>)
    where
        F: FnMut(PrintedImage) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx, on_image));
        (TransportHandle { tx }, task)
    }
}

fn report<F>(outcome: SessionOutcome, on_image: &mut F)
where
    F: FnMut(PrintedImage),
{
    match outcome {
        SessionOutcome::Image(image) => on_image(image),
        SessionOutcome::Empty => {}
        SessionOutcome::Failed(e) => warn!("Print discarded: {}", e),
    }
}

/// Starts a controller with `config`, invoking `on_image` for every print.
pub fn start_session<F>(config: SessionConfig, on_image: F) -> (TransportHandle, JoinHandle<()>)
where
    F: FnMut(PrintedImage) + Send + 'static,
{
    SessionController::new(config).spawn(on_image)
}

/// Decodes a complete byte capture as a single session.
pub async fn decode_capture(bytes: &[u8], config: &SessionConfig) -> SessionOutcome {
    let mut controller = SessionController::new(config.clone());
    controller.feed(bytes.to_vec()).await;
    controller
        .finalize()
        .await
        .unwrap_or(SessionOutcome::Empty)
}
