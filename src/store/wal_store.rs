use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
use ulid::Ulid;

use crate::limits::WAL_CHANNEL_CAPACITY;
use crate::model::*;
use crate::wal::Wal;

use super::{AvailabilityStore, BookingStore, InMemoryStore, StoreError, StoreResult, StoreStats};

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append(PendingAppend),
    Control(Control),
}

/// Commands that must see every earlier append already committed.
enum Control {
    /// Rewrite the log from the current state. Responds with the event count.
    Compact {
        response: oneshot::Sender<io::Result<usize>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

struct PendingAppend {
    event: Event,
    response: oneshot::Sender<io::Result<()>>,
}

/// Background task that owns the WAL and batches appends for group commit.
/// Blocks for the first command, drains whatever else is already queued,
/// then flushes the whole batch with a single fsync and applies it to
/// `state`. An append that reached this task commits even if its sender has
/// stopped waiting.
async fn wal_writer_loop(mut wal: Wal, state: Arc<InMemoryStore>, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let mut batch = match cmd {
            WalCommand::Append(append) => vec![append],
            WalCommand::Control(control) => {
                handle_control(&mut wal, &state, control);
                continue;
            }
        };
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append(append)) => batch.push(append),
                Ok(WalCommand::Control(control)) => {
                    deferred = Some(control);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        if result.is_ok() {
            for append in &batch {
                state.apply_event(&append.event);
            }
        }
        respond_batch(batch, &result);

        if let Some(control) = deferred {
            handle_control(&mut wal, &state, control);
        }
    }
}

/// Write and fsync the batch. On failure the log is cut back to where the
/// batch began, so no half-written frame sits in front of later appends.
fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let result = batch
        .iter()
        .try_for_each(|append| wal.append_buffered(&append.event))
        .and_then(|()| wal.flush_sync());
    if let Err(e) = &result {
        warn!("wal {}: batch of {} failed: {e}", wal.path().display(), batch.len());
        if let Err(rollback) = wal.rollback() {
            error!("wal {}: rollback failed: {rollback}", wal.path().display());
        }
    }
    result
}

fn respond_batch(batch: Vec<PendingAppend>, result: &io::Result<()>) {
    for append in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = append.response.send(r);
    }
}

fn handle_control(wal: &mut Wal, state: &InMemoryStore, control: Control) {
    match control {
        Control::Compact { response } => {
            let events = state.snapshot();
            let count = events.len();
            let _ = response.send(wal.compact(&events).map(|()| count));
        }
        Control::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
    }
}

/// Durable store: every mutation is appended to the WAL and fsynced before
/// the writer task applies it to the in-memory ledgers. State is rebuilt by
/// replaying the log on open.
pub struct WalStore {
    inner: Arc<InMemoryStore>,
    wal_tx: mpsc::Sender<WalCommand>,
    path: PathBuf,
}

impl WalStore {
    /// Replay the log at `path` and start its writer task. Must be called
    /// from within a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let (wal, replay) = Wal::open(path)?;
        if replay.torn_bytes > 0 {
            warn!(
                "store {}: dropped {} bytes of torn log tail",
                path.display(),
                replay.torn_bytes
            );
        }
        let inner = Arc::new(InMemoryStore::new());
        for event in &replay.events {
            inner.apply_event(event);
        }

        let (wal_tx, wal_rx) = mpsc::channel(WAL_CHANNEL_CAPACITY);
        tokio::spawn(wal_writer_loop(wal, inner.clone(), wal_rx));

        let stats = inner.stats();
        info!(
            "opened store {}: replayed {} events ({} windows, {} bookings)",
            path.display(),
            replay.events.len(),
            stats.windows,
            stats.bookings
        );

        Ok(Self {
            inner,
            wal_tx,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> StoreStats {
        self.inner.stats()
    }

    async fn send(&self, cmd: WalCommand) -> StoreResult<()> {
        self.wal_tx
            .send(cmd)
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))
    }

    /// Hand `event` to the writer and wait until it is durable and applied.
    /// Once queued, dropping this future does not stop the commit.
    async fn commit(&self, event: Event) -> StoreResult<()> {
        let (response, rx) = oneshot::channel();
        self.send(WalCommand::Append(PendingAppend { event, response })).await?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Rewrite the log with only the events needed to recreate the current state.
    pub async fn compact(&self) -> StoreResult<()> {
        let (response, rx) = oneshot::channel();
        self.send(WalCommand::Control(Control::Compact { response })).await?;
        let count = rx
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        info!("compacted {} to {count} events", self.path.display());
        Ok(())
    }

    /// Appends committed since the last compaction. Also waits for every
    /// append queued before it.
    pub async fn appends_since_compact(&self) -> u64 {
        let (response, rx) = oneshot::channel();
        if self
            .send(WalCommand::Control(Control::AppendsSinceCompact { response }))
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl AvailabilityStore for WalStore {
    async fn add_window(&self, window: NewAvailability) -> StoreResult<AvailabilityWindow> {
        let window = InMemoryStore::window_record(window);
        self.commit(Event::AvailabilityAdded(window.clone())).await?;
        Ok(window)
    }

    async fn remove_window(&self, id: Ulid) -> StoreResult<()> {
        match self.inner.window_removal(id) {
            Some(event) => self.commit(event).await,
            None => Ok(()),
        }
    }

    async fn windows_by_instructor(&self, instructor_id: &str) -> StoreResult<Vec<AvailabilityWindow>> {
        Ok(self.inner.windows_for(instructor_id))
    }

    async fn all_windows(&self) -> StoreResult<Vec<AvailabilityWindow>> {
        Ok(self.inner.every_window())
    }
}

#[async_trait]
impl BookingStore for WalStore {
    async fn add_booking(&self, booking: BookingRequest) -> StoreResult<Booking> {
        let booking = InMemoryStore::booking_record(booking);
        self.commit(Event::BookingAdmitted(booking.clone())).await?;
        Ok(booking)
    }

    async fn remove_booking(&self, id: Ulid) -> StoreResult<()> {
        match self.inner.booking_removal(id) {
            Some(event) => self.commit(event).await,
            None => Ok(()),
        }
    }

    async fn bookings_by_instructor(&self, instructor_id: &str) -> StoreResult<Vec<Booking>> {
        Ok(self.inner.bookings_for(instructor_id))
    }

    async fn bookings_by_student(&self, student_id: &str) -> StoreResult<Vec<Booking>> {
        Ok(self.inner.bookings_for_student(student_id))
    }

    async fn all_bookings(&self) -> StoreResult<Vec<Booking>> {
        Ok(self.inner.every_booking())
    }

    async fn exists_overlapping(&self, instructor_id: &str, span: Span) -> StoreResult<bool> {
        Ok(self.inner.has_overlap(instructor_id, &span))
    }
}
