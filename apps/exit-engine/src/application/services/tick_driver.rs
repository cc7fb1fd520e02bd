//! Tick Driver Service
//!
//! Background worker that feeds price ticks into [`ProcessTickUseCase`] one
//! at a time. Ticks submitted while a tick is in flight are queued according
//! to [`TickQueuePolicy`]; reports are broadcast to subscribers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ExitDispatcherPort, PositionRepositoryPort};
use crate::application::use_cases::{ProcessTickUseCase, TickReport};
use crate::config::{EngineConfig, TickQueuePolicy};
use crate::domain::exit_management::value_objects::PriceTick;

/// Tick driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickDriverConfig {
    /// Backpressure policy.
    pub policy: TickQueuePolicy,
    /// Queue bound for [`TickQueuePolicy::DropOldest`].
    pub capacity: usize,
    /// Report broadcast buffer.
    pub report_buffer: usize,
}

impl Default for TickDriverConfig {
    fn default() -> Self {
        Self {
            policy: TickQueuePolicy::CoalesceLatest,
            capacity: 64,
            report_buffer: 64,
        }
    }
}

impl From<&EngineConfig> for TickDriverConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            policy: config.tick_queue,
            capacity: config.tick_queue_capacity,
            ..Self::default()
        }
    }
}

/// Tick driver errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TickDriverError {
    /// The worker has stopped.
    #[error("tick driver is stopped")]
    Stopped,
}

enum TickSender {
    Coalesce(watch::Sender<Option<PriceTick>>),
    DropOldest(broadcast::Sender<PriceTick>),
}

enum TickSource {
    Coalesce(watch::Receiver<Option<PriceTick>>),
    DropOldest {
        rx: broadcast::Receiver<PriceTick>,
        dropped: Arc<AtomicU64>,
    },
}

impl TickSource {
    async fn next(&mut self) -> Option<PriceTick> {
        match self {
            Self::Coalesce(rx) => loop {
                rx.changed().await.ok()?;
                if let Some(tick) = *rx.borrow_and_update() {
                    return Some(tick);
                }
            },
            // A full ring overwrites its oldest ticks; the receiver learns
            // how many it missed on the next recv.
            Self::DropOldest { rx, dropped } => loop {
                match rx.recv().await {
                    Ok(tick) => return Some(tick),
                    Err(RecvError::Lagged(n)) => {
                        dropped.fetch_add(n, Ordering::Relaxed);
                        tracing::debug!(dropped = n, "Tick queue full, dropped oldest ticks");
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
        }
    }
}

/// Handle to the background tick worker.
pub struct TickDriver {
    sender: TickSender,
    reports: broadcast::Sender<TickReport>,
    shutdown: CancellationToken,
    dropped: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl TickDriver {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// The worker stops when `shutdown` is cancelled or the driver is shut down.
    pub fn spawn<R, D>(
        use_case: Arc<ProcessTickUseCase<R, D>>,
        config: TickDriverConfig,
        shutdown: CancellationToken,
    ) -> Self
    where
        R: PositionRepositoryPort + 'static,
        D: ExitDispatcherPort + 'static,
    {
        let (reports, _) = broadcast::channel(config.report_buffer.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let (sender, source) = match config.policy {
            TickQueuePolicy::CoalesceLatest => {
                let (tx, rx) = watch::channel(None);
                (TickSender::Coalesce(tx), TickSource::Coalesce(rx))
            }
            TickQueuePolicy::DropOldest => {
                let (tx, rx) = broadcast::channel(config.capacity.max(1));
                let source = TickSource::DropOldest {
                    rx,
                    dropped: Arc::clone(&dropped),
                };
                (TickSender::DropOldest(tx), source)
            }
        };

        let handle = tokio::spawn(run_worker(
            use_case,
            source,
            reports.clone(),
            shutdown.clone(),
        ));

        tracing::info!(policy = ?config.policy, capacity = config.capacity, "Tick driver started");

        Self {
            sender,
            reports,
            shutdown,
            dropped,
            handle,
        }
    }

    /// Submit a tick without waiting for it to be processed.
    ///
    /// # Errors
    ///
    /// Returns `TickDriverError::Stopped` once the worker has shut down.
    pub fn submit(&self, tick: PriceTick) -> Result<(), TickDriverError> {
        if self.shutdown.is_cancelled() {
            return Err(TickDriverError::Stopped);
        }
        match &self.sender {
            TickSender::Coalesce(tx) => {
                // Replaces any tick the worker has not picked up yet.
                tx.send(Some(tick)).map_err(|_| TickDriverError::Stopped)?;
            }
            TickSender::DropOldest(tx) => {
                tx.send(tick).map_err(|_| TickDriverError::Stopped)?;
            }
        }
        Ok(())
    }

    /// Subscribe to tick reports.
    #[must_use]
    pub fn reports(&self) -> broadcast::Receiver<TickReport> {
        self.reports.subscribe()
    }

    /// Ticks the worker never saw because the drop-oldest queue overflowed.
    #[must_use]
    pub fn dropped_ticks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the worker task has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// A tick already being processed runs to completion.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Tick driver task ended abnormally");
        }
    }
}

async fn run_worker<R, D>(
    use_case: Arc<ProcessTickUseCase<R, D>>,
    mut source: TickSource,
    reports: broadcast::Sender<TickReport>,
    shutdown: CancellationToken,
) where
    R: PositionRepositoryPort + 'static,
    D: ExitDispatcherPort + 'static,
{
    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::info!("Tick driver shutting down");
                break;
            }
            next = source.next() => {
                let Some(tick) = next else {
                    tracing::info!("Tick source closed");
                    break;
                };
                match use_case.execute(tick).await {
                    Ok(report) => {
                        let _ = reports.send(report);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, price = %tick.price, "Tick processing failed");
                    }
                }
            }
        }
    }
}
