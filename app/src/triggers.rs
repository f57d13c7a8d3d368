//! Merged trigger stream driving the ordering core.
//!
//! Two event sources feed a single subscriber: arrival signals produced by
//! the inbound transport after each successful enqueue, and deadline ticks
//! from a periodic timer. No ordering is guaranteed between the sources; the
//! subscriber tolerates any interleaving.
//!
//! The dispatch mode chooses where the subscriber runs. In decoupled mode a
//! dedicated worker owns the handler and events are handed off through a
//! channel. In cooperative mode the handler sits behind a mutex and runs on
//! whichever task delivered the event, so inbound handlers pay the cost of
//! emission synchronously. Both modes serialize the handler, which is what
//! keeps at most one emission in flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub use citrine_cli::config::DispatchMode;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// A transaction has been enqueued.
    Arrival,
    /// The configured deadline cadence elapsed.
    Deadline,
}

/// Single subscriber of the merged stream.
#[async_trait]
pub trait TriggerHandler: Send + 'static {
    async fn handle_trigger(&mut self, trigger: Trigger);
}

/// Producer-side handle used by the transport to signal arrivals.
#[derive(Clone)]
pub struct TriggerNotifier {
    inner: NotifierInner,
}

#[derive(Clone)]
enum NotifierInner {
    Inline(Arc<Mutex<dyn TriggerHandler>>),
    Channel(mpsc::UnboundedSender<Trigger>),
}

impl TriggerNotifier {
    /// Signals that a transaction has been successfully enqueued.
    ///
    /// In cooperative mode this runs the emission check (and possibly a full
    /// emission) before returning; in decoupled mode it returns immediately.
    pub async fn arrival(&self) {
        match &self.inner {
            NotifierInner::Inline(handler) => {
                handler.lock().await.handle_trigger(Trigger::Arrival).await;
            }
            NotifierInner::Channel(tx) => {
                // The worker is gone during shutdown; arrivals are dropped
                // together with the subscription.
                let _ = tx.send(Trigger::Arrival);
            }
        }
    }
}

/// Running trigger subscription: the timer task plus, in decoupled mode, the
/// worker that owns the handler.
pub struct TriggerStream {
    notifier: TriggerNotifier,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl TriggerStream {
    pub fn start<H: TriggerHandler>(
        handler: H,
        deadline_interval: Duration,
        mode: DispatchMode,
    ) -> Self {
        let cancel = CancellationToken::new();

        match mode {
            DispatchMode::Decoupled => {
                let (tx, rx) = mpsc::unbounded_channel();
                let worker = tokio::spawn(run_worker(
                    handler,
                    rx,
                    deadline_interval,
                    cancel.clone(),
                ));

                Self {
                    notifier: TriggerNotifier {
                        inner: NotifierInner::Channel(tx),
                    },
                    cancel,
                    tasks: vec![worker],
                }
            }
            DispatchMode::Cooperative => {
                let handler: Arc<Mutex<dyn TriggerHandler>> = Arc::new(Mutex::new(handler));
                let timer = tokio::spawn(run_timer(
                    Arc::clone(&handler),
                    deadline_interval,
                    cancel.clone(),
                ));

                Self {
                    notifier: TriggerNotifier {
                        inner: NotifierInner::Inline(handler),
                    },
                    cancel,
                    tasks: vec![timer],
                }
            }
        }
    }

    pub fn notifier(&self) -> TriggerNotifier {
        self.notifier.clone()
    }

    /// Releases the subscription. No new events are dispatched afterwards;
    /// an emission already in progress completes first.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        for task in self.tasks {
            let _ = task.await;
        }
    }
}

fn deadline_ticker(deadline_interval: Duration) -> tokio::time::Interval {
    // interval() fires immediately; the first deadline belongs one full
    // period after startup.
    let start = tokio::time::Instant::now() + deadline_interval;
    let mut ticker = tokio::time::interval_at(start, deadline_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run_worker<H: TriggerHandler>(
    mut handler: H,
    mut rx: mpsc::UnboundedReceiver<Trigger>,
    deadline_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = deadline_ticker(deadline_interval);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => handler.handle_trigger(Trigger::Deadline).await,
            trigger = rx.recv() => match trigger {
                Some(trigger) => handler.handle_trigger(trigger).await,
                None => break,
            },
        }
    }
}

async fn run_timer(
    handler: Arc<Mutex<dyn TriggerHandler>>,
    deadline_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = deadline_ticker(deadline_interval);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                handler.lock().await.handle_trigger(Trigger::Deadline).await;
            }
        }
    }
}
