//! Periodic refresh driver.
//!
//! Re-evaluates every tracked symbol on a fixed interval until stopped. A stop
//! request lets the in-flight cycle finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::services::Engine;
use crate::types::normalize_symbol;

pub struct Poller {
    engine: Arc<Engine>,
    symbols: Vec<String>,
    period: Duration,
    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,
    running: RwLock<bool>,
    /// Set by `stop` so a loop that has not subscribed yet still exits.
    stop_requested: AtomicBool,
}

impl Poller {
    pub fn new(engine: Arc<Engine>, symbols: Vec<String>, period: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let symbols = symbols.into_iter().map(|s| normalize_symbol(&s)).collect();

        Self {
            engine,
            symbols,
            period,
            shutdown_tx,
            running: RwLock::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        *self.running.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn symbols(&self) -> Vec<String> {
        self.symbols.clone()
    }

    /// Run the loop until [`Poller::stop`] is called.
    ///
    /// A stop requested before the loop starts is honored: the loop returns
    /// without running a cycle.
    pub async fn start(&self) {
        let mut shutdown_rx = {
            let mut running = self.running.write().unwrap_or_else(|p| p.into_inner());
            if *running {
                return;
            }
            let rx = self.shutdown_tx.subscribe();
            if self.stop_requested.swap(false, Ordering::SeqCst) {
                info!("Poller stopped before start");
                return;
            }
            *running = true;
            rx
        };

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "Poller started: {} symbols every {}s",
            self.symbols.len(),
            self.period.as_secs()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Poller received shutdown signal");
                    break;
                }
            }
        }

        let mut running = self.running.write().unwrap_or_else(|p| p.into_inner());
        *running = false;
        self.stop_requested.store(false, Ordering::SeqCst);
    }

    /// Request shutdown. The current cycle, if any, completes first.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        // No receiver yet means `start` has not subscribed; the flag covers it.
        let _ = self.shutdown_tx.send(());
        info!("Poller stopping");
    }

    /// Run one refresh cycle over all symbols.
    pub async fn tick(&self) -> usize {
        let signals = self.engine.refresh_all(&self.symbols).await;
        debug!("Refreshed {}/{} symbols", signals.len(), self.symbols.len());
        signals.len()
    }
}
