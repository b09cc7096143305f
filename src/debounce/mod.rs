//! Input debouncing for search boxes.
//!
//! Raw keystrokes are pushed through a [`DebounceHandle`]; a background task
//! emits the latest value once no new value has arrived for a full window.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

/// Default quiescence window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(500);

/// Sending side of a debouncer. Dropping every handle stops the task.
#[derive(Debug, Clone)]
pub struct DebounceHandle {
    tx: mpsc::UnboundedSender<String>,
}

impl DebounceHandle {
    /// Record a new raw value, restarting the window.
    ///
    /// Returns false once the debouncer task has stopped.
    pub fn push(&self, value: impl Into<String>) -> bool {
        self.tx.send(value.into()).is_ok()
    }
}

/// Debouncer task spawner.
pub struct Debouncer;

impl Debouncer {
    /// Spawn a debouncer on the current runtime.
    ///
    /// `initial` counts as already emitted: settling back onto it emits nothing.
    pub fn spawn(
        window: Duration,
        initial: impl Into<String>,
    ) -> (DebounceHandle, mpsc::UnboundedReceiver<String>) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();

        tokio::spawn(run(window, initial.into(), input_rx, settled_tx));

        (DebounceHandle { tx: input_tx }, settled_rx)
    }
}

async fn run(
    window: Duration,
    mut last_emitted: String,
    mut input: mpsc::UnboundedReceiver<String>,
    settled: mpsc::UnboundedSender<String>,
) {
    while let Some(mut pending) = input.recv().await {
        loop {
            tokio::select! {
                next = input.recv() => match next {
                    Some(value) => pending = value,
                    None => return,
                },
                _ = sleep(window) => break,
            }
        }

        if pending == last_emitted {
            continue;
        }
        if settled.send(pending.clone()).is_err() {
            return;
        }
        last_emitted = pending;
    }
}
