//! Watch loop - periodically checks for updates until cancelled.
//!
//! ```text
//! Idle --watch--> Scheduled --delay--> Checking --> Scheduled --> ... --unwatch--> Idle
//! ```
//!
//! The scheduler owns a cancellation token and checks it at every suspension
//! point. Each tick's check is observed on its own task, so a check that never
//! settles does not hold up the schedule; overlapping checks are allowed and
//! left to the native plugin to serialize. Observers stop on cancellation too:
//! a check still in flight after `unwatch` reports nothing.

use std::future::IntoFuture;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::types::{DeployEvent, WatchOptions};
use crate::runtime::deferred::{Deferred, Promise};
use crate::runtime::deploy::Deploy;

/// Handle to the active watch loop of a `Deploy` client.
pub struct WatchHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop scheduling further checks.
    pub fn cancel(self) {
        self.token.cancel();
        log::trace!("Watch loop cancelled: finished={}", self.task.is_finished());
    }
}

impl Deploy {
    /// Start checking for updates in the background.
    ///
    /// The returned promise never settles while watching; it notifies the
    /// result of every completed check. Detected updates are additionally
    /// announced as `DeployEvent::UpdateAvailable` on the host bus. Starting a
    /// new watch replaces the active one.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn watch(self: &Arc<Self>, options: WatchOptions) -> Promise<(), bool> {
        let deferred = Deferred::new();
        let promise = deferred.promise();
        let token = CancellationToken::new();

        let initial_delay = options.initial_delay();
        let interval = options.interval();
        let task = tokio::spawn(run_watch_loop(
            Arc::downgrade(self),
            initial_delay,
            interval,
            deferred,
            token.clone(),
        ));

        {
            // Cancel under the slot lock so the old loop cannot start another check
            let mut slot = self.watch_slot();
            if let Some(previous) = slot.replace(WatchHandle { token, task }) {
                log::warn!("Replacing active deploy watch");
                previous.cancel();
            }
        }

        log::info!(
            "Deploy watch started: initial_delay_ms={}, interval_ms={}",
            initial_delay.as_millis(),
            interval.as_millis()
        );
        promise
    }

    /// Stop the active watch. Does nothing if no watch is running.
    pub fn unwatch(&self) {
        let mut slot = self.watch_slot();
        match slot.take() {
            Some(handle) => {
                handle.cancel();
                log::info!("Deploy watch stopped");
            }
            None => log::debug!("Deploy unwatch called without an active watch"),
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watch_slot().is_some()
    }
}

async fn run_watch_loop(
    deploy: Weak<Deploy>,
    initial_delay: Duration,
    interval: Duration,
    results: Deferred<(), bool>,
    token: CancellationToken,
) {
    let mut delay = initial_delay;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let Some(client) = deploy.upgrade() else {
            log::debug!("Deploy client dropped, stopping watch loop");
            break;
        };
        let check = {
            // unwatch cancels while holding the slot, so no check starts after it returns
            let _slot = client.watch_slot();
            if token.is_cancelled() {
                break;
            }
            client.check()
        };
        let host = Arc::clone(client.host());
        drop(client);

        let results = results.clone();
        let observer_token = token.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = observer_token.cancelled() => return,
                outcome = check.into_future() => outcome,
            };
            match outcome {
                Ok(available) => {
                    if available {
                        host.emit(DeployEvent::UpdateAvailable);
                    }
                    results.notify(available);
                }
                Err(e) => log::warn!("Unable to check for deploy updates: {e}"),
            }
        });

        delay = interval;
    }

    log::debug!("Deploy watch loop exited");
}
