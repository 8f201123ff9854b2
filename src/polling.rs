// src/polling.rs
//! Cooperative poll loop: fetch, report, check the stop predicate, sleep, repeat.
//!
//! Cancellation is a flag checked before each fetch and before acting on a
//! fetched value. A fetch already in flight is allowed to finish; its value is
//! dropped if the loop was stopped meanwhile.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub type PollError = Box<dyn std::error::Error + Send + Sync>;

type PollFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, PollError>> + Send + Sync>;
type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Per-loop cancellation state. A fresh one is made on every `start`, so a
/// stopped loop that is still draining never sees the next loop's flag.
#[derive(Default)]
struct LoopControl {
    cancelled: AtomicBool,
    wake: Notify,
}

impl LoopControl {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

struct ActiveLoop {
    control: Arc<LoopControl>,
    handle: JoinHandle<()>,
}

pub struct Poller<T> {
    poll_fn: PollFn<T>,
    interval: Duration,
    stop_when: Predicate<T>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
    active: Mutex<Option<ActiveLoop>>,
}

impl<T: Send + 'static> Poller<T> {
    pub fn new<F, Fut, P>(poll_fn: F, interval: Duration, stop_when: P) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, PollError>> + Send + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            poll_fn: Arc::new(move || poll_fn().boxed()),
            interval,
            stop_when: Arc::new(stop_when),
            on_success: None,
            on_error: None,
            active: Mutex::new(None),
        }
    }

    /// Called with every freshly fetched value, including the final one
    pub fn on_success<C>(mut self, callback: C) -> Self
    where
        C: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Called once when a fetch fails; the loop then ends
    pub fn on_error<C>(mut self, callback: C) -> Self
    where
        C: Fn(String) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Start the loop. Returns false, and does nothing, while a loop is live.
    pub fn start(&self) -> bool {
        let mut active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(current) = active.as_ref() {
            if !current.control.is_cancelled() && !current.handle.is_finished() {
                tracing::debug!("poller already running; start ignored");
                return false;
            }
        }

        let control = Arc::new(LoopControl::default());
        let handle = tokio::spawn(run_loop(
            self.poll_fn.clone(),
            self.interval,
            self.stop_when.clone(),
            self.on_success.clone(),
            self.on_error.clone(),
            control.clone(),
        ));
        *active = Some(ActiveLoop { control, handle });
        true
    }

    /// Ask the loop to stop. Wakes it if it is sleeping between polls.
    pub fn stop(&self) {
        let active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(current) = active.as_ref() {
            current.control.cancelled.store(true, Ordering::Release);
            current.control.wake.notify_one();
        }
    }

    pub fn is_running(&self) -> bool {
        let active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        active
            .as_ref()
            .map(|current| !current.control.is_cancelled() && !current.handle.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the current loop, if any, to exit
    pub async fn join(&self) {
        let handle = {
            let mut active = match self.active.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            active.take().map(|current| current.handle)
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("poll loop ended abnormally: {}", e);
            }
        }
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        if let Ok(active) = self.active.lock() {
            if let Some(current) = active.as_ref() {
                current.control.cancelled.store(true, Ordering::Release);
                current.control.wake.notify_one();
            }
        }
    }
}

async fn run_loop<T>(
    poll_fn: PollFn<T>,
    interval: Duration,
    stop_when: Predicate<T>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
    control: Arc<LoopControl>,
) {
    loop {
        if control.is_cancelled() {
            break;
        }

        let fetched = poll_fn().await;

        if control.is_cancelled() {
            break;
        }

        match fetched {
            Ok(value) => {
                if let Some(callback) = &on_success {
                    callback(&value);
                }
                if stop_when(&value) {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("poll failed: {}", e);
                if let Some(callback) = &on_error {
                    callback(e.to_string());
                }
                break;
            }
        }

        if control.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = control.wake.notified() => {},
        }
    }
}
