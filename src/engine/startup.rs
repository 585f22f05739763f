//! Engine startup off the caller's thread.
//!
//! Booting the engine takes tens of seconds. [`EngineStartup`] runs the boot
//! on a worker thread and hands the caller a readiness handle: poll it with
//! [`try_ready`](EngineStartup::try_ready) from an interactive loop, or block
//! with [`wait`](EngineStartup::wait). Nothing that needs the engine should
//! run until one of them has returned `Ok`.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use super::{EngineError, ProcessEngine};
use crate::config::EngineConfig;

/// Pending engine startup.
pub struct EngineStartup<E = ProcessEngine> {
    receiver: Receiver<Result<E, EngineError>>,
    started: Instant,
}

impl EngineStartup<ProcessEngine> {
    /// Launch the configured bridge process in the background.
    pub fn spawn(config: EngineConfig) -> Result<Self, EngineError> {
        Self::spawn_with(move || ProcessEngine::start(&config))
    }
}

impl<E: Send + 'static> EngineStartup<E> {
    /// Run `start` on a worker thread.
    pub fn spawn_with<F>(start: F) -> Result<Self, EngineError>
    where
        F: FnOnce() -> Result<E, EngineError> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name("engine-startup".to_string())
            .spawn(move || {
                let result = start();
                // The caller may have given up waiting; the engine is dropped then.
                if sender.send(result).is_err() {
                    debug!("engine startup finished after the caller stopped waiting");
                }
            })?;
        Ok(Self {
            receiver,
            started: Instant::now(),
        })
    }

    /// Non-blocking check. Returns `None` while startup is still running and
    /// the outcome exactly once when it finishes.
    pub fn try_ready(&mut self) -> Option<Result<Arc<E>, EngineError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(self.finish(result)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(EngineError::Disconnected)),
        }
    }

    /// Block until startup finishes or `timeout` elapses.
    pub fn wait(self, timeout: Duration) -> Result<Arc<E>, EngineError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => self.finish(result),
            Err(RecvTimeoutError::Timeout) => Err(EngineError::StartupTimeout(timeout.as_secs())),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Disconnected),
        }
    }

    /// Time since the worker was started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn finish(&self, result: Result<E, EngineError>) -> Result<Arc<E>, EngineError> {
        let engine = result?;
        info!("engine started in {:.1?}", self.elapsed());
        Ok(Arc::new(engine))
    }
}
