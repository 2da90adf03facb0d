//! Deferred queue - worker threads consuming stored calls
//!
//! Producers `prepare` calls and `submit` their keys; workers `consume` each
//! key through a shared `Executor` and report on the results channel. A
//! panicking target is reported as `CallError::Panicked` and the worker keeps
//! running. Dropping the queue waits for queued calls like `shutdown`.

use super::executor::Executor;
use crate::errors::CallError;
use crate::store::StoreKey;
use flume::{Receiver, Sender};
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Outcome of one queued call
#[derive(Debug)]
pub struct Completed {
    pub key: StoreKey,
    pub result: Result<Vec<u8>, CallError>,
}

pub struct DeferredQueue {
    /// `None` once closed
    jobs: Option<Sender<StoreKey>>,
    results: Receiver<Completed>,
    workers: Vec<JoinHandle<()>>,
}

impl DeferredQueue {
    /// Start `workers` threads (at least one) draining the queue
    pub fn spawn(executor: Arc<Executor>, workers: usize) -> io::Result<Self> {
        let (jobs, inbox) = flume::unbounded::<StoreKey>();
        let (done, results) = flume::unbounded::<Completed>();

        let mut handles = Vec::with_capacity(workers.max(1));
        for id in 0..workers.max(1) {
            let inbox = inbox.clone();
            let done = done.clone();
            let executor = executor.clone();
            let handle = thread::Builder::new()
                .name(format!("deferred-worker-{}", id))
                .spawn(move || run_worker(id, &executor, &inbox, &done))?;
            handles.push(handle);
        }

        Ok(Self {
            jobs: Some(jobs),
            results,
            workers: handles,
        })
    }

    /// Queue a stored call for consumption
    pub fn submit(&self, key: StoreKey) -> Result<(), CallError> {
        match &self.jobs {
            Some(jobs) => jobs.send(key).map_err(|_| CallError::QueueClosed),
            None => Err(CallError::QueueClosed),
        }
    }

    /// Results as workers finish them
    pub fn results(&self) -> &Receiver<Completed> {
        &self.results
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting work, wait for queued calls to finish, and return the
    /// results not yet received
    pub fn shutdown(mut self) -> Vec<Completed> {
        self.close();
        self.results.drain().collect()
    }

    fn close(&mut self) {
        drop(self.jobs.take());

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("Deferred worker panicked");
            }
        }
    }
}

impl Drop for DeferredQueue {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(id: usize, executor: &Executor, inbox: &Receiver<StoreKey>, done: &Sender<Completed>) {
    debug!(worker = id, "Deferred worker started");

    while let Ok(key) = inbox.recv() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| executor.consume(&key)))
            .unwrap_or_else(|payload| Err(CallError::Panicked(panic_message(payload))));
        if let Err(err) = &result {
            warn!(worker = id, key = %key, error = %err, "Deferred call failed");
        }
        if done.send(Completed { key, result }).is_err() {
            break;
        }
    }

    debug!(worker = id, "Deferred worker stopped");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(msg) => msg.to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}
