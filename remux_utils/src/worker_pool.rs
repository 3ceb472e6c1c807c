//! Bounded worker pool
//!
//! A fixed number of rayon worker threads pull submitted tasks one at a time and
//! run each to completion. Every task reports back through a channel as
//! `(index, task, result)`, in completion order. The caller drains the channel
//! with a plain loop; it ends once every task has reported.
//!
//! Panics inside a task are caught and reported as `TaskResult::Panicked`, so one
//! misbehaving task never takes down its siblings or the caller. Once the shared
//! cancel flag is raised, tasks that have not started yet report
//! `TaskResult::Cancelled` without running.

use anyhow::Result;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

#[derive(Debug)]
pub enum TaskResult<R> {
    Completed(R),
    Panicked(String),
    Cancelled,
}

#[derive(Debug)]
pub struct Completion<T, R> {
    /// Submission index of the task.
    pub index: usize,
    pub task: T,
    pub result: TaskResult<R>,
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
    cancel: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(workers: usize, cancel: Arc<AtomicBool>) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("remux-worker-{}", i))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;
        Ok(Self {
            pool,
            workers,
            cancel,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Queues every task and returns the completion stream.
    ///
    /// The returned iterator yields exactly `tasks.len()` items and only ends
    /// after every task has finished, been cancelled, or panicked.
    pub fn execute<T, R, F>(&self, tasks: Vec<T>, job: F) -> Completions<T, R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let job = Arc::new(job);
        let expected = tasks.len();

        for (index, task) in tasks.into_iter().enumerate() {
            let tx = tx.clone();
            let job = Arc::clone(&job);
            let cancel = Arc::clone(&self.cancel);
            self.pool.spawn(move || {
                let result = if cancel.load(Ordering::SeqCst) {
                    TaskResult::Cancelled
                } else {
                    match catch_unwind(AssertUnwindSafe(|| job(&task))) {
                        Ok(r) => TaskResult::Completed(r),
                        Err(payload) => TaskResult::Panicked(panic_message(payload.as_ref())),
                    }
                };
                let _ = tx.send(Completion {
                    index,
                    task,
                    result,
                });
            });
        }

        Completions { rx, expected }
    }
}

pub struct Completions<T, R> {
    rx: Receiver<Completion<T, R>>,
    expected: usize,
}

impl<T, R> Completions<T, R> {
    pub fn expected(&self) -> usize {
        self.expected
    }
}

impl<T, R> Iterator for Completions<T, R> {
    type Item = Completion<T, R>;

    fn next(&mut self) -> Option<Self::Item> {
        // Every task holds a sender clone, so recv() fails only after all of
        // them have reported and dropped it.
        self.rx.recv().ok()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
