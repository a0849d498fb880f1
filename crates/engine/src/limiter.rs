// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-concurrency task gate.
//!
//! At most K tasks run at once; waiters are served FIFO. Permits are held
//! by RAII guards, so a slot is freed on every exit path including panics
//! and dropped futures.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of one task under [`Limiter::all_settled`].
#[derive(Debug)]
pub enum Settled<T> {
    Fulfilled(T),
    /// The task panicked; the payload is the panic description.
    Rejected(String),
}

impl<T> Settled<T> {
    pub fn fulfilled(self) -> Option<T> {
        match self {
            Settled::Fulfilled(value) => Some(value),
            Settled::Rejected(_) => None,
        }
    }
}

/// FIFO semaphore enforcing at-most-K concurrency.
#[derive(Clone)]
pub struct Limiter {
    semaphore: Arc<Semaphore>,
}

impl Limiter {
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// Run one task once a slot is free.
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        // The semaphore is never closed, so acquire cannot fail.
        let _permit = self.semaphore.acquire().await;
        task.await
    }

    /// Run all tasks under the cap; fail fast on the first error.
    ///
    /// On success, results are in input order. On failure, remaining tasks
    /// are aborted and the first error (in completion order) is returned.
    pub async fn all<F, T, E>(&self, tasks: Vec<F>) -> Result<Vec<T>, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let total = tasks.len();
        let mut set = JoinSet::new();
        for (index, task) in tasks.into_iter().enumerate() {
            let limiter = self.clone();
            set.spawn(async move { (index, limiter.run(task).await) });
        }

        let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(value))) => slots[index] = Some(value),
                Ok((_, Err(e))) => {
                    set.abort_all();
                    return Err(e);
                }
                Err(join_error) => {
                    // all_settled is the panic-tolerant variant; here a
                    // panicking task propagates to the caller.
                    set.abort_all();
                    if join_error.is_panic() {
                        std::panic::resume_unwind(join_error.into_panic());
                    }
                }
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }

    /// Run all tasks under the cap, collecting per-task outcomes.
    ///
    /// Never fails as a whole: panicking tasks become
    /// [`Settled::Rejected`]. Results are in input order.
    pub async fn all_settled<F, T>(&self, tasks: Vec<F>) -> Vec<Settled<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let limiter = self.clone();
            handles.push(tokio::spawn(async move { limiter.run(task).await }));
        }

        let mut settled = Vec::with_capacity(handles.len());
        for handle in handles {
            settled.push(match handle.await {
                Ok(value) => Settled::Fulfilled(value),
                Err(join_error) => Settled::Rejected(join_error.to_string()),
            });
        }
        settled
    }

    /// Free slots right now (for diagnostics).
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
#[path = "limiter_tests.rs"]
mod tests;
