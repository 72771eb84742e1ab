//! Deferred inserts: producers submit and carry on, the commit happens on a
//! worker thread and its outcome comes back through an `InsertHandle`.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use log::{debug, trace};

use crate::config::LedgerConfig;
use crate::ledger::{Ledger, LedgerError};

struct Request {
    seq_no: u32,
    parent_seq_no: u32,
    event: u32,
    respond: Sender<Result<(), LedgerError>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertStatus {
    Pending,
    Committed,
    Failed,
}

/// Outcome of one submitted insert. Dropping it does not cancel the insert.
pub struct InsertHandle {
    seq_no: u32,
    reply: Receiver<Result<(), LedgerError>>,
    outcome: Option<Result<(), LedgerError>>,
}

impl InsertHandle {
    pub fn seq_no(&self) -> u32 {
        self.seq_no
    }

    /// Non-blocking poll; `None` while the insert is still queued.
    pub fn try_wait(&mut self) -> Option<Result<(), LedgerError>> {
        if self.outcome.is_none() {
            self.outcome = match self.reply.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Err(LedgerError::Closed)),
            };
        }
        self.outcome.clone()
    }

    pub fn status(&mut self) -> InsertStatus {
        match self.try_wait() {
            None => InsertStatus::Pending,
            Some(Ok(())) => InsertStatus::Committed,
            Some(Err(_)) => InsertStatus::Failed,
        }
    }

    /// Block until the insert is committed or rejected.
    pub fn wait(self) -> Result<(), LedgerError> {
        match self.outcome {
            Some(outcome) => outcome,
            None => self.reply.recv().unwrap_or(Err(LedgerError::Closed)),
        }
    }
}

/// Worker pool committing inserts into a shared `Ledger`.
pub struct InsertQueue {
    ledger: Arc<Ledger>,
    requests: Option<Sender<Request>>,
    workers: Vec<JoinHandle<()>>,
}

impl InsertQueue {
    pub fn spawn(ledger: Arc<Ledger>, workers: usize) -> Self {
        let (requests, queue) = channel::unbounded::<Request>();
        let workers = (0..workers.max(1))
            .map(|id| {
                let ledger = Arc::clone(&ledger);
                let queue = queue.clone();
                std::thread::spawn(move || run_worker(id, &ledger, queue))
            })
            .collect();
        Self { ledger, requests: Some(requests), workers }
    }

    pub fn spawn_with_config(ledger: Arc<Ledger>, config: &LedgerConfig) -> Self {
        Self::spawn(ledger, config.workers)
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn submit(&self, seq_no: u32, parent_seq_no: u32, event: u32) -> InsertHandle {
        let (respond, reply) = channel::bounded(1);
        let request = Request { seq_no, parent_seq_no, event, respond };
        let closed = match &self.requests {
            Some(requests) => requests.send(request).is_err(),
            None => true,
        };
        InsertHandle {
            seq_no,
            reply,
            outcome: closed.then_some(Err(LedgerError::Closed)),
        }
    }

    /// Stop accepting work, let the workers drain what is queued, and join them.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.requests.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Insert worker panicked");
            }
        }
    }
}

impl Drop for InsertQueue {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(id: usize, ledger: &Ledger, queue: Receiver<Request>) {
    debug!("Insert worker {} started", id);
    while let Ok(request) = queue.recv() {
        let outcome = ledger.insert(request.seq_no, request.parent_seq_no, request.event);
        trace!("Worker {} finished seq_no {}: {:?}", id, request.seq_no, outcome);
        // The submitter may have dropped its handle.
        let _ = request.respond.send(outcome);
    }
    debug!("Insert worker {} stopped", id);
}
