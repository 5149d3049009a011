//! Background conversions
//!
//! The [`ConversionQueue`] owns a small pool of worker threads sharing one
//! [`ConverterGateway`]. Requests go in through [`submit`](ConversionQueue::submit);
//! finished conversions are picked up on the caller's thread with
//! [`poll`](ConversionQueue::poll), [`poll_all`](ConversionQueue::poll_all) or
//! the blocking [`drain`](ConversionQueue::drain). Two requests for the same
//! output file never run at once: the gateway locks per output path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use super::{ConversionKind, ConverterGateway};
use crate::error::ConversionError;

/// Request to convert one file in the background
struct ConversionRequest {
    id: u64,
    kind: ConversionKind,
    input: PathBuf,
}

/// Result of a background conversion
#[derive(Debug)]
pub struct ConversionOutcome {
    /// Id handed out by [`ConversionQueue::submit`]
    pub id: u64,
    pub kind: ConversionKind,
    pub input: PathBuf,
    /// The produced file or the error
    pub result: Result<PathBuf, ConversionError>,
}

/// Worker pool running conversions through a shared gateway
///
/// # Example
/// ```ignore
/// let queue = ConversionQueue::new(gateway, 4);
/// let id = queue.submit(ConversionKind::MeshToInterchange, "data/a.rdm");
///
/// for outcome in queue.drain() {
///     match outcome.result {
///         Ok(glb) => { /* hand to the editor */ }
///         Err(e) => { /* placeholder */ }
///     }
/// }
/// ```
pub struct ConversionQueue {
    /// Channel to send requests to the workers
    sender: Option<Sender<ConversionRequest>>,
    /// Channel to receive outcomes from the workers
    receiver: Receiver<ConversionOutcome>,
    next_id: AtomicU64,
    pending: AtomicUsize,
    workers: Vec<thread::JoinHandle<()>>,
}

impl ConversionQueue {
    /// Start `workers` threads (at least one)
    pub fn new(gateway: Arc<ConverterGateway>, workers: usize) -> Self {
        let (request_tx, request_rx) = channel::<ConversionRequest>();
        let (result_tx, result_rx) = channel::<ConversionOutcome>();
        let request_rx = Arc::new(Mutex::new(request_rx));

        let handles = (0..workers.max(1))
            .map(|_| {
                let requests = Arc::clone(&request_rx);
                let results = result_tx.clone();
                let gateway = Arc::clone(&gateway);
                thread::spawn(move || loop {
                    // Hold the receiver lock only while taking a request
                    let next = requests
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .recv();
                    let request = match next {
                        Ok(request) => request,
                        Err(_) => break,
                    };
                    let result = gateway.convert(request.kind, &request.input);
                    let outcome = ConversionOutcome {
                        id: request.id,
                        kind: request.kind,
                        input: request.input,
                        result,
                    };
                    if results.send(outcome).is_err() {
                        break;
                    }
                })
            })
            .collect();

        Self {
            sender: Some(request_tx),
            receiver: result_rx,
            next_id: AtomicU64::new(1),
            pending: AtomicUsize::new(0),
            workers: handles,
        }
    }

    /// Queue a conversion; returns the id its outcome will carry
    pub fn submit(&self, kind: ConversionKind, input: impl Into<PathBuf>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = ConversionRequest {
            id,
            kind,
            input: input.into(),
        };
        if let Some(sender) = &self.sender {
            if sender.send(request).is_ok() {
                self.pending.fetch_add(1, Ordering::SeqCst);
            }
        }
        id
    }

    /// Number of submitted conversions whose outcome was not collected yet
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Check for one finished conversion (non-blocking)
    pub fn poll(&self) -> Option<ConversionOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Collect all finished conversions (non-blocking)
    pub fn poll_all(&self) -> Vec<ConversionOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.poll() {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Wait for every pending conversion and return the outcomes
    pub fn drain(&self) -> Vec<ConversionOutcome> {
        let mut outcomes = Vec::new();
        while self.pending() > 0 {
            match self.receiver.recv() {
                Ok(outcome) => {
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    outcomes.push(outcome);
                }
                Err(_) => break,
            }
        }
        outcomes
    }
}

impl Drop for ConversionQueue {
    fn drop(&mut self) {
        // Closing the request channel stops the workers
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
