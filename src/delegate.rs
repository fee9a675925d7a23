use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crate::models::{ParseError, ParseOptions, ParsedDocument, WorkerRequest, WorkerResponse};
use crate::parse;

/// Reference threshold: payloads of 1 MiB or more parse off-thread.
pub const DEFAULT_DELEGATE_THRESHOLD: usize = 1_048_576;

// Deep documents recurse; the worker gets room for the full depth cap.
const WORKER_STACK_BYTES: usize = 8 * 1024 * 1024;

/// Whether a payload of `byte_size` should parse in an isolated worker.
pub fn should_delegate(byte_size: usize, threshold: usize) -> bool {
  byte_size >= threshold
}

/// Routes parses either into the caller's context or to a one-shot worker
/// thread, based on payload size.
#[derive(Debug, Clone)]
pub struct ExecutionDelegate {
  threshold: usize,
}

impl ExecutionDelegate {
  pub fn new(threshold: usize) -> Self {
    Self { threshold }
  }

  pub fn threshold(&self) -> usize {
    self.threshold
  }

  /// Parse below the threshold synchronously; at or above it, hand the
  /// payload to a worker and return a `ParseJob` for the single response.
  /// An unavailable worker context falls back to the synchronous path;
  /// delegation failure is never surfaced as an error.
  pub fn dispatch(&self, raw: &str, options: ParseOptions) -> ParseDispatch {
    if !should_delegate(raw.len(), self.threshold) {
      return ParseDispatch::Completed(parse::parse(raw, &options));
    }
    // Delegation copies the payload into the request message; workers only
    // ever see copied, immutable data.
    let request = WorkerRequest::Parse {
      raw: raw.to_owned(),
      options,
    };
    match spawn_worker(request) {
      Ok(job) => ParseDispatch::Pending(job),
      Err(request) => {
        tracing::warn!("parse worker unavailable, falling back to synchronous parse");
        let WorkerRequest::Parse { raw, options } = request;
        ParseDispatch::Completed(parse::parse(&raw, &options))
      }
    }
  }
}

/// How a dispatch ran.
pub enum ParseDispatch {
  /// Ran in the caller's context (small payload, or worker unavailable).
  Completed(Result<ParsedDocument, ParseError>),
  /// Handed to a worker; poll or wait on the job.
  Pending(ParseJob),
}

/// Receiving side of a delegated parse. Exactly one response arrives,
/// asynchronously; a closed channel means the worker died without
/// responding and the caller should parse synchronously instead.
pub struct ParseJob {
  rx: Receiver<WorkerResponse>,
}

/// Poll outcome for a delegated parse.
pub enum JobStatus {
  /// Worker still running.
  Pending,
  /// The one response arrived.
  Done(Result<ParsedDocument, ParseError>),
  /// Channel closed without a response.
  Closed,
}

impl ParseJob {
  /// Non-blocking poll.
  pub fn poll(&self) -> JobStatus {
    match self.rx.try_recv() {
      Ok(response) => JobStatus::Done(response.into_result()),
      Err(TryRecvError::Empty) => JobStatus::Pending,
      Err(TryRecvError::Disconnected) => JobStatus::Closed,
    }
  }

  /// Block until the response (or channel close) arrives.
  pub fn wait(self) -> Option<Result<ParsedDocument, ParseError>> {
    self.rx.recv().ok().map(WorkerResponse::into_result)
  }
}

/// One worker thread per request: the request goes in as one owned
/// message, the response comes back as one owned message, and the thread
/// exits. On spawn failure the request is handed back for the caller's
/// synchronous fallback.
fn spawn_worker(request: WorkerRequest) -> Result<ParseJob, WorkerRequest> {
  let (req_tx, req_rx) = mpsc::channel::<WorkerRequest>();
  let (resp_tx, resp_rx) = mpsc::channel::<WorkerResponse>();
  let spawned = thread::Builder::new()
    .name("jv-parse-worker".into())
    .stack_size(WORKER_STACK_BYTES)
    .spawn(move || {
      let Ok(WorkerRequest::Parse { raw, options }) = req_rx.recv() else {
        return;
      };
      let response = WorkerResponse::from(parse::parse(&raw, &options));
      // A dropped receiver means the request was superseded; nothing to do.
      let _ = resp_tx.send(response);
    });
  if spawned.is_err() {
    return Err(request);
  }
  match req_tx.send(request) {
    Ok(()) => Ok(ParseJob { rx: resp_rx }),
    Err(mpsc::SendError(request)) => Err(request),
  }
}
