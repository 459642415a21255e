//! Rendering on a dedicated worker pool under wall-clock budgets.
//!
//! The caller waits for the parse budget, then for the render budget. When
//! either runs out, the job's cancel flag is raised so it stops at its next
//! deadline check, and the caller gets a timeout result right away.
use std::{
  fmt,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::{self, RecvTimeoutError},
  },
};

use super::{
  process::{process_batch, recovered},
  types::{MarkupProcessor, RenderRequest},
};
use crate::{
  error::{Error, ErrorCode},
  types::RenderResult,
};

enum Progress {
  Parsed,
  Done(RenderResult),
}

/// A rayon pool that renders documents with timeouts.
pub struct RenderPool {
  pool:      rayon::ThreadPool,
  processor: Arc<MarkupProcessor>,
}

impl fmt::Debug for RenderPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RenderPool")
      .field("threads", &self.pool.current_num_threads())
      .field("processor", &self.processor)
      .finish()
  }
}

impl RenderPool {
  /// Create a pool with `threads` workers, or one per core for `0`.
  ///
  /// # Errors
  ///
  /// Returns [`Error::Pool`] if the threads cannot be spawned.
  pub fn new(processor: MarkupProcessor, threads: usize) -> Result<Self, Error> {
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(threads)
      .thread_name(|i| format!("namumark-render-{i}"))
      .build()
      .map_err(|e| Error::Pool(e.to_string()))?;
    log::debug!("render pool started with {} threads", pool.current_num_threads());
    Ok(Self {
      pool,
      processor: Arc::new(processor),
    })
  }

  #[must_use]
  pub fn processor(&self) -> &MarkupProcessor {
    &self.processor
  }

  /// Parse and render `text` on the pool, waiting at most the request's
  /// parse budget plus its render budget.
  #[must_use]
  pub fn render(&self, text: &str, request: RenderRequest) -> RenderResult {
    let limits = self.processor.limits(&request).clone();
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let processor = Arc::clone(&self.processor);
    let flag = Arc::clone(&cancel);
    let text = text.to_string();
    let document = request.document.clone();
    self.pool.spawn(move || {
      let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        match processor.parse_cancellable(&text, &request, Some(&flag)) {
          Ok(parsed) => {
            // The caller may have stopped listening already.
            let _ = tx.send(Progress::Parsed);
            processor.render_cancellable(&parsed, &request, Some(&flag))
          },
          Err(e) => {
            log::warn!("parsing {} failed: {e}", request.document);
            processor.failure(ErrorCode::from(&e))
          },
        }
      }));
      let result = outcome
        .unwrap_or_else(|payload| recovered(&processor, &request, payload.as_ref()));
      let _ = tx.send(Progress::Done(result));
    });

    let timed_out = |code: ErrorCode| {
      cancel.store(true, Ordering::Relaxed);
      log::warn!("{document} exceeded its budget: {}", code.as_str());
      self.processor.failure(code)
    };

    match rx.recv_timeout(limits.parse_timeout) {
      Ok(Progress::Done(result)) => result,
      Ok(Progress::Parsed) => {
        match rx.recv_timeout(limits.render_timeout) {
          Ok(Progress::Done(result)) => result,
          Ok(Progress::Parsed) | Err(RecvTimeoutError::Disconnected) => {
            self.processor.failure(ErrorCode::RenderFailed)
          },
          Err(RecvTimeoutError::Timeout) => timed_out(ErrorCode::RenderTimeout),
        }
      },
      Err(RecvTimeoutError::Timeout) => timed_out(ErrorCode::ParseTimeout),
      Err(RecvTimeoutError::Disconnected) => {
        self.processor.failure(ErrorCode::RenderFailed)
      },
    }
  }

  /// Render many documents in parallel on this pool.
  #[must_use]
  pub fn render_batch(&self, jobs: &[(String, RenderRequest)]) -> Vec<RenderResult> {
    self.pool.install(|| process_batch(&self.processor, jobs))
  }
}
