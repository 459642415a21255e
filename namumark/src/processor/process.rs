//! High-level processing functions with panic recovery.
use std::sync::atomic::{AtomicU64, Ordering};

use log::error;
use rayon::prelude::*;

use super::types::{MarkupProcessor, RenderRequest};
use crate::{error::ErrorCode, types::RenderResult};

static PANIC_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifier tying a failed result to its log line.
fn correlation_id() -> String {
  let sequence = PANIC_COUNTER.fetch_add(1, Ordering::Relaxed);
  let now = jiff::Timestamp::now().as_millisecond();
  format!("{now:x}-{sequence:04x}")
}

/// Human-readable form of a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<String>() {
    message
  } else if let Some(message) = payload.downcast_ref::<&str>() {
    message
  } else {
    "unknown panic payload"
  }
}

/// Process markup with panic recovery.
///
/// Parses and renders `content` like [`MarkupProcessor::process`]. A panic
/// anywhere inside is caught and reported as a `render_failed` result
/// carrying a correlation id; the panic itself only reaches the log.
///
/// # Arguments
///
/// * `processor` - The configured markup processor
/// * `content` - The raw markup to process
/// * `request` - The document being rendered and its environment
#[must_use]
pub fn process_with_recovery(
  processor: &MarkupProcessor,
  content: &str,
  request: &RenderRequest,
) -> RenderResult {
  match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
    processor.process(content, request)
  })) {
    Ok(result) => result,
    Err(panic_err) => recovered(processor, request, panic_err.as_ref()),
  }
}

/// The `render_failed` result for a caught panic, logged under a fresh
/// correlation id.
pub(crate) fn recovered(
  processor: &MarkupProcessor,
  request: &RenderRequest,
  payload: &(dyn std::any::Any + Send),
) -> RenderResult {
  let id = correlation_id();
  error!(
    "Panic while rendering {} [{id}]: {}",
    request.document,
    panic_message(payload)
  );
  RenderResult {
    correlation_id: Some(id),
    ..processor.failure(ErrorCode::RenderFailed)
  }
}

/// Process many documents in parallel on the current rayon pool.
///
/// Results come back in the order of `jobs`. Each job is isolated: one
/// failing document does not affect the others.
#[must_use]
pub fn process_batch(
  processor: &MarkupProcessor,
  jobs: &[(String, RenderRequest)],
) -> Vec<RenderResult> {
  jobs
    .par_iter()
    .map(|(content, request)| process_with_recovery(processor, content, request))
    .collect()
}
