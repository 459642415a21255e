//! Document processing built on the parser and renderer.
//!
//! # Architecture
//!
//! The processor module is organized into focused submodules:
//!
//! - [`core`]: Parse and render pipeline of [`MarkupProcessor`]
//! - [`process`]: Panic recovery and parallel batches
//! - [`pool`]: A worker pool that enforces wall-clock budgets
//! - [`types`]: Options, limits and per-call requests
pub mod core;
pub mod pool;
pub mod process;
pub mod types;

pub use pool::RenderPool;
pub use process::{process_batch, process_with_recovery};
pub use types::{
  Limits,
  LinkOptions,
  MarkupOptions,
  MarkupOptionsBuilder,
  MarkupProcessor,
  Messages,
  RenderRequest,
};
