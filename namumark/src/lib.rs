//! # namumark - a compiler for namumark wiki markup
//!
//! Turns namumark source into sanitized HTML along with the metadata a wiki
//! needs: outgoing links, embedded files, categories, headings and a short
//! text preview.
//!
//! ## Quick Start
//!
//! ```rust
//! use namumark::{MarkupOptions, MarkupProcessor, RenderRequest};
//!
//! let processor = MarkupProcessor::new(MarkupOptions::default());
//! let request = RenderRequest::standalone("대문");
//! let result = processor.process("== 소개 ==\n'''굵게''' [[다른 문서]]", &request);
//!
//! assert!(!result.has_error);
//! assert_eq!(result.links, vec!["다른 문서"]);
//! println!("HTML: {}", result.html);
//! ```
//!
//! ## Features
//!
//! - **Two-phase pipeline**: the parse output can be cached and rendered
//!   many times
//! - **Transclusion** with `@parameter@` substitution and isolated footnotes
//! - **Tables** with spans, alignment and dark-mode colors
//! - **Conditional blocks** evaluated by a small, bounded expression sandbox
//! - **Macros** from a registry that accepts custom handlers
//! - **Resource limits** on depth, output size and time, reported as error
//!   codes instead of panics
//!
//! ## Documents
//!
//! Other documents are reached through a [`DocumentLookup`]. The in-memory
//! [`MemoryLookup`] suits tests and small tools:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use namumark::{DocumentRef, MarkupOptions, MarkupProcessor, MemoryLookup, RenderRequest};
//!
//! let mut lookup = MemoryLookup::new();
//! lookup.insert_document(DocumentRef::new("틀", "인사"), "안녕, @name@!");
//!
//! let request = RenderRequest::new(DocumentRef::new("문서", "대문"), Arc::new(lookup));
//! let processor = MarkupProcessor::new(MarkupOptions::default());
//! let result = processor.process("[include(틀:인사, name=위키)]", &request);
//! assert!(result.html.contains("안녕, 위키!"));
//! ```

pub mod deadline;
pub mod document;
pub mod error;
pub mod lookup;
pub mod parser;
pub mod processor;
pub mod render;
pub mod sandbox;
pub mod table;
pub mod tokenizer;
mod types;
pub mod utils;

pub use crate::{
  document::{DocumentRef, NamespaceConfig},
  error::{Error, ErrorCode, ParseError, RenderError, SandboxError},
  lookup::{DocumentLookup, EmptyLookup, Entry, FileMeta, MemoryLookup, StoredDocument},
  parser::{Node, ParseOptions, ParseOutput, Parser},
  processor::{
    Limits,
    LinkOptions,
    MarkupOptions,
    MarkupOptionsBuilder,
    MarkupProcessor,
    Messages,
    RenderPool,
    RenderRequest,
    process_batch,
    process_with_recovery,
  },
  render::{Macro, MacroRegistry, RenderContext},
  sandbox::Sandbox,
  types::{Embed, RenderResult, RenderedHeading},
};
