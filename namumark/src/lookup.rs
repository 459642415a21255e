//! The boundary to document and media storage.
//!
//! The renderer never touches storage itself. Callers hand it a
//! [`DocumentLookup`] that answers "what is at namespace + title?" and the
//! renderer uses it for link existence checks, transclusion, image
//! dimensions and page counts.
use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{document::DocumentRef, parser::ParseOutput};

/// Stored document content, optionally with a parse produced earlier.
#[derive(Debug, Clone, Default)]
pub struct StoredDocument {
  pub content: String,
  /// A cached parse of `content`. Reused by transclusion when the content
  /// has no placeholders.
  pub parsed:  Option<Arc<ParseOutput>>,
}

/// Metadata of a stored file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
  pub storage_key: String,
  pub width:       Option<u32>,
  pub height:      Option<u32>,
  pub byte_size:   u64,
}

/// What a lookup can find.
#[derive(Debug, Clone)]
pub enum Entry {
  Document(StoredDocument),
  File(FileMeta),
}

/// Read-only access to stored documents and files.
///
/// Implementations are shared across worker threads, hence `Send + Sync`.
pub trait DocumentLookup: Send + Sync {
  /// Fetch whatever is stored under `document`, or `None` if nothing is.
  fn lookup(&self, document: &DocumentRef) -> Option<Entry>;

  /// Number of documents in `namespace`, or in total for `None`.
  fn count(&self, _namespace: Option<&str>) -> usize {
    0
  }

  fn exists(&self, document: &DocumentRef) -> bool {
    self.lookup(document).is_some()
  }
}

/// A lookup that knows nothing. Every link is a missing document.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyLookup;

impl DocumentLookup for EmptyLookup {
  fn lookup(&self, _document: &DocumentRef) -> Option<Entry> {
    None
  }
}

/// An in-memory lookup table.
#[derive(Debug, Clone, Default)]
pub struct MemoryLookup {
  entries: HashMap<DocumentRef, Entry>,
}

impl MemoryLookup {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert_document(
    &mut self,
    document: DocumentRef,
    content: impl Into<String>,
  ) -> &mut Self {
    self.entries.insert(
      document,
      Entry::Document(StoredDocument {
        content: content.into(),
        parsed:  None,
      }),
    );
    self
  }

  pub fn insert_parsed(
    &mut self,
    document: DocumentRef,
    content: impl Into<String>,
    parsed: Arc<ParseOutput>,
  ) -> &mut Self {
    self.entries.insert(
      document,
      Entry::Document(StoredDocument {
        content: content.into(),
        parsed:  Some(parsed),
      }),
    );
    self
  }

  pub fn insert_file(&mut self, document: DocumentRef, meta: FileMeta) -> &mut Self {
    self.entries.insert(document, Entry::File(meta));
    self
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl DocumentLookup for MemoryLookup {
  fn lookup(&self, document: &DocumentRef) -> Option<Entry> {
    self.entries.get(document).cloned()
  }

  fn count(&self, namespace: Option<&str>) -> usize {
    self
      .entries
      .iter()
      .filter(|(document, entry)| {
        matches!(entry, Entry::Document(_))
          && namespace.is_none_or(|ns| document.namespace == ns)
      })
      .count()
  }
}
