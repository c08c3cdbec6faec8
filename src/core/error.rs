// ============================================================================
// ripple-store - Error Taxonomy
// Closed set of store failures, discriminated by kind
// ============================================================================

use thiserror::Error;

use crate::core::key::Key;

/// Every way a store operation can fail.
///
/// All failures are synchronous and non-retriable by the store itself; it
/// signals and lets the caller decide.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A key had to be derived from a value and the extractor yielded none.
    #[error("value does not resolve to a string or integer key")]
    InvalidKey,

    /// `add` targeted an already-present key.
    #[error("item already exists: {0}")]
    DuplicateItem(Key),

    /// `update`/`remove`/`touch`/`get` targeted an absent key.
    #[error("no such item: {0}")]
    NoSuchItem(Key),

    /// `touch` targeted a non-composite value.
    #[error("cannot touch non-composite item: {0}")]
    IllegalTouch(Key),

    /// `create_index` reused an existing name.
    #[error("index already exists: {0}")]
    DuplicateIndex(String),

    /// `delete_index` targeted an unregistered name.
    #[error("no such index: {0}")]
    NoSuchIndex(String),

    /// A flush capability was invoked a second time.
    #[error("buffered events have already been flushed")]
    BufferAlreadyFlushed,
}

// =============================================================================
// TESTS
// =============================================================================
