// ============================================================================
// ripple-store - Core Module
// Keys, errors, and event types for the observable store
// ============================================================================

pub mod error;
pub mod event;
pub mod key;

// Re-export commonly used items
pub use error::StoreError;
pub use event::{ChangeKind, Mutation, StoreEvent};
pub use key::{Key, KeyExtractor, Keyed};
