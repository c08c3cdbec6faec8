// ============================================================================
// ripple-store - Keys
// String-or-integer keys and the key derivation contract
// ============================================================================

use std::fmt;
use std::rc::Rc;

// =============================================================================
// KEY
// =============================================================================

/// A store key: a string or an integer, nothing else.
///
/// Everything else about key validity follows from this being a closed enum.
/// Explicit keys are valid by construction; the only place key resolution can
/// still fail is when a key must be *derived* from a value and the store's
/// extractor yields nothing (see [`Keyed`] and
/// [`StoreError::InvalidKey`](crate::StoreError::InvalidKey)).
///
/// # Example
///
/// ```
/// use ripple_store::Key;
///
/// let by_name: Key = "vm-1".into();
/// let by_number: Key = 42.into();
/// assert_ne!(by_name, by_number);
/// assert_eq!(by_number.to_string(), "42");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Str(String),
    Int(i64),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Int(n.into())
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Key::Int(n.into())
    }
}

// =============================================================================
// KEYED VALUES
// =============================================================================

/// Contract the store needs from stored values.
///
/// `key()` backs the default key extractor: the Rust rendition of "read the
/// value's `id` field". Returning `None` means the value carries no key of
/// its own, so key-deriving operations (`add_item` and friends) fail with
/// `InvalidKey` unless the store was given a custom extractor.
///
/// `is_composite()` tells [`touch`](crate::Store::touch) whether the value
/// has internal state that can change behind the store's back. Scalars are
/// not composite; touching them is an error.
pub trait Keyed {
    /// Derive this value's key, if it carries one.
    fn key(&self) -> Option<Key>;

    /// Whether the value has externally mutable internal state.
    fn is_composite(&self) -> bool {
        true
    }
}

/// Scalars carry no key and have no internal state to touch.
macro_rules! scalar_keyed {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Keyed for $ty {
                fn key(&self) -> Option<Key> {
                    None
                }

                fn is_composite(&self) -> bool {
                    false
                }
            }
        )*
    };
}

scalar_keyed!(bool, i32, i64, u32, u64, f32, f64, String, &'static str);

// =============================================================================
// KEY EXTRACTION
// =============================================================================

/// Per-store key extractor: a pure function from a value to its key.
///
/// The default extractor delegates to [`Keyed::key`]; override it per store
/// instance with [`Store::set_key_extractor`](crate::Store::set_key_extractor).
pub type KeyExtractor<V> = Rc<dyn Fn(&V) -> Option<Key>>;

// =============================================================================
// TESTS
// =============================================================================
