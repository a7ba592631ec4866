//! Case dispatch for polymorphic entries.
//!
//! A stream's entry type may be a closed enum of cases; subscribers can then
//! subscribe to a single case and receive only matching entries, already
//! narrowed to the concrete type. [`VariantCase`] is the dispatch seam:
//! every entry type is trivially its own (only) case, and the
//! [`variant_cases!`](crate::variant_cases) macro derives case impls for an
//! enum whose arm names match its payload types.

use crate::entry::Entry;

// ---------------------------------------------------------------------------
// VariantCase
// ---------------------------------------------------------------------------

/// A concrete case extractable from the entry type `E`.
pub trait VariantCase<E>: Sized {
    /// Name of this case as exposed in schemas and dialect framing.
    fn case_name() -> &'static str;

    /// Narrows an entry to this case, returning the entry unchanged when it
    /// holds a different case.
    ///
    /// # Errors
    ///
    /// The original entry, when its active case is not `Self`.
    fn extract(entry: E) -> Result<Self, E>;
}

// Every entry is trivially its own single case; `subscribe` without a filter
// goes through this impl.
impl<E: Entry> VariantCase<E> for E {
    fn case_name() -> &'static str {
        E::type_name()
    }

    fn extract(entry: E) -> Result<Self, E> {
        Ok(entry)
    }
}

// ---------------------------------------------------------------------------
// VariantError
// ---------------------------------------------------------------------------

/// Dispatch failures in the entry polymorphism layer.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VariantError {
    /// The slot holds no value at all.
    #[error("uninitialized variant")]
    Uninitialized,

    /// The held value is of a different case than the one requested.
    #[error("no value of type {0}")]
    NoValueOfType(&'static str),

    /// The named case does not belong to (or does not decode as a case of)
    /// the target variant.
    #[error("incompatible variant type {0}")]
    IncompatibleVariantType(String),
}

/// Narrows an owned entry to a case, mapping a mismatch to a typed error.
///
/// # Errors
///
/// [`VariantError::NoValueOfType`] when the entry holds a different case.
pub fn narrow<E, C: VariantCase<E>>(entry: E) -> Result<C, VariantError> {
    C::extract(entry).map_err(|_| VariantError::NoValueOfType(C::case_name()))
}

// ---------------------------------------------------------------------------
// VariantSlot
// ---------------------------------------------------------------------------

/// A possibly-empty holder of a polymorphic entry with typed case access.
///
/// Mirrors the "maybe not yet assigned" shape that shows up in replication
/// buffers and test fixtures, where an entry slot exists before any value
/// does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantSlot<E>(Option<E>);

impl<E> VariantSlot<E> {
    /// An empty slot.
    #[must_use]
    pub fn empty() -> Self {
        Self(None)
    }

    /// A slot holding `entry`.
    #[must_use]
    pub fn with(entry: E) -> Self {
        Self(Some(entry))
    }

    /// Whether the slot holds a value.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.0.is_some()
    }

    /// Borrows the held entry.
    ///
    /// # Errors
    ///
    /// [`VariantError::Uninitialized`] when the slot is empty.
    pub fn get(&self) -> Result<&E, VariantError> {
        self.0.as_ref().ok_or(VariantError::Uninitialized)
    }

    /// Extracts a clone of the held entry narrowed to case `C`.
    ///
    /// # Errors
    ///
    /// [`VariantError::Uninitialized`] when empty,
    /// [`VariantError::NoValueOfType`] when the active case is not `C`.
    pub fn value_of<C: VariantCase<E>>(&self) -> Result<C, VariantError>
    where
        E: Clone,
    {
        match &self.0 {
            None => Err(VariantError::Uninitialized),
            Some(entry) => narrow(entry.clone()),
        }
    }

    /// Replaces the held entry.
    pub fn set(&mut self, entry: E) {
        self.0 = Some(entry);
    }

    /// Empties the slot.
    pub fn clear(&mut self) {
        self.0 = None;
    }
}

// ---------------------------------------------------------------------------
// variant_cases!
// ---------------------------------------------------------------------------

/// Derives [`VariantCase`] impls and case helpers for an enum whose arm
/// names match their payload types.
///
/// ```rust,ignore
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Added { text: String }
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Removed { id: u64 }
///
/// #[derive(Clone, Serialize, Deserialize)]
/// enum Change { Added(Added), Removed(Removed) }
///
/// impl Entry for Change {
///     fn case_name(&self) -> &'static str { self.active_case_name() }
/// }
///
/// rill_core::variant_cases!(Change { Added, Removed });
/// ```
#[macro_export]
macro_rules! variant_cases {
    ($variant:ident { $($case:ident),+ $(,)? }) => {
        $(
            impl $crate::VariantCase<$variant> for $case {
                fn case_name() -> &'static str {
                    stringify!($case)
                }

                fn extract(entry: $variant) -> Result<Self, $variant> {
                    match entry {
                        $variant::$case(value) => Ok(value),
                        other => Err(other),
                    }
                }
            }
        )+

        impl $variant {
            /// Name of the active case.
            #[must_use]
            pub fn active_case_name(&self) -> &'static str {
                match self {
                    $( $variant::$case(_) => stringify!($case), )+
                }
            }

            /// Decodes a case by name from its JSON representation.
            ///
            /// # Errors
            ///
            /// `VariantError::IncompatibleVariantType` when `case` is not a
            /// case of this variant or the payload does not decode as the
            /// named case.
            pub fn from_case_json(
                case: &str,
                value: $crate::__serde_json::Value,
            ) -> Result<Self, $crate::VariantError> {
                match case {
                    $(
                        stringify!($case) => $crate::__serde_json::from_value(value)
                            .map($variant::$case)
                            .map_err(|_| {
                                $crate::VariantError::IncompatibleVariantType(case.to_string())
                            }),
                    )+
                    other => Err($crate::VariantError::IncompatibleVariantType(
                        other.to_string(),
                    )),
                }
            }
        }
    };
}
