//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two quantities
/// of `5 kg` are the same quantity, whereas two inventory items holding
/// `5 kg` are still distinct items. To "modify" a value object, create a new
/// one (e.g. `Quantity::subtract` returns a fresh `Quantity`).
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Metric {
///     name: String,
///     symbol: String,
/// }
///
/// impl ValueObject for Metric {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
