//! Typed overlay descriptions and their type-erased form.
//!
//! Hosts describe "what should be shown" as plain values implementing
//! [`Overlay`]. The stack works with the type-erased [`AnyOverlay`] so a
//! single ordered list can mix overlay types. Two descriptions are
//! *compatible* (one can update the surface built for the other) exactly
//! when their [`CompatibilityKey`]s are equal.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::factory::AnyOverlayFactory;

/// A logical description of a window-like surface layered above a base view.
///
/// Implementations are immutable values owned by the host. Equality is used
/// to skip redundant surface updates, so derive `PartialEq` structurally.
pub trait Overlay: Any + fmt::Debug + PartialEq + Sized + 'static {
    /// Optional payload field folded into the compatibility key, for overlay
    /// types whose instances must not update each other's surfaces.
    fn compatibility_discriminant(&self) -> Option<&str> {
        None
    }

    /// Built-in factory used when no registry entry covers this type.
    fn default_factory() -> Option<Rc<dyn AnyOverlayFactory>> {
        None
    }
}

/// Type-erased overlay description used by the stack runtime.
pub trait AnyOverlay: fmt::Debug {
    fn overlay_type(&self) -> TypeId;

    fn type_label(&self) -> &'static str;

    fn discriminant(&self) -> Option<&str>;

    fn default_factory(&self) -> Option<Rc<dyn AnyOverlayFactory>>;

    /// Structural equality across the erasure boundary. Differing concrete
    /// types compare unequal.
    fn eq_overlay(&self, other: &dyn AnyOverlay) -> bool;

    /// The wrapped description value, for typed factory dispatch.
    fn as_any(&self) -> &dyn Any;
}

/// Boxed type-erased overlay description.
pub type DynOverlay = Box<dyn AnyOverlay>;

struct TypedOverlay<T: Overlay> {
    value: T,
}

impl<T: Overlay> fmt::Debug for TypedOverlay<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedOverlay")
            .field("type", &type_name::<T>())
            .field("value", &self.value)
            .finish()
    }
}

impl<T: Overlay> AnyOverlay for TypedOverlay<T> {
    fn overlay_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_label(&self) -> &'static str {
        type_name::<T>()
    }

    fn discriminant(&self) -> Option<&str> {
        self.value.compatibility_discriminant()
    }

    fn default_factory(&self) -> Option<Rc<dyn AnyOverlayFactory>> {
        T::default_factory()
    }

    fn eq_overlay(&self, other: &dyn AnyOverlay) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map(|value| *value == self.value)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        &self.value
    }
}

/// Convenience helper for hosts to erase a typed overlay description without
/// mentioning the internal wrapper type.
pub fn overlay<T: Overlay>(value: T) -> DynOverlay {
    Box::new(TypedOverlay { value })
}

/// Stable identifier for the compatibility class of an overlay description.
///
/// Used for runner matching and as the persistence index key. Two
/// descriptions yield the same key iff they are compatible for in-place
/// update.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompatibilityKey(String);

impl CompatibilityKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompatibilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the compatibility key for a description. Pure and deterministic:
/// the type label, plus the discriminant when the overlay provides one.
pub fn compatibility_key(overlay: &dyn AnyOverlay) -> CompatibilityKey {
    match overlay.discriminant() {
        Some(discriminant) => {
            CompatibilityKey(format!("{}:{}", overlay.type_label(), discriminant))
        }
        None => CompatibilityKey(overlay.type_label().to_string()),
    }
}
