#![doc = r"Overlay stack runtime: surface runners, reconciliation, lifetimes, persistence."]

pub mod lifetime;
pub mod persistence;
pub mod runner;
pub mod stack;

pub use lifetime::{
    bind_surface_lifetime, Lifetime, ScopedLifetime, TerminationHandle, WeakLifetime,
};
pub use persistence::{decode, encode, CodecError, PersistedEntry, SavedOverlayStack};
pub use runner::SurfaceRunner;
pub use stack::OverlayStack;

use std::fmt;

use scrim_core::{CompatibilityKey, ResolutionError};

/// Failures surfaced by stack updates.
///
/// `NoFactory` is a configuration error the host must fix by registering the
/// missing factory. `IncompatibleUpdate` is a precondition violation: the
/// reconciler checks `can_accept` before updating a runner, so hitting it
/// indicates a bug in the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    NoFactory(ResolutionError),
    IncompatibleUpdate {
        current: CompatibilityKey,
        offered: CompatibilityKey,
    },
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::NoFactory(err) => err.fmt(f),
            StackError::IncompatibleUpdate { current, offered } => write!(
                f,
                "incompatible overlay update: runner shows {current}, offered {offered}"
            ),
        }
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StackError::NoFactory(err) => Some(err),
            StackError::IncompatibleUpdate { .. } => None,
        }
    }
}

impl From<ResolutionError> for StackError {
    fn from(err: ResolutionError) -> Self {
        StackError::NoFactory(err)
    }
}
