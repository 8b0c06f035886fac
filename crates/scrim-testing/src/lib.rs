//! Testing utilities and fixtures for Scrim-RS
//!
//! Fake surfaces and factories record what the stack does to them through
//! `Rc`-shared probes, so tests keep observing a surface after ownership
//! moves into the stack.

pub mod fake;
pub mod fixtures;

pub use fake::{FactoryProbe, FakeFactory, FakeSurface, OverlayText, SurfaceProbe};
pub use fixtures::{fixture_environment, test_environment, Alert, NamedPane, Sheet, Toast};

pub mod prelude {
    pub use crate::fake::*;
    pub use crate::fixtures::*;
}
