#![doc = r"Overlay model and host seams for the Scrim-RS overlay stack."]

pub mod environment;
pub mod factory;
pub mod overlay;
pub mod surface;

pub use environment::{
    namespace_of, EnvironmentKey, OverlayEnvironment, FACTORY_REGISTRY, SAVED_STATE_NAMESPACE,
};
pub use factory::{
    overlay_factory, resolve, AnyOverlayFactory, FactoryRegistry, OverlaySurfaceFactory,
    ResolutionError,
};
pub use overlay::{compatibility_key, overlay, AnyOverlay, CompatibilityKey, DynOverlay, Overlay};
pub use surface::{AttachmentEvent, ListenerHandle, NativeSurface, ViewAnchor};
