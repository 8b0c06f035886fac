//! Overlay surface factories and their resolution.
//!
//! A factory is the capability record `{build, update}` for one concrete
//! overlay type. Hosts register typed [`OverlaySurfaceFactory`]
//! implementations in a [`FactoryRegistry`]; the stack resolves through the
//! registry carried in the environment, falling back to the overlay type's
//! own default factory for well-known variants. Resolution failure is a
//! configuration error surfaced to the caller, never retried.

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::environment::{OverlayEnvironment, FACTORY_REGISTRY};
use crate::overlay::{AnyOverlay, Overlay};
use crate::surface::NativeSurface;

/// Strongly typed factory that can build and update surfaces for one overlay
/// type.
pub trait OverlaySurfaceFactory: 'static {
    type Overlay: Overlay;
    type Surface: NativeSurface;

    /// Builds a new, not-yet-visible surface for `overlay`.
    fn build(&self, overlay: &Self::Overlay, environment: &OverlayEnvironment) -> Self::Surface;

    /// Updates an existing surface in place. Called whenever the overlay or
    /// environment changed; must tolerate semantically identical values.
    fn update(
        &self,
        surface: &mut Self::Surface,
        overlay: &Self::Overlay,
        environment: &OverlayEnvironment,
    );
}

/// Type-erased factory used by the stack runtime to drive surfaces of mixed
/// overlay types.
pub trait AnyOverlayFactory: fmt::Debug {
    fn overlay_type(&self) -> TypeId;

    fn build_surface(
        &self,
        overlay: &dyn AnyOverlay,
        environment: &OverlayEnvironment,
    ) -> Box<dyn NativeSurface>;

    fn update_surface(
        &self,
        surface: &mut dyn NativeSurface,
        overlay: &dyn AnyOverlay,
        environment: &OverlayEnvironment,
    );
}

struct TypedOverlayFactory<F: OverlaySurfaceFactory> {
    factory: F,
}

impl<F: OverlaySurfaceFactory> fmt::Debug for TypedOverlayFactory<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedOverlayFactory")
            .field("overlay", &std::any::type_name::<F::Overlay>())
            .finish()
    }
}

impl<F> AnyOverlayFactory for TypedOverlayFactory<F>
where
    F: OverlaySurfaceFactory,
{
    fn overlay_type(&self) -> TypeId {
        TypeId::of::<F::Overlay>()
    }

    fn build_surface(
        &self,
        overlay: &dyn AnyOverlay,
        environment: &OverlayEnvironment,
    ) -> Box<dyn NativeSurface> {
        let typed = overlay
            .as_any()
            .downcast_ref::<F::Overlay>()
            .expect("overlay type mismatch");
        Box::new(self.factory.build(typed, environment))
    }

    fn update_surface(
        &self,
        surface: &mut dyn NativeSurface,
        overlay: &dyn AnyOverlay,
        environment: &OverlayEnvironment,
    ) {
        let typed_overlay = overlay
            .as_any()
            .downcast_ref::<F::Overlay>()
            .expect("overlay type mismatch");
        let typed_surface = surface
            .as_any_mut()
            .downcast_mut::<F::Surface>()
            .expect("surface type mismatch");
        self.factory.update(typed_surface, typed_overlay, environment);
    }
}

/// Erases a typed factory without mentioning the internal wrapper type.
pub fn overlay_factory<F: OverlaySurfaceFactory>(factory: F) -> Rc<dyn AnyOverlayFactory> {
    Rc::new(TypedOverlayFactory { factory })
}

/// Registry mapping concrete overlay types to their factories.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<TypeId, Rc<dyn AnyOverlayFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` for its overlay type, replacing any previous
    /// registration for that type.
    pub fn register<F: OverlaySurfaceFactory>(&mut self, factory: F) {
        self.factories
            .insert(TypeId::of::<F::Overlay>(), overlay_factory(factory));
    }

    /// Registers an already-erased factory under an explicit overlay type.
    pub fn register_erased(&mut self, overlay_type: TypeId, factory: Rc<dyn AnyOverlayFactory>) {
        self.factories.insert(overlay_type, factory);
    }

    pub fn lookup(&self, overlay_type: TypeId) -> Option<Rc<dyn AnyOverlayFactory>> {
        self.factories.get(&overlay_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("registered", &self.factories.len())
            .finish()
    }
}

/// Missing factory registration for an overlay type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    pub overlay: &'static str,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no overlay surface factory registered for {}",
            self.overlay
        )
    }
}

impl std::error::Error for ResolutionError {}

/// Resolves the factory responsible for `overlay`: the registry carried in
/// `environment` first, then the overlay type's default factory.
pub fn resolve(
    overlay: &dyn AnyOverlay,
    environment: &OverlayEnvironment,
) -> Result<Rc<dyn AnyOverlayFactory>, ResolutionError> {
    if let Some(registry) = environment.get(&FACTORY_REGISTRY) {
        if let Some(factory) = registry.lookup(overlay.overlay_type()) {
            return Ok(factory);
        }
    }
    if let Some(factory) = overlay.default_factory() {
        return Ok(factory);
    }
    Err(ResolutionError {
        overlay: overlay.type_label(),
    })
}
