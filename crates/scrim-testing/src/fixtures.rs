//! Fixture overlay types used across the workspace's tests.

use std::rc::Rc;

use scrim_core::{
    overlay_factory, AnyOverlayFactory, FactoryRegistry, Overlay, OverlayEnvironment,
    OverlaySurfaceFactory, FACTORY_REGISTRY,
};

use crate::fake::{FactoryProbe, FakeFactory, FakeSurface, OverlayText};

/// Modal alert; all alerts are mutually compatible.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub message: String,
}

impl Overlay for Alert {}

impl OverlayText for Alert {
    fn text(&self) -> String {
        self.message.clone()
    }
}

/// Bottom sheet; a different compatibility class from [`Alert`].
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub title: String,
}

impl Overlay for Sheet {}

impl OverlayText for Sheet {
    fn text(&self) -> String {
        self.title.clone()
    }
}

/// Pane overlay using a compatibility discriminant: two panes with different
/// names must not update each other's surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedPane {
    pub pane: String,
    pub body: String,
}

impl Overlay for NamedPane {
    fn compatibility_discriminant(&self) -> Option<&str> {
        Some(&self.pane)
    }
}

impl OverlayText for NamedPane {
    fn text(&self) -> String {
        self.body.clone()
    }
}

/// Well-known overlay variant carrying its own default factory, so it
/// resolves without any registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub message: String,
}

struct ToastFactory;

impl OverlaySurfaceFactory for ToastFactory {
    type Overlay = Toast;
    type Surface = FakeSurface;

    fn build(&self, overlay: &Toast, _environment: &OverlayEnvironment) -> FakeSurface {
        let surface = FakeSurface::new();
        surface.probe().set_content(overlay.message.clone());
        surface
    }

    fn update(&self, surface: &mut FakeSurface, overlay: &Toast, _environment: &OverlayEnvironment) {
        surface.probe().set_content(overlay.message.clone());
    }
}

impl Overlay for Toast {
    fn default_factory() -> Option<Rc<dyn AnyOverlayFactory>> {
        Some(overlay_factory(ToastFactory))
    }
}

impl OverlayText for Toast {
    fn text(&self) -> String {
        self.message.clone()
    }
}

/// Environment carrying `registry` under the well-known key.
pub fn test_environment(registry: FactoryRegistry) -> OverlayEnvironment {
    OverlayEnvironment::new().with(&FACTORY_REGISTRY, registry)
}

/// Environment pre-loaded with counting factories for [`Alert`], [`Sheet`],
/// and [`NamedPane`], returned alongside their probes in that order.
pub fn fixture_environment() -> (OverlayEnvironment, FactoryProbe, FactoryProbe, FactoryProbe) {
    let (alert_factory, alert_probe) = FakeFactory::<Alert>::new();
    let (sheet_factory, sheet_probe) = FakeFactory::<Sheet>::new();
    let (pane_factory, pane_probe) = FakeFactory::<NamedPane>::new();
    let mut registry = FactoryRegistry::new();
    registry.register(alert_factory);
    registry.register(sheet_factory);
    registry.register(pane_factory);
    (
        test_environment(registry),
        alert_probe,
        sheet_probe,
        pane_probe,
    )
}
