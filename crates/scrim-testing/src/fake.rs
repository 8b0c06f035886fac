//! Fake native surfaces and counting factories.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

use scrim_core::{
    namespace_of, NativeSurface, Overlay, OverlayEnvironment, OverlaySurfaceFactory, ViewAnchor,
};

/// Overlay fixtures expose a single line of text for fakes to render.
pub trait OverlayText: Overlay {
    fn text(&self) -> String;
}

#[derive(Default)]
struct SurfaceProbeInner {
    show_count: Cell<usize>,
    close_count: Cell<usize>,
    content: RefCell<String>,
    view_state: RefCell<String>,
    namespace: RefCell<String>,
    anchor: ViewAnchor,
}

/// Shared handle observing one [`FakeSurface`] from outside the stack.
///
/// `content` is what the factory last rendered; `view_state` is the scratch
/// the "user" mutates, and is what save/restore round-trips.
#[derive(Clone, Default)]
pub struct SurfaceProbe {
    inner: Rc<SurfaceProbeInner>,
}

impl SurfaceProbe {
    pub fn show_count(&self) -> usize {
        self.inner.show_count.get()
    }

    pub fn close_count(&self) -> usize {
        self.inner.close_count.get()
    }

    pub fn content(&self) -> String {
        self.inner.content.borrow().clone()
    }

    pub fn view_state(&self) -> String {
        self.inner.view_state.borrow().clone()
    }

    pub fn set_view_state(&self, value: impl Into<String>) {
        *self.inner.view_state.borrow_mut() = value.into();
    }

    pub(crate) fn set_content(&self, value: String) {
        *self.inner.content.borrow_mut() = value;
    }

    pub fn namespace(&self) -> String {
        self.inner.namespace.borrow().clone()
    }

    pub fn anchor(&self) -> &ViewAnchor {
        &self.inner.anchor
    }

    pub fn is_attached(&self) -> bool {
        self.inner.anchor.is_attached()
    }
}

/// In-memory [`NativeSurface`] whose whole observable behaviour is recorded
/// on its [`SurfaceProbe`].
pub struct FakeSurface {
    probe: SurfaceProbe,
    attach_on_show: bool,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self {
            probe: SurfaceProbe::default(),
            attach_on_show: true,
        }
    }

    /// Disables the show-attaches-the-view shortcut so a test can drive the
    /// anchor by hand.
    pub fn manual_attachment(mut self) -> Self {
        self.attach_on_show = false;
        self
    }

    pub fn probe(&self) -> SurfaceProbe {
        self.probe.clone()
    }
}

impl Default for FakeSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeSurface for FakeSurface {
    fn show(&mut self) {
        self.probe.inner.show_count.set(self.probe.show_count() + 1);
        if self.attach_on_show {
            self.probe.inner.anchor.notify_attached();
        }
    }

    fn close(&mut self) {
        self.probe
            .inner
            .close_count
            .set(self.probe.close_count() + 1);
        self.probe.inner.anchor.notify_detached();
    }

    fn anchor(&self) -> &ViewAnchor {
        &self.probe.inner.anchor
    }

    fn save_view_state(&self) -> Vec<u8> {
        self.probe.inner.view_state.borrow().clone().into_bytes()
    }

    fn restore_view_state(&mut self, state: &[u8]) {
        *self.probe.inner.view_state.borrow_mut() = String::from_utf8_lossy(state).into_owned();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Default)]
struct FactoryProbeInner {
    built: Cell<usize>,
    updated: Cell<usize>,
    attach_on_show: Cell<bool>,
    surfaces: RefCell<Vec<SurfaceProbe>>,
}

/// Shared handle counting what one [`FakeFactory`] built and updated.
#[derive(Clone)]
pub struct FactoryProbe {
    inner: Rc<FactoryProbeInner>,
}

impl FactoryProbe {
    fn new() -> Self {
        let inner = FactoryProbeInner::default();
        inner.attach_on_show.set(true);
        Self {
            inner: Rc::new(inner),
        }
    }

    pub fn built(&self) -> usize {
        self.inner.built.get()
    }

    pub fn updated(&self) -> usize {
        self.inner.updated.get()
    }

    /// Probe of the `index`-th surface this factory built, in build order.
    pub fn surface(&self, index: usize) -> Option<SurfaceProbe> {
        self.inner.surfaces.borrow().get(index).cloned()
    }

    pub fn last_surface(&self) -> Option<SurfaceProbe> {
        self.inner.surfaces.borrow().last().cloned()
    }

    /// Built surfaces will no longer self-attach on `show`; tests drive the
    /// anchor directly.
    pub fn set_manual_attachment(&self) {
        self.inner.attach_on_show.set(false);
    }
}

/// Counting factory for any [`OverlayText`] fixture overlay.
pub struct FakeFactory<T> {
    probe: FactoryProbe,
    _marker: PhantomData<fn() -> T>,
}

impl<T: OverlayText> FakeFactory<T> {
    pub fn new() -> (Self, FactoryProbe) {
        let probe = FactoryProbe::new();
        (
            Self {
                probe: probe.clone(),
                _marker: PhantomData,
            },
            probe,
        )
    }
}

impl<T: OverlayText> OverlaySurfaceFactory for FakeFactory<T> {
    type Overlay = T;
    type Surface = FakeSurface;

    fn build(&self, overlay: &T, environment: &OverlayEnvironment) -> FakeSurface {
        let mut surface = FakeSurface::new();
        if !self.probe.inner.attach_on_show.get() {
            surface = surface.manual_attachment();
        }
        *surface.probe.inner.content.borrow_mut() = overlay.text();
        *surface.probe.inner.namespace.borrow_mut() = namespace_of(environment);
        self.probe.inner.built.set(self.probe.built() + 1);
        self.probe
            .inner
            .surfaces
            .borrow_mut()
            .push(surface.probe());
        surface
    }

    fn update(&self, surface: &mut FakeSurface, overlay: &T, environment: &OverlayEnvironment) {
        self.probe.inner.updated.set(self.probe.updated() + 1);
        *surface.probe.inner.content.borrow_mut() = overlay.text();
        *surface.probe.inner.namespace.borrow_mut() = namespace_of(environment);
    }
}
