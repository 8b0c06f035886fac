//! Native surface seam and view attachment signals.
//!
//! The stack never talks to platform dialog or window APIs directly. A
//! concrete surface implements [`NativeSurface`]; its host view layer drives
//! a [`ViewAnchor`], the generic model of the two platform-observable events
//! "entered the rendering tree" and "left the rendering tree". Lifecycle
//! plumbing registers on the anchor only after the first event and
//! deregisters on the second.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Transition reported to anchor listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentEvent {
    Attached,
    Detached,
}

type AttachmentListener = Box<dyn FnMut(AttachmentEvent)>;

/// Handle returned by [`ViewAnchor::on_attachment_changed`], used to
/// deregister the listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

#[derive(Default)]
struct AnchorInner {
    attached: Cell<bool>,
    next_listener: Cell<u64>,
    listeners: RefCell<Vec<(u64, Rc<RefCell<AttachmentListener>>)>>,
}

/// Attachment state of one surface's content view.
///
/// The host calls [`notify_attached`](ViewAnchor::notify_attached) /
/// [`notify_detached`](ViewAnchor::notify_detached) as the view enters and
/// leaves its rendering tree; only actual transitions dispatch events.
/// Clones share state.
#[derive(Clone, Default)]
pub struct ViewAnchor {
    inner: Rc<AnchorInner>,
}

impl ViewAnchor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.get()
    }

    pub fn notify_attached(&self) {
        if !self.inner.attached.replace(true) {
            self.dispatch(AttachmentEvent::Attached);
        }
    }

    pub fn notify_detached(&self) {
        if self.inner.attached.replace(false) {
            self.dispatch(AttachmentEvent::Detached);
        }
    }

    /// Registers a listener for future transitions. Listeners run in
    /// registration order and may deregister themselves (or others) while a
    /// dispatch is in flight; a listener removed mid-dispatch no longer runs.
    pub fn on_attachment_changed(
        &self,
        listener: impl FnMut(AttachmentEvent) + 'static,
    ) -> ListenerHandle {
        let id = self.inner.next_listener.get() + 1;
        self.inner.next_listener.set(id);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(RefCell::new(Box::new(listener)))));
        ListenerHandle(id)
    }

    pub fn remove_listener(&self, handle: ListenerHandle) {
        self.inner
            .listeners
            .borrow_mut()
            .retain(|(id, _)| *id != handle.0);
    }

    fn dispatch(&self, event: AttachmentEvent) {
        let snapshot: Vec<(u64, Rc<RefCell<AttachmentListener>>)> =
            self.inner.listeners.borrow().clone();
        for (id, listener) in snapshot {
            let still_registered = self
                .inner
                .listeners
                .borrow()
                .iter()
                .any(|(registered, _)| *registered == id);
            if still_registered {
                (listener.borrow_mut())(event);
            }
        }
    }
}

/// The concrete on-screen object built from an overlay description.
///
/// Implemented by the host's dialog/window integration; the stack only ever
/// shows, closes, and snapshots it.
pub trait NativeSurface: Any {
    /// Makes the surface visible. May be called repeatedly.
    fn show(&mut self);

    /// Closes the surface. Called at most once per surface by the stack.
    fn close(&mut self);

    /// Attachment signals for this surface's content view.
    fn anchor(&self) -> &ViewAnchor;

    /// Serializes the surface's current view state to an opaque blob.
    fn save_view_state(&self) -> Vec<u8>;

    /// Applies a previously saved view-state blob.
    fn restore_view_state(&mut self, state: &[u8]);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
