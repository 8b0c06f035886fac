//! Scoped surface lifetimes derived from a parent lifetime.
//!
//! Each shown surface owns a [`ScopedLifetime`] bound to the surface's view
//! attachment signals. The parent lifetime is a non-owning back-reference,
//! resolved through a lookup function at attach time rather than captured at
//! bind time: the child never participates in the parent's ownership graph,
//! and a parent that no longer exists is treated as already terminated.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use scrim_core::{AttachmentEvent, ListenerHandle, ViewAnchor};

type ObserverCallback = Box<dyn FnMut()>;

/// Handle returned by [`Lifetime::on_terminated`], used to deregister the
/// observer. Observers registered on an already-terminated lifetime run
/// immediately and return an inert handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TerminationHandle(u64);

const INERT_HANDLE: TerminationHandle = TerminationHandle(0);

#[derive(Default)]
struct LifetimeInner {
    terminated: Cell<bool>,
    next_observer: Cell<u64>,
    observers: RefCell<Vec<(u64, ObserverCallback)>>,
}

/// A terminable lifecycle. Clones share state.
#[derive(Clone, Default)]
pub struct Lifetime {
    inner: Rc<LifetimeInner>,
}

impl Lifetime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.get()
    }

    /// Transitions to the terminal state, running every registered observer
    /// in registration order. Subsequent calls are no-ops.
    pub fn terminate(&self) {
        if self.inner.terminated.replace(true) {
            return;
        }
        let mut observers = self.inner.observers.take();
        for (_, observer) in observers.iter_mut() {
            observer();
        }
    }

    pub fn on_terminated(&self, observer: impl FnMut() + 'static) -> TerminationHandle {
        if self.is_terminated() {
            let mut observer = observer;
            observer();
            return INERT_HANDLE;
        }
        let id = self.inner.next_observer.get() + 1;
        self.inner.next_observer.set(id);
        self.inner
            .observers
            .borrow_mut()
            .push((id, Box::new(observer)));
        TerminationHandle(id)
    }

    pub fn remove_observer(&self, handle: TerminationHandle) {
        if handle == INERT_HANDLE {
            return;
        }
        self.inner
            .observers
            .borrow_mut()
            .retain(|(id, _)| *id != handle.0);
    }

    pub fn downgrade(&self) -> WeakLifetime {
        WeakLifetime {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Lifetime`]. A dead handle reads as terminated.
#[derive(Clone, Default)]
pub struct WeakLifetime {
    inner: Weak<LifetimeInner>,
}

impl WeakLifetime {
    pub fn upgrade(&self) -> Option<Lifetime> {
        self.inner.upgrade().map(|inner| Lifetime { inner })
    }

    pub fn is_terminated(&self) -> bool {
        self.upgrade().map_or(true, |lifetime| lifetime.is_terminated())
    }
}

struct ScopedInner {
    lifetime: Lifetime,
    anchor: ViewAnchor,
    anchor_listener: Cell<Option<ListenerHandle>>,
    parent_observer: RefCell<Option<(WeakLifetime, TerminationHandle)>>,
}

fn teardown(inner: &Rc<ScopedInner>) {
    if let Some((parent, handle)) = inner.parent_observer.borrow_mut().take() {
        if let Some(parent) = parent.upgrade() {
            parent.remove_observer(handle);
        }
    }
    if let Some(handle) = inner.anchor_listener.take() {
        inner.anchor.remove_listener(handle);
    }
    inner.lifetime.terminate();
}

/// The lifecycle of one shown surface, owned by exactly one surface runner.
///
/// Terminates when [`terminate`](ScopedLifetime::terminate) is called
/// explicitly, when the resolved parent lifetime terminates, or when the
/// surface's view detaches. A terminated scope never revives.
pub struct ScopedLifetime {
    inner: Rc<ScopedInner>,
}

impl ScopedLifetime {
    pub fn lifetime(&self) -> &Lifetime {
        &self.inner.lifetime
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.lifetime.is_terminated()
    }

    /// Terminates the scope, deregistering the parent observer and anchor
    /// listener first so neither can fire afterwards. Idempotent.
    pub fn terminate(&self) {
        teardown(&self.inner);
    }
}

/// Binds a new scoped lifetime to a surface's view anchor.
///
/// The parent is looked up lazily when the view attaches, since it may not
/// be resolvable earlier. Wiring, all one-directional parent→child:
/// - attach with a live parent: register a parent-termination observer that
///   tears the scope down;
/// - attach with a missing or terminated parent: tear down immediately;
/// - detach: deregister the parent observer (if any) and tear down; an
///   externally dismissed surface must not leave its observer registered on
///   the parent indefinitely;
/// - never attached: nothing was registered, nothing to clean up.
///
/// `on_terminated` fires exactly once, however termination is reached.
pub fn bind_surface_lifetime(
    anchor: &ViewAnchor,
    parent_lookup: Rc<dyn Fn() -> Option<Lifetime>>,
    on_terminated: impl FnOnce() + 'static,
) -> ScopedLifetime {
    let inner = Rc::new(ScopedInner {
        lifetime: Lifetime::new(),
        anchor: anchor.clone(),
        anchor_listener: Cell::new(None),
        parent_observer: RefCell::new(None),
    });

    let once = Cell::new(Some(Box::new(on_terminated) as Box<dyn FnOnce()>));
    inner.lifetime.on_terminated(move || {
        if let Some(callback) = once.take() {
            callback();
        }
    });

    let weak = Rc::downgrade(&inner);
    let handle = anchor.on_attachment_changed(move |event| {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        match event {
            AttachmentEvent::Attached => {
                if inner.lifetime.is_terminated() {
                    return;
                }
                match parent_lookup() {
                    Some(parent) if !parent.is_terminated() => {
                        let observer_target = weak.clone();
                        let handle = parent.on_terminated(move || {
                            if let Some(inner) = observer_target.upgrade() {
                                teardown(&inner);
                            }
                        });
                        *inner.parent_observer.borrow_mut() =
                            Some((parent.downgrade(), handle));
                    }
                    // A parent that cannot be resolved counts as already
                    // terminated.
                    _ => teardown(&inner),
                }
            }
            AttachmentEvent::Detached => teardown(&inner),
        }
    });
    inner.anchor_listener.set(Some(handle));

    ScopedLifetime { inner }
}
