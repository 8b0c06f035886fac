//! One live native surface paired with its overlay description.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use scrim_core::{
    compatibility_key, resolve, AnyOverlay, AnyOverlayFactory, CompatibilityKey, DynOverlay,
    NativeSurface, OverlayEnvironment,
};

use crate::lifetime::{bind_surface_lifetime, Lifetime, ScopedLifetime};
use crate::persistence::PersistedEntry;
use crate::StackError;

struct RunnerInner {
    factory: Rc<dyn AnyOverlayFactory>,
    overlay: RefCell<DynOverlay>,
    environment: RefCell<OverlayEnvironment>,
    surface: RefCell<Option<Box<dyn NativeSurface>>>,
    scoped: RefCell<Option<ScopedLifetime>>,
    pending_restore: RefCell<Option<Vec<u8>>>,
    dismissed: Cell<bool>,
}

/// Owns exactly one native surface, created lazily on first show.
///
/// Clones are handles to the same runner; identity for the reconciler's
/// carried-forward check is the runner object itself
/// ([`same_runner`](SurfaceRunner::same_runner)), not its key.
#[derive(Clone)]
pub struct SurfaceRunner {
    inner: Rc<RunnerInner>,
}

impl SurfaceRunner {
    /// Creates a runner for `overlay`, resolving its factory once. Fails if
    /// no factory is registered and the overlay type has no default.
    pub fn new(overlay: DynOverlay, environment: &OverlayEnvironment) -> Result<Self, StackError> {
        let factory = resolve(overlay.as_ref(), environment)?;
        log::trace!("new surface runner for {}", overlay.type_label());
        Ok(Self {
            inner: Rc::new(RunnerInner {
                factory,
                overlay: RefCell::new(overlay),
                environment: RefCell::new(environment.clone()),
                surface: RefCell::new(None),
                scoped: RefCell::new(None),
                pending_restore: RefCell::new(None),
                dismissed: Cell::new(false),
            }),
        })
    }

    pub fn compatibility_key(&self) -> CompatibilityKey {
        compatibility_key(self.inner.overlay.borrow().as_ref())
    }

    /// True iff `overlay` may update this runner's surface in place. Pure.
    pub fn can_accept(&self, overlay: &dyn AnyOverlay) -> bool {
        self.compatibility_key() == compatibility_key(overlay)
    }

    /// Replaces the current description and environment, updating the live
    /// surface if one exists.
    ///
    /// Referentially idempotent: when the overlay value compares equal and
    /// the environment is the very same binding map, the factory is not
    /// invoked. An environment rebound in any key reaches the factory; the
    /// reconciler keeps unchanged environments referentially identical.
    /// Requires `can_accept(overlay)`; the reconciler checks before calling,
    /// so `IncompatibleUpdate` indicates a caller bug.
    pub fn update(
        &self,
        overlay: DynOverlay,
        environment: &OverlayEnvironment,
    ) -> Result<(), StackError> {
        if !self.can_accept(overlay.as_ref()) {
            return Err(StackError::IncompatibleUpdate {
                current: self.compatibility_key(),
                offered: compatibility_key(overlay.as_ref()),
            });
        }
        let unchanged = self.inner.overlay.borrow().eq_overlay(overlay.as_ref())
            && self.inner.environment.borrow().same_bindings(environment);
        *self.inner.overlay.borrow_mut() = overlay;
        *self.inner.environment.borrow_mut() = environment.clone();
        if unchanged {
            return Ok(());
        }
        let overlay_ref = self.inner.overlay.borrow();
        let environment_ref = self.inner.environment.borrow();
        if let Some(surface) = self.inner.surface.borrow_mut().as_deref_mut() {
            self.inner
                .factory
                .update_surface(surface, overlay_ref.as_ref(), &environment_ref);
        }
        Ok(())
    }

    /// Builds the surface on first call, binds its scoped lifetime rooted at
    /// the looked-up parent, and shows it. `before_show` runs only on the
    /// building call, after the surface exists and before it is visible.
    pub fn ensure_shown(
        &self,
        parent_lookup: Rc<dyn Fn() -> Option<Lifetime>>,
        before_show: impl FnOnce(),
    ) {
        if self.inner.dismissed.get() {
            return;
        }
        let mut built_anchor = None;
        {
            let mut slot = self.inner.surface.borrow_mut();
            if slot.is_none() {
                let overlay = self.inner.overlay.borrow();
                let environment = self.inner.environment.borrow();
                let mut surface = self
                    .inner
                    .factory
                    .build_surface(overlay.as_ref(), &environment);
                if let Some(state) = self.inner.pending_restore.borrow_mut().take() {
                    surface.restore_view_state(&state);
                }
                built_anchor = Some(surface.anchor().clone());
                *slot = Some(surface);
            }
        }
        if let Some(anchor) = built_anchor {
            before_show();
            let weak = Rc::downgrade(&self.inner);
            let scoped = bind_surface_lifetime(&anchor, parent_lookup, move || {
                if let Some(inner) = weak.upgrade() {
                    SurfaceRunner { inner }.dismiss();
                }
            });
            *self.inner.scoped.borrow_mut() = Some(scoped);
        }
        // show() can re-enter dismiss() through the attachment callbacks when
        // the parent is already gone, so the surface is taken out of its slot
        // for the call instead of shown under a live borrow.
        let taken = self.inner.surface.borrow_mut().take();
        if let Some(mut surface) = taken {
            surface.show();
            if self.inner.dismissed.get() {
                surface.close();
            } else {
                *self.inner.surface.borrow_mut() = Some(surface);
            }
        }
    }

    /// Terminates the scoped lifetime, then closes the surface. Idempotent;
    /// a runner that never built a surface just goes inert.
    pub fn dismiss(&self) {
        if self.inner.dismissed.replace(true) {
            return;
        }
        let scoped = self.inner.scoped.borrow_mut().take();
        if let Some(scoped) = scoped {
            scoped.terminate();
        }
        if let Some(surface) = self.inner.surface.borrow_mut().as_deref_mut() {
            log::trace!("dismissing surface for {}", self.compatibility_key());
            surface.close();
        }
    }

    /// `None` until a surface has been built.
    pub fn save(&self) -> Option<PersistedEntry> {
        let surface = self.inner.surface.borrow();
        surface
            .as_ref()
            .map(|surface| PersistedEntry::new(self.compatibility_key(), surface.save_view_state()))
    }

    /// Applies `entry` only when its key matches this runner's current key;
    /// a stale entry is skipped silently. If the surface is not built yet,
    /// the blob is held and applied right after the first build.
    pub fn restore(&self, entry: &PersistedEntry) {
        let key = self.compatibility_key();
        if entry.key != key {
            log::debug!(
                "skipping stale persisted entry: runner shows {key}, entry is {}",
                entry.key
            );
            return;
        }
        let mut surface = self.inner.surface.borrow_mut();
        match surface.as_deref_mut() {
            Some(surface) => surface.restore_view_state(&entry.view_state),
            None => *self.inner.pending_restore.borrow_mut() = Some(entry.view_state.clone()),
        }
    }

    /// True while the runner holds a live, undismissed surface.
    pub fn is_active(&self) -> bool {
        !self.inner.dismissed.get() && self.inner.surface.borrow().is_some()
    }

    pub fn has_surface(&self) -> bool {
        self.inner.surface.borrow().is_some()
    }

    /// Object identity, independent of compatibility keys.
    pub fn same_runner(&self, other: &SurfaceRunner) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SurfaceRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceRunner")
            .field("key", &self.compatibility_key())
            .field("has_surface", &self.has_surface())
            .field("dismissed", &self.inner.dismissed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrim_core::{overlay, EnvironmentKey};
    use scrim_testing::{fixture_environment, Alert, Sheet};

    fn root_lookup(parent: &Lifetime) -> Rc<dyn Fn() -> Option<Lifetime>> {
        let weak = parent.downgrade();
        Rc::new(move || weak.upgrade())
    }

    #[test]
    fn update_on_incompatible_runner_is_a_precondition_violation() {
        let (env, _alerts, _sheets, _panes) = fixture_environment();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();
        let err = runner
            .update(overlay(Sheet { title: "s".into() }), &env)
            .unwrap_err();
        assert!(matches!(err, StackError::IncompatibleUpdate { .. }));
    }

    #[test]
    fn surface_is_built_once_and_reshown() {
        let (env, alerts, _sheets, _panes) = fixture_environment();
        let parent = Lifetime::new();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();
        assert!(!runner.has_surface());

        runner.ensure_shown(root_lookup(&parent), || {});
        runner.ensure_shown(root_lookup(&parent), || {});
        assert_eq!(alerts.built(), 1);
        assert_eq!(alerts.surface(0).unwrap().show_count(), 2);
    }

    #[test]
    fn before_show_runs_only_on_the_building_call() {
        let (env, _alerts, _sheets, _panes) = fixture_environment();
        let parent = Lifetime::new();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();
        let calls = Rc::new(Cell::new(0u32));

        let sink = calls.clone();
        runner.ensure_shown(root_lookup(&parent), move || sink.set(sink.get() + 1));
        let sink = calls.clone();
        runner.ensure_shown(root_lookup(&parent), move || sink.set(sink.get() + 1));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn identical_update_skips_the_factory() {
        let (env, alerts, _sheets, _panes) = fixture_environment();
        let parent = Lifetime::new();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();
        runner.ensure_shown(root_lookup(&parent), || {});

        runner
            .update(overlay(Alert { message: "b".into() }), &env)
            .unwrap();
        assert_eq!(alerts.updated(), 1);
        runner
            .update(overlay(Alert { message: "b".into() }), &env)
            .unwrap();
        assert_eq!(alerts.updated(), 1);
        runner
            .update(overlay(Alert { message: "c".into() }), &env)
            .unwrap();
        assert_eq!(alerts.updated(), 2);
    }

    #[test]
    fn rebound_environment_reaches_the_factory() {
        let (env, alerts, _sheets, _panes) = fixture_environment();
        let parent = Lifetime::new();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();
        runner.ensure_shown(root_lookup(&parent), || {});
        assert_eq!(alerts.updated(), 0);

        // Equal overlay, but the environment gained a binding outside the
        // saved-state namespace; the surface must still hear about it.
        let theme = EnvironmentKey::<String>::new("theme");
        runner
            .update(
                overlay(Alert { message: "a".into() }),
                &env.with(&theme, "dark".to_string()),
            )
            .unwrap();
        assert_eq!(alerts.updated(), 1);
    }

    #[test]
    fn save_is_none_until_built() {
        let (env, _alerts, _sheets, _panes) = fixture_environment();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();
        assert!(runner.save().is_none());

        let parent = Lifetime::new();
        runner.ensure_shown(root_lookup(&parent), || {});
        let entry = runner.save().unwrap();
        assert_eq!(entry.key, runner.compatibility_key());
    }

    #[test]
    fn restore_with_mismatched_key_is_skipped() {
        let (env, alerts, _sheets, _panes) = fixture_environment();
        let parent = Lifetime::new();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();
        runner.ensure_shown(root_lookup(&parent), || {});
        alerts.surface(0).unwrap().set_view_state("typed");

        runner.restore(&PersistedEntry::new(
            CompatibilityKey::new("something else"),
            b"other".to_vec(),
        ));
        assert_eq!(alerts.surface(0).unwrap().view_state(), "typed");
    }

    #[test]
    fn restore_before_build_applies_after_build() {
        let (env, alerts, _sheets, _panes) = fixture_environment();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();
        runner.restore(&PersistedEntry::new(
            runner.compatibility_key(),
            b"draft".to_vec(),
        ));

        let parent = Lifetime::new();
        runner.ensure_shown(root_lookup(&parent), || {});
        assert_eq!(alerts.surface(0).unwrap().view_state(), "draft");
    }

    #[test]
    fn dismiss_is_idempotent_and_closes_once() {
        let (env, alerts, _sheets, _panes) = fixture_environment();
        let parent = Lifetime::new();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();
        runner.ensure_shown(root_lookup(&parent), || {});

        runner.dismiss();
        runner.dismiss();
        assert_eq!(alerts.surface(0).unwrap().close_count(), 1);
        assert!(!runner.is_active());
    }

    #[test]
    fn dismiss_without_surface_is_a_no_op() {
        let (env, alerts, _sheets, _panes) = fixture_environment();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();
        runner.dismiss();
        assert_eq!(alerts.built(), 0);
    }

    #[test]
    fn parent_termination_dismisses_the_shown_surface() {
        let (env, alerts, _sheets, _panes) = fixture_environment();
        let parent = Lifetime::new();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();
        runner.ensure_shown(root_lookup(&parent), || {});
        assert!(alerts.surface(0).unwrap().is_attached());

        parent.terminate();
        assert_eq!(alerts.surface(0).unwrap().close_count(), 1);
        assert!(!runner.is_active());
    }

    #[test]
    fn show_into_terminated_parent_dismisses_immediately() {
        let (env, alerts, _sheets, _panes) = fixture_environment();
        let parent = Lifetime::new();
        parent.terminate();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();

        runner.ensure_shown(root_lookup(&parent), || {});
        assert!(!runner.is_active());
        assert_eq!(alerts.surface(0).unwrap().show_count(), 1);
        assert_eq!(alerts.surface(0).unwrap().close_count(), 1);
    }

    #[test]
    fn external_detach_dismisses_the_runner() {
        let (env, alerts, _sheets, _panes) = fixture_environment();
        let parent = Lifetime::new();
        let runner = SurfaceRunner::new(overlay(Alert { message: "a".into() }), &env).unwrap();
        runner.ensure_shown(root_lookup(&parent), || {});

        // The host tears the view out without going through dismiss.
        alerts.surface(0).unwrap().anchor().notify_detached();
        assert!(!runner.is_active());
        assert_eq!(alerts.surface(0).unwrap().close_count(), 1);

        // The parent observer is gone; terminating the parent changes
        // nothing further.
        parent.terminate();
        assert_eq!(alerts.surface(0).unwrap().close_count(), 1);
    }
}
