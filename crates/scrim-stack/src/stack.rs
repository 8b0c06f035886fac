//! Positional reconciliation of overlay descriptions onto surface runners.
//!
//! On every update the stack walks the new description list left to right,
//! reusing the runner already at each position when it is compatible and
//! creating a fresh one otherwise. Matching is strictly positional: an
//! overlay that moved is a new occurrence, not a move, which keeps the pass
//! `O(n)` and unambiguous when the stack holds duplicate-typed overlays.
//! Already-created surfaces are never reordered; stacking order is list
//! order and nothing more.

use std::rc::Rc;

use scrim_core::{namespace_of, DynOverlay, OverlayEnvironment, SAVED_STATE_NAMESPACE};

use crate::lifetime::Lifetime;
use crate::persistence::SavedOverlayStack;
use crate::runner::SurfaceRunner;
use crate::StackError;

/// Ordered collection of surface runners kept in sync with the host's
/// overlay list.
pub struct OverlayStack {
    runners: Vec<SurfaceRunner>,
    // Derived per-position environments, valid for `outer_environment`.
    // Reusing them keeps an unchanged outer environment referentially
    // identical across passes, which runners rely on to skip redundant
    // factory updates.
    position_environments: Vec<OverlayEnvironment>,
    outer_environment: Option<OverlayEnvironment>,
    parent_lookup: Rc<dyn Fn() -> Option<Lifetime>>,
}

impl OverlayStack {
    /// `parent_lookup` resolves the parent lifetime for newly shown
    /// surfaces; it is consulted lazily, at attach time.
    pub fn new(parent_lookup: Rc<dyn Fn() -> Option<Lifetime>>) -> Self {
        Self {
            runners: Vec::new(),
            position_environments: Vec::new(),
            outer_environment: None,
            parent_lookup,
        }
    }

    /// Convenience constructor holding a non-owning reference to `parent`.
    pub fn rooted_at(parent: &Lifetime) -> Self {
        let weak = parent.downgrade();
        Self::new(Rc::new(move || weak.upgrade()))
    }

    /// Reconciles the stack against `overlays`, in ascending position order.
    ///
    /// `before_show` runs exactly once per newly created runner, after its
    /// surface is built and before it becomes visible, the host's chance to
    /// flush pending input that must not leak past a new overlay. Dropped
    /// runners are dismissed only after the whole pass resolves and the new
    /// list is in place, so a replacement is never preceded by its
    /// predecessor's teardown and detach-triggered callbacks cannot
    /// interleave with the positional pass.
    ///
    /// On a mid-pass error the previous list stays in place and surfaces
    /// created by the failing pass are closed; they have no other owner.
    pub fn update(
        &mut self,
        overlays: Vec<DynOverlay>,
        environment: &OverlayEnvironment,
        mut before_show: impl FnMut(),
    ) -> Result<(), StackError> {
        let outer_unchanged = self
            .outer_environment
            .as_ref()
            .is_some_and(|previous| previous.same_bindings(environment));
        if !outer_unchanged {
            self.position_environments.clear();
            self.outer_environment = Some(environment.clone());
        }
        let base = namespace_of(environment);
        let mut new_runners = Vec::with_capacity(overlays.len());
        let mut failure = None;
        for (position, overlay) in overlays.into_iter().enumerate() {
            // Each position gets its own namespace so nested persisted keys
            // never collide, even for duplicate-typed overlays.
            let position_environment = match self.position_environments.get(position) {
                Some(derived) => derived.clone(),
                None => {
                    let derived =
                        environment.with(&SAVED_STATE_NAMESPACE, format!("{base}+{position}"));
                    self.position_environments.push(derived.clone());
                    derived
                }
            };
            // A dismissed runner cannot show its surface again; only live
            // runners are reusable.
            let reusable = self
                .runners
                .get(position)
                .filter(|runner| runner.is_active() && runner.can_accept(overlay.as_ref()))
                .cloned();
            let step = match reusable {
                Some(runner) => runner
                    .update(overlay, &position_environment)
                    .map(|()| runner),
                None => SurfaceRunner::new(overlay, &position_environment).map(|runner| {
                    runner.ensure_shown(self.parent_lookup.clone(), || before_show());
                    runner
                }),
            };
            match step {
                Ok(runner) => new_runners.push(runner),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if let Some(err) = failure {
            for runner in new_runners {
                let reused = self
                    .runners
                    .iter()
                    .any(|current| current.same_runner(&runner));
                if !reused {
                    runner.dismiss();
                }
            }
            return Err(err);
        }

        let old_runners = std::mem::replace(&mut self.runners, new_runners);
        for runner in old_runners {
            let carried_forward = self
                .runners
                .iter()
                .any(|current| current.same_runner(&runner));
            if !carried_forward {
                runner.dismiss();
            }
        }
        Ok(())
    }

    /// True while any runner holds a live, undismissed surface.
    pub fn has_active_surfaces(&self) -> bool {
        self.runners.iter().any(SurfaceRunner::is_active)
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    /// Snapshots every built surface's view state, in stack order. Runners
    /// that never built a surface contribute no entry.
    pub fn save_instance_state(&self) -> SavedOverlayStack {
        SavedOverlayStack {
            entries: self
                .runners
                .iter()
                .filter_map(SurfaceRunner::save)
                .collect(),
        }
    }

    /// Applies a snapshot positionally. Proceeds only when the entry count
    /// matches the runner count: a changed overlay count between save and
    /// restore makes positional restoration unsafe, so the whole snapshot is
    /// discarded instead. Each entry is still key-checked by its runner.
    pub fn restore_instance_state(&mut self, saved: &SavedOverlayStack) {
        if saved.entries.len() != self.runners.len() {
            log::warn!(
                "discarding persisted overlay state: {} entries for {} runners",
                saved.entries.len(),
                self.runners.len()
            );
            return;
        }
        for (runner, entry) in self.runners.iter().zip(&saved.entries) {
            runner.restore(entry);
        }
    }

    /// Tears down every runner. The host container's teardown path.
    pub fn dismiss_all(&mut self) {
        for runner in self.runners.drain(..) {
            runner.dismiss();
        }
    }
}

impl std::fmt::Debug for OverlayStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayStack")
            .field("runners", &self.runners)
            .finish()
    }
}
