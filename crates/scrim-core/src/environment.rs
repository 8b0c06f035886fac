//! Extensible environment passed alongside overlay descriptions.
//!
//! An [`OverlayEnvironment`] is an immutable key/value map. Deriving a new
//! environment with [`OverlayEnvironment::with`] never mutates the original,
//! so a reconciler can hand each stack position its own variant cheaply. The
//! stack uses two well-known keys: [`SAVED_STATE_NAMESPACE`] to keep nested
//! persistence keys from colliding across positions, and [`FACTORY_REGISTRY`]
//! to carry the capability registry used for factory resolution.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use once_cell::sync::Lazy;

use crate::factory::FactoryRegistry;

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);

fn next_key_id() -> u64 {
    NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed)
}

/// Typed handle identifying one environment entry.
///
/// Keys are process-unique; two keys created with the same name are still
/// distinct entries.
pub struct EnvironmentKey<T> {
    id: u64,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> EnvironmentKey<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            id: next_key_id(),
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for EnvironmentKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentKey")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Namespace prefix for persisted view-state keys. The reconciler appends a
/// positional marker per stack slot.
pub static SAVED_STATE_NAMESPACE: Lazy<EnvironmentKey<String>> =
    Lazy::new(|| EnvironmentKey::new("saved_state_namespace"));

/// The registry of overlay surface factories available to the stack.
pub static FACTORY_REGISTRY: Lazy<EnvironmentKey<FactoryRegistry>> =
    Lazy::new(|| EnvironmentKey::new("overlay_factory_registry"));

struct EnvEntry {
    name: &'static str,
    value: Rc<dyn Any>,
}

/// Immutable, cheaply clonable key/value environment.
#[derive(Clone, Default)]
pub struct OverlayEnvironment {
    values: Rc<HashMap<u64, EnvEntry>>,
}

impl OverlayEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a derived environment with `key` bound to `value`, shadowing
    /// any previous binding.
    pub fn with<T: 'static>(&self, key: &EnvironmentKey<T>, value: T) -> Self {
        let mut values: HashMap<u64, EnvEntry> = self
            .values
            .iter()
            .map(|(id, entry)| {
                (
                    *id,
                    EnvEntry {
                        name: entry.name,
                        value: entry.value.clone(),
                    },
                )
            })
            .collect();
        values.insert(
            key.id,
            EnvEntry {
                name: key.name,
                value: Rc::new(value),
            },
        );
        Self {
            values: Rc::new(values),
        }
    }

    pub fn get<T: 'static>(&self, key: &EnvironmentKey<T>) -> Option<Rc<T>> {
        self.values
            .get(&key.id)
            .map(|entry| entry.value.clone())
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn contains<T: 'static>(&self, key: &EnvironmentKey<T>) -> bool {
        self.values.contains_key(&key.id)
    }

    /// True when both handles share the same underlying binding map.
    /// Identity, not structural equality: any `with` yields a map for which
    /// this is false against the original.
    pub fn same_bindings(&self, other: &OverlayEnvironment) -> bool {
        Rc::ptr_eq(&self.values, &other.values)
    }
}

impl fmt::Debug for OverlayEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&'static str> =
            self.values.values().map(|entry| entry.name).collect();
        names.sort_unstable();
        f.debug_struct("OverlayEnvironment")
            .field("keys", &names)
            .finish()
    }
}

/// The current saved-state namespace, or the empty string when unset.
pub fn namespace_of(environment: &OverlayEnvironment) -> String {
    environment
        .get(&SAVED_STATE_NAMESPACE)
        .map(|namespace| (*namespace).clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_environment_shadows_without_mutating() {
        let key = EnvironmentKey::<u32>::new("count");
        let base = OverlayEnvironment::new().with(&key, 1);
        let derived = base.with(&key, 2);
        assert_eq!(base.get(&key).as_deref(), Some(&1));
        assert_eq!(derived.get(&key).as_deref(), Some(&2));
    }

    #[test]
    fn keys_with_same_name_are_distinct() {
        let a = EnvironmentKey::<u32>::new("shared");
        let b = EnvironmentKey::<u32>::new("shared");
        let env = OverlayEnvironment::new().with(&a, 7);
        assert!(env.get(&b).is_none());
    }

    #[test]
    fn same_bindings_is_identity_not_equality() {
        let key = EnvironmentKey::<u32>::new("count");
        let base = OverlayEnvironment::new().with(&key, 1);
        let alias = base.clone();
        let rebuilt = OverlayEnvironment::new().with(&key, 1);
        assert!(base.same_bindings(&alias));
        assert!(!base.same_bindings(&rebuilt));
    }

    #[test]
    fn missing_namespace_is_empty() {
        assert_eq!(namespace_of(&OverlayEnvironment::new()), "");
    }

    #[test]
    fn namespace_round_trips() {
        let env = OverlayEnvironment::new().with(&SAVED_STATE_NAMESPACE, "root+0".to_string());
        assert_eq!(namespace_of(&env), "root+0");
    }
}
