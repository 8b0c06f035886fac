use scrim_core::environment::{OverlayEnvironment, FACTORY_REGISTRY};
use scrim_core::factory::{resolve, FactoryRegistry};
use scrim_core::overlay::overlay;
use scrim_testing::{Alert, FakeFactory, Sheet, Toast};

#[test]
fn registry_resolution_wins() {
    let (factory, _probe) = FakeFactory::<Alert>::new();
    let mut registry = FactoryRegistry::new();
    registry.register(factory);
    let env = OverlayEnvironment::new().with(&FACTORY_REGISTRY, registry);

    let description = overlay(Alert {
        message: "hi".into(),
    });
    assert!(resolve(description.as_ref(), &env).is_ok());
}

#[test]
fn default_factory_covers_unregistered_well_known_types() {
    let description = overlay(Toast {
        message: "done".into(),
    });
    let resolved = resolve(description.as_ref(), &OverlayEnvironment::new());
    assert!(resolved.is_ok());
}

#[test]
fn unresolvable_overlay_is_a_configuration_error() {
    let description = overlay(Sheet {
        title: "settings".into(),
    });
    let err = resolve(description.as_ref(), &OverlayEnvironment::new()).unwrap_err();
    assert!(err.to_string().contains("no overlay surface factory"));
}

#[test]
fn registration_replaces_previous_entry() {
    let (first, first_probe) = FakeFactory::<Alert>::new();
    let (second, second_probe) = FakeFactory::<Alert>::new();
    let mut registry = FactoryRegistry::new();
    registry.register(first);
    registry.register(second);
    assert_eq!(registry.len(), 1);

    let env = OverlayEnvironment::new().with(&FACTORY_REGISTRY, registry);
    let description = overlay(Alert {
        message: "hi".into(),
    });
    let factory = resolve(description.as_ref(), &env).unwrap();
    let _surface = factory.build_surface(description.as_ref(), &env);
    assert_eq!(first_probe.built(), 0);
    assert_eq!(second_probe.built(), 1);
}
