use criterion::{criterion_group, criterion_main, Criterion};

use scrim_core::{overlay, DynOverlay};
use scrim_stack::{Lifetime, OverlayStack};
use scrim_testing::{fixture_environment, Alert};

fn steady_state_reconcile(c: &mut Criterion) {
    c.bench_function("reconcile_16_compatible_overlays", |b| {
        let (env, _alerts, _sheets, _panes) = fixture_environment();
        let parent = Lifetime::new();
        let mut stack = OverlayStack::rooted_at(&parent);
        let mut revision = 0u64;
        b.iter(|| {
            revision += 1;
            let overlays: Vec<DynOverlay> = (0..16)
                .map(|position| {
                    overlay(Alert {
                        message: format!("alert {position} rev {revision}"),
                    })
                })
                .collect();
            stack.update(overlays, &env, || {}).unwrap();
        });
    });
}

fn churn_reconcile(c: &mut Criterion) {
    c.bench_function("reconcile_grow_and_shrink", |b| {
        let (env, _alerts, _sheets, _panes) = fixture_environment();
        let parent = Lifetime::new();
        let mut stack = OverlayStack::rooted_at(&parent);
        let mut grow = false;
        b.iter(|| {
            grow = !grow;
            let count = if grow { 8 } else { 2 };
            let overlays: Vec<DynOverlay> = (0..count)
                .map(|position| {
                    overlay(Alert {
                        message: format!("alert {position}"),
                    })
                })
                .collect();
            stack.update(overlays, &env, || {}).unwrap();
        });
    });
}

criterion_group!(benches, steady_state_reconcile, churn_reconcile);
criterion_main!(benches);
