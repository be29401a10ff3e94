//! Invariants that must hold for every group shape and call order.

mod common;

use vpa_disruption::{ControllerKind, InPlaceDecision};
use vpa_state::AttemptStore;
use vpa_types::{DisruptionSettings, PodConditionType, PodPhase, UpdateMode};

use common::*;

const FRACTIONS: [f64; 6] = [0.0, 0.1, 0.3, 0.5, 0.8, 1.0];

/// Alternate eviction and in-place commits over every pod, twice, and
/// check the group never loses more replicas than its tolerance allows.
#[tokio::test]
async fn budget_is_never_exceeded() {
    for replicas_n in 2..=8usize {
        for fraction in FRACTIONS {
            let h = Harness::with_tolerance(fraction);
            h.controller(ControllerKind::ReplicaSet, "rs", replicas_n as i32);
            let pods = replicas("ReplicaSet", "rs", replicas_n);
            let policy = policy(UpdateMode::InPlaceOrRecreate);

            let groups = h.factory.build(&pods, &policy);
            let eviction = h.factory.new_eviction_arbiter(&groups);
            let in_place = h.factory.new_in_place_arbiter(&groups);

            for round in 0..2 {
                for (i, pod) in pods.iter().enumerate() {
                    if (i + round) % 2 == 0 {
                        let _ = eviction.evict(pod, &policy, &h.sink).await;
                    } else {
                        let _ = in_place.in_place_update(pod, &policy, &h.sink).await;
                    }

                    let g = stats(&groups, ControllerKind::ReplicaSet, "rs");
                    let allowed = if g.eviction_tolerance == 0 {
                        1
                    } else {
                        g.running - (g.configured - g.eviction_tolerance)
                    };
                    assert!(
                        g.disrupted() <= allowed,
                        "replicas={replicas_n} fraction={fraction}: {g:?}"
                    );
                    assert!(g.disrupted() <= g.running);
                }
            }
        }
    }
}

/// Re-patching Infeasible pods draws on the same budget as fresh resizes.
#[tokio::test]
async fn infeasible_repatches_respect_the_budget() {
    for replicas_n in 2..=6usize {
        for fraction in FRACTIONS {
            let h = Harness::with_tolerance(fraction);
            h.controller(ControllerKind::ReplicaSet, "rs", replicas_n as i32);
            let pods: Vec<_> = replicas("ReplicaSet", "rs", replicas_n)
                .into_iter()
                .map(|p| resizing(p, PodConditionType::PodResizePending, Some("Infeasible")))
                .collect();
            let policy = policy(UpdateMode::InPlace);

            let groups = h.factory.build(&pods, &policy);
            let in_place = h.factory.new_in_place_arbiter(&groups);

            let mut commits = 0;
            for pod in &pods {
                if in_place.in_place_update(pod, &policy, &h.sink).await.is_ok() {
                    commits += 1;
                }
            }

            let g = stats(&groups, ControllerKind::ReplicaSet, "rs");
            let allowed = if g.eviction_tolerance == 0 {
                1
            } else {
                g.running - (g.configured - g.eviction_tolerance)
            };
            assert_eq!(commits, g.in_place_update_initiated);
            assert!(
                g.in_place_update_initiated <= allowed,
                "replicas={replicas_n} fraction={fraction}: {g:?}"
            );
            assert_eq!(
                in_place.can_in_place_update(&pods[replicas_n - 1], UpdateMode::InPlace),
                InPlaceDecision::Deferred
            );
        }
    }
}

#[tokio::test]
async fn below_min_replicas_blocks_eviction_even_when_skipping_budget() {
    let h = Harness::new(DisruptionSettings {
        min_replicas: 3,
        eviction_tolerance_fraction: 1.0,
        in_place_skip_disruption_budget: true,
        retain_below_min_replicas: true,
    });
    h.controller(ControllerKind::ReplicaSet, "rs", 2);
    let pods = replicas("ReplicaSet", "rs", 2);
    let policy = policy(UpdateMode::InPlaceOrRecreate);

    let groups = h.factory.build(&pods, &policy);
    let eviction = h.factory.new_eviction_arbiter(&groups);
    let in_place = h.factory.new_in_place_arbiter(&groups);

    assert!(stats(&groups, ControllerKind::ReplicaSet, "rs").below_min_replicas);
    for pod in &pods {
        assert!(!eviction.can_evict(pod));
    }
    assert_eq!(
        in_place.can_in_place_update(&pods[0], UpdateMode::InPlaceOrRecreate),
        InPlaceDecision::Approved
    );
}

#[tokio::test]
async fn pending_pods_are_always_evictable_and_never_counted() {
    for fraction in FRACTIONS {
        let h = Harness::with_tolerance(fraction);
        h.controller(ControllerKind::ReplicaSet, "rs", 4);
        let mut pods = replicas("ReplicaSet", "rs", 4);
        pods[3] = pods[3].clone().with_phase(PodPhase::Pending);
        let policy = policy(UpdateMode::Evict);

        let groups = h.factory.build(&pods, &policy);
        let arbiter = h.factory.new_eviction_arbiter(&groups);
        for pod in &pods[..3] {
            let _ = arbiter.evict(pod, &policy, &h.sink).await;
        }
        let before = stats(&groups, ControllerKind::ReplicaSet, "rs").evicted;

        assert!(arbiter.can_evict(&pods[3]), "fraction={fraction}");
        arbiter.evict(&pods[3], &policy, &h.sink).await.unwrap();
        assert_eq!(stats(&groups, ControllerKind::ReplicaSet, "rs").evicted, before);
    }
}

#[tokio::test]
async fn second_in_place_update_in_one_pass_is_rejected() {
    let h = Harness::with_tolerance(1.0);
    h.controller(ControllerKind::ReplicaSet, "rs", 4);
    let pods = replicas("ReplicaSet", "rs", 4);
    let policy = policy(UpdateMode::InPlace);

    let groups = h.factory.build(&pods, &policy);
    let arbiter = h.factory.new_in_place_arbiter(&groups);

    arbiter.in_place_update(&pods[0], &policy, &h.sink).await.unwrap();
    assert_eq!(
        arbiter.can_in_place_update(&pods[0], UpdateMode::InPlace),
        InPlaceDecision::Deferred
    );
    assert!(arbiter.in_place_update(&pods[0], &policy, &h.sink).await.is_err());

    let resized = resizing(pods[0].clone(), PodConditionType::PodResizeInProgress, None);
    assert!(arbiter.in_place_update(&resized, &policy, &h.sink).await.is_err());
    assert_eq!(stats(&groups, ControllerKind::ReplicaSet, "rs").in_place_update_initiated, 1);
}

#[tokio::test]
async fn deferred_fallback_flips_once_at_five_minutes() {
    let h = Harness::with_tolerance(0.5);
    h.controller(ControllerKind::ReplicaSet, "rs", 4);
    let mut pods = replicas("ReplicaSet", "rs", 4);
    pods[0] = resizing(pods[0].clone(), PodConditionType::PodResizePending, Some("Deferred"));
    h.attempts.record(&pods[0].key(), h.now()).unwrap();
    let policy = policy(UpdateMode::InPlaceOrRecreate);

    let groups = h.factory.build(&pods, &policy);
    let eviction = h.factory.new_eviction_arbiter(&groups);

    let mut observed = Vec::new();
    for _ in 0..=20 {
        observed.push(eviction.can_evict(&pods[0]));
        h.clock.advance(MINUTE / 2);
    }

    let flip = observed.iter().position(|&v| v).expect("fallback never became due");
    assert!(observed[..flip].iter().all(|&v| !v));
    assert!(observed[flip..].iter().all(|&v| v));
    assert_eq!(flip, 11, "due only once strictly more than 5 minutes have passed");
}

#[tokio::test]
async fn in_place_mode_never_answers_evict() {
    let states: Vec<(PodConditionType, Option<&str>)> = vec![
        (PodConditionType::PodResizePending, Some("Deferred")),
        (PodConditionType::PodResizePending, Some("Infeasible")),
        (PodConditionType::PodResizeInProgress, None),
        (PodConditionType::PodResizeInProgress, Some("Error")),
        (PodConditionType::Ready, None),
    ];

    for (condition, reason) in states {
        for elapsed in [0, 10, 120, 24 * 60] {
            let h = Harness::with_tolerance(0.5);
            h.controller(ControllerKind::ReplicaSet, "rs", 3);
            let mut pods = replicas("ReplicaSet", "rs", 3);
            pods[0] = resizing(pods[0].clone(), condition, reason);
            h.attempts.record(&pods[0].key(), h.now()).unwrap();
            h.clock.advance(MINUTE * elapsed);

            let groups = h.factory.build(&pods, &policy(UpdateMode::InPlace));
            let arbiter = h.factory.new_in_place_arbiter(&groups);

            let in_place = arbiter.can_in_place_update(&pods[0], UpdateMode::InPlace);
            assert_ne!(in_place, InPlaceDecision::Evict, "{condition:?} {reason:?} {elapsed}m");

            let recreate = arbiter.can_in_place_update(&pods[0], UpdateMode::InPlaceOrRecreate);
            if condition == PodConditionType::PodResizeInProgress && reason == Some("Error") {
                assert_eq!(recreate, InPlaceDecision::Evict);
            }
        }
    }
}

#[tokio::test]
async fn disabled_feature_gates() {
    let h = Harness::with_tolerance(0.5);
    h.controller(ControllerKind::ReplicaSet, "rs", 3);
    let pods = replicas("ReplicaSet", "rs", 3);
    let groups = h.factory.build(&pods, &policy(UpdateMode::InPlace));

    let arbiter = h
        .factory
        .new_in_place_arbiter(&groups)
        .with_features(vpa_types::FeatureGates {
            in_place: false,
            in_place_or_recreate: false,
        });

    assert_eq!(
        arbiter.can_in_place_update(&pods[0], UpdateMode::InPlace),
        InPlaceDecision::Deferred
    );
    assert_eq!(
        arbiter.can_in_place_update(&pods[0], UpdateMode::InPlaceOrRecreate),
        InPlaceDecision::Evict
    );
}
