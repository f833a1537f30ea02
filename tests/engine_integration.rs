//! End-to-end tests of the nuke pipeline against in-memory resource types

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{ids, FakeNuker};
use std::sync::Arc;
use std::time::Duration;
use tnuke::engine::{delete_batch, NukeError, RunPhase, MAX_CONCURRENT_DELETES};
use tnuke::{
    Expression, FilterRule, NukerRegistry, Orchestrator, ResourceNuker, ResourceType,
    ResourceValue, RulesConfig, Scope,
};

fn scope() -> Scope {
    Scope::new("us-east1-b")
}

fn orchestrator(nukers: Vec<Arc<FakeNuker>>, rules: RulesConfig) -> Orchestrator {
    let mut registry = NukerRegistry::new();
    for nuker in nukers {
        registry.register(nuker).unwrap();
    }
    Orchestrator::new(registry, rules)
}

/// "a" created now, "b" created a year ago
fn templates() -> Vec<ResourceValue> {
    let now = Utc::now();
    vec![
        ResourceValue::new("a").with_time(now),
        ResourceValue::new("b").with_time(now - ChronoDuration::days(365)),
    ]
}

fn exclude(rule: FilterRule) -> RulesConfig {
    let mut rules = RulesConfig::default();
    rules.insert(
        "templates",
        ResourceType {
            exclude: rule,
            ..Default::default()
        },
    );
    rules
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn test_empty_filter_nukes_everything() {
        let nuker = Arc::new(FakeNuker::new("templates", 49).with_values(templates()));
        let orch = orchestrator(vec![nuker.clone()], RulesConfig::default());

        let report = orch.nuke_resource_type("templates", &scope()).await.unwrap();

        assert_eq!(report.selected, vec!["a", "b"]);
        assert_eq!(nuker.deleted().len(), 2);
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_name_exclusion() {
        let nuker = Arc::new(FakeNuker::new("templates", 49).with_values(templates()));
        let rules = exclude(FilterRule {
            names_regex: vec![Expression::new("b").unwrap()],
            ..Default::default()
        });
        let orch = orchestrator(vec![nuker.clone()], rules);

        let report = orch.nuke_resource_type("templates", &scope()).await.unwrap();

        assert_eq!(report.listed, 2);
        assert_eq!(report.selected, vec!["a"]);
        assert_eq!(report.batches, 1);
        assert_eq!(report.attempted, 1);
        assert_eq!(report.phase, RunPhase::Done);
        assert_eq!(nuker.deleted(), vec!["a"]);
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_time_after_exclusion() {
        let nuker = Arc::new(FakeNuker::new("templates", 49).with_values(templates()));
        let rules = exclude(FilterRule {
            time_after: Some(Utc::now() - ChronoDuration::hours(1)),
            ..Default::default()
        });
        let orch = orchestrator(vec![nuker.clone()], rules);

        let report = orch.nuke_resource_type("templates", &scope()).await.unwrap();

        assert_eq!(report.selected, vec!["b"]);
        assert_eq!(nuker.deleted(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_include_without_match_selects_nothing() {
        let nuker = Arc::new(FakeNuker::new("templates", 49).with_values(templates()));
        let mut rules = RulesConfig::default();
        rules.insert(
            "templates",
            ResourceType {
                include: FilterRule {
                    names_regex: vec![Expression::new("^prod-").unwrap()],
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        let orch = orchestrator(vec![nuker.clone()], rules);

        let report = orch.nuke_resource_type("templates", &scope()).await.unwrap();

        assert!(report.selected.is_empty());
        assert_eq!(report.batches, 0);
        assert_eq!(report.phase, RunPhase::Done);
        assert!(nuker.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_unnamed_candidates_are_skipped() {
        let nuker = Arc::new(
            FakeNuker::new("templates", 10)
                .with_values(vec![ResourceValue::default(), ResourceValue::new("named")]),
        );
        let orch = orchestrator(vec![nuker.clone()], RulesConfig::default());

        let report = orch.nuke_resource_type("templates", &scope()).await.unwrap();

        assert_eq!(report.listed, 2);
        assert_eq!(report.selected, vec!["named"]);
        assert_eq!(nuker.deleted(), vec!["named"]);
    }

    #[tokio::test]
    async fn test_dry_run_never_deletes() {
        let nuker = Arc::new(FakeNuker::new("templates", 49).with_values(templates()));
        let orch = orchestrator(vec![nuker.clone()], RulesConfig::default()).with_dry_run(true);

        let report = orch.nuke_resource_type("templates", &scope()).await.unwrap();

        assert_eq!(report.selected, vec!["a", "b"]);
        assert_eq!(report.batches, 1);
        assert_eq!(report.attempted, 0);
        assert!(report.dry_run);
        assert_eq!(report.phase, RunPhase::Done);
        assert!(nuker.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let orch = orchestrator(vec![], RulesConfig::default());
        let err = orch.nuke_resource_type("buckets", &scope()).await.unwrap_err();
        assert!(matches!(err, NukeError::UnknownResourceType(name) if name == "buckets"));
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_partial_failures_keep_going_across_batches() {
        let names = ["id-0", "id-1", "id-2", "id-3", "id-4"];
        let nuker = Arc::new(
            FakeNuker::new("disks", 2)
                .with_names(&names)
                .failing(&["id-1", "id-3"]),
        );
        let orch = orchestrator(vec![nuker.clone()], RulesConfig::default());

        let report = orch.nuke_resource_type("disks", &scope()).await.unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.attempted, 5);
        assert_eq!(report.deleted(), 3);
        assert_eq!(report.failed(), 2);
        assert_eq!(nuker.deleted().len(), 5);

        let err = report.into_result().unwrap_err();
        let failed: Vec<&str> = err.failures().iter().map(|f| f.identifier.as_str()).collect();
        assert_eq!(failed, vec!["id-1", "id-3"]);

        let text = err.to_string();
        assert!(text.contains("id-1: simulated failure"));
        assert!(text.contains("id-3: simulated failure"));
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal_for_the_type() {
        let nuker = Arc::new(
            FakeNuker::new("disks", 10)
                .with_names(&["x"])
                .with_list_error("403 Forbidden"),
        );
        let orch = orchestrator(vec![nuker.clone()], RulesConfig::default());

        let err = orch.nuke_resource_type("disks", &scope()).await.unwrap_err();

        match err {
            NukeError::Listing {
                resource_type,
                scope,
                ..
            } => {
                assert_eq!(resource_type, "disks");
                assert_eq!(scope, "us-east1-b");
            }
            other => panic!("expected listing error, got {other:?}"),
        }
        assert!(nuker.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_batch_size_rejected_before_listing() {
        for size in [0, MAX_CONCURRENT_DELETES + 1] {
            let nuker = Arc::new(FakeNuker::new("disks", size).with_names(&["x"]));
            let orch = orchestrator(vec![nuker.clone()], RulesConfig::default());

            let err = orch.nuke_resource_type("disks", &scope()).await.unwrap_err();

            assert!(matches!(err, NukeError::InvalidBatchSize { .. }));
            assert_eq!(nuker.list_count(), 0);
            assert!(nuker.deleted().is_empty());
        }
    }
}

mod deleter {
    use super::*;

    #[tokio::test]
    async fn test_empty_batch_dispatches_nothing() {
        let nuker = Arc::new(FakeNuker::new("disks", 10));
        delete_batch(nuker.clone(), &scope(), &[]).await.unwrap();
        assert!(nuker.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_over_ceiling_is_rejected_without_attempts() {
        let nuker = Arc::new(FakeNuker::new("disks", 10));
        let identifiers = ids(MAX_CONCURRENT_DELETES + 1);

        let err = delete_batch(nuker.clone(), &scope(), &identifiers)
            .await
            .unwrap_err();

        match err {
            NukeError::TooManyIdentifiers {
                requested, limit, ..
            } => {
                assert_eq!(requested, 101);
                assert_eq!(limit, 100);
            }
            other => panic!("expected batch-size violation, got {other:?}"),
        }
        assert!(nuker.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_ceiling_itself_is_allowed() {
        let nuker = Arc::new(FakeNuker::new("disks", 10));
        let identifiers = ids(MAX_CONCURRENT_DELETES);
        delete_batch(nuker.clone(), &scope(), &identifiers).await.unwrap();
        assert_eq!(nuker.deleted().len(), MAX_CONCURRENT_DELETES);
    }

    #[tokio::test]
    async fn test_identical_messages_not_coalesced() {
        let nuker = Arc::new(FakeNuker::new("disks", 10).failing(&["id-0", "id-2"]));
        let err = delete_batch(nuker.clone(), &scope(), &ids(3))
            .await
            .unwrap_err();
        assert_eq!(err.failures().len(), 2);
        assert!(err.to_string().starts_with("2 errors occurred:"));
    }

    #[tokio::test]
    async fn test_failures_follow_dispatch_order() {
        // Every attempt sleeps, so completion order is up to the scheduler.
        let nuker = Arc::new(
            FakeNuker::new("disks", 10)
                .failing(&["id-4", "id-0", "id-2"])
                .with_delay(Duration::from_millis(5)),
        );
        let err = delete_batch(nuker.clone(), &scope(), &ids(6))
            .await
            .unwrap_err();
        let failed: Vec<&str> = err.failures().iter().map(|f| f.identifier.as_str()).collect();
        assert_eq!(failed, vec!["id-0", "id-2", "id-4"]);
    }

    #[tokio::test]
    async fn test_batch_runs_concurrently() {
        let nuker = Arc::new(FakeNuker::new("disks", 10).with_delay(Duration::from_millis(20)));
        delete_batch(nuker.clone(), &scope(), &ids(8)).await.unwrap();
        assert_eq!(nuker.max_in_flight.load(std::sync::atomic::Ordering::SeqCst), 8);
    }
}

mod runs {
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_batches_are_sequential() {
        let names: Vec<String> = ids(10);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let nuker = Arc::new(
            FakeNuker::new("disks", 3)
                .with_names(&refs)
                .with_delay(Duration::from_millis(10)),
        );
        let orch = orchestrator(vec![nuker.clone()], RulesConfig::default());

        let report = orch.nuke_resource_type("disks", &scope()).await.unwrap();

        assert_eq!(report.batches, 4);
        assert_eq!(nuker.max_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(nuker.deleted().len(), 10);
    }

    #[tokio::test]
    async fn test_run_covers_scopes_and_global_types() {
        let regional = Arc::new(FakeNuker::new("disks", 10).with_names(&["d1"]));
        let global = Arc::new(FakeNuker::new("images", 10).with_names(&["i1"]).global());
        let orch = orchestrator(vec![regional.clone(), global.clone()], RulesConfig::default());
        let scopes = [Scope::new("us-east1-b"), Scope::new("europe-west1-c")];

        let report = orch.run(&scopes).await;

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(regional.deleted_in("us-east1-b"), vec!["d1"]);
        assert_eq!(regional.deleted_in("europe-west1-c"), vec!["d1"]);
        assert_eq!(global.deleted_in("global"), vec!["i1"]);
        assert_eq!(global.list_count(), 1);
        assert_eq!(report.total_deleted(), 3);
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_run_continues_after_a_failing_type() {
        let broken = Arc::new(FakeNuker::new("addresses", 10).with_list_error("boom"));
        let flaky = Arc::new(
            FakeNuker::new("disks", 10)
                .with_names(&["d1", "d2"])
                .failing(&["d2"]),
        );
        let fine = Arc::new(FakeNuker::new("images", 10).with_names(&["i1"]));
        let orch = orchestrator(
            vec![broken.clone(), flaky.clone(), fine.clone()],
            RulesConfig::default(),
        );

        let report = orch.run(&[scope()]).await;

        assert_eq!(fine.deleted(), vec!["i1"]);
        assert_eq!(report.total_deleted(), 2);
        assert_eq!(report.total_failed(), 1);

        let err = report.into_result().unwrap_err();
        assert_eq!(err.len(), 2);
        let text = err.to_string();
        assert!(text.contains("[addresses in us-east1-b] failed to list addresses"));
        assert!(text.contains("d2: simulated failure"));
        assert!(!text.contains("d1:"));
    }

    #[tokio::test]
    async fn test_nukers_share_rules_by_name() {
        let disks = Arc::new(FakeNuker::new("disks", 10).with_names(&["keep-me", "drop-me"]));
        let images = Arc::new(FakeNuker::new("images", 10).with_names(&["keep-me"]));
        let rules = RulesConfig::from_yaml("disks:\n  exclude:\n    names_regex: [\"^keep-\"]\n")
            .unwrap();
        let orch = orchestrator(vec![disks.clone(), images.clone()], rules);

        orch.run(&[scope()]).await.into_result().unwrap();

        assert_eq!(disks.deleted(), vec!["drop-me"]);
        assert_eq!(images.deleted(), vec!["keep-me"]);
    }

    #[tokio::test]
    async fn test_registry_rejects_duplicates() {
        let mut registry = NukerRegistry::new();
        registry.register(Arc::new(FakeNuker::new("disks", 1))).unwrap();
        let dup: Arc<dyn ResourceNuker> = Arc::new(FakeNuker::new("disks", 1));
        assert!(matches!(
            registry.register(dup),
            Err(NukeError::DuplicateResourceType(_))
        ));
    }
}

mod confirmed_runs {
    use super::*;

    #[tokio::test]
    async fn test_deletes_only_what_the_preview_selected() {
        let nuker = Arc::new(
            FakeNuker::new("databases", 10)
                .with_names(&["shown"])
                .then_list(&["shown", "prod-db-created-later"]),
        );
        let preview = orchestrator(vec![nuker.clone()], RulesConfig::default()).with_dry_run(true);

        let shown = preview.run(&[scope()]).await;
        assert_eq!(shown.total_selected(), 1);
        assert!(nuker.deleted().is_empty());

        let report = preview.with_dry_run(false).nuke_selected(shown).await;

        assert_eq!(nuker.deleted(), vec!["shown"]);
        assert_eq!(nuker.list_count(), 1);
        let reports: Vec<_> = report.reports().collect();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].attempted, 1);
        assert_eq!(reports[0].phase, RunPhase::Done);
        assert!(!reports[0].dry_run);
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_selection_is_batched_and_failures_reported() {
        let nuker = Arc::new(
            FakeNuker::new("disks", 2)
                .with_names(&["d0", "d1", "d2"])
                .failing(&["d1"])
                .with_delay(Duration::from_millis(5)),
        );
        let preview = orchestrator(vec![nuker.clone()], RulesConfig::default()).with_dry_run(true);
        let shown = preview.run(&[scope()]).await;

        let report = preview.with_dry_run(false).nuke_selected(shown).await;

        assert_eq!(nuker.max_in_flight.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(report.reports().next().unwrap().batches, 2);
        assert_eq!(report.total_deleted(), 2);
        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("d1: simulated failure"));
    }

    #[tokio::test]
    async fn test_listing_errors_survive_into_the_final_result() {
        let broken = Arc::new(FakeNuker::new("clusters", 10).with_list_error("403 Forbidden"));
        let fine = Arc::new(FakeNuker::new("disks", 10).with_names(&["d1"]));
        let preview = orchestrator(vec![broken.clone(), fine.clone()], RulesConfig::default())
            .with_dry_run(true);

        let shown = preview.run(&[scope()]).await;
        assert_eq!(shown.total_selected(), 1);

        let report = preview.with_dry_run(false).nuke_selected(shown).await;

        assert_eq!(fine.deleted(), vec!["d1"]);
        assert_eq!(broken.list_count(), 1);
        let err = report.into_result().unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.to_string().contains("failed to list clusters"));
    }

    #[tokio::test]
    async fn test_dry_run_orchestrator_does_not_delete_selection() {
        let nuker = Arc::new(FakeNuker::new("disks", 10).with_names(&["d1"]));
        let preview = orchestrator(vec![nuker.clone()], RulesConfig::default()).with_dry_run(true);
        let shown = preview.run(&[scope()]).await;

        let report = preview.nuke_selected(shown).await;

        assert!(nuker.deleted().is_empty());
        assert_eq!(report.total_selected(), 1);
    }
}
