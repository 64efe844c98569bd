use promptlab::domain::errors::StoreError;
use promptlab::domain::registry::{ModelSelector, NewModelVersion};
use promptlab::domain::repositories::ModelRegistry;
use promptlab::domain::types::metrics;
use promptlab::infrastructure::persistence::artifact_store::ArtifactStore;
use promptlab::infrastructure::persistence::database::Database;
use promptlab::infrastructure::persistence::repositories::SqliteModelRegistry;
use std::sync::Arc;
use tempfile::TempDir;

async fn setup() -> (Arc<SqliteModelRegistry>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::in_memory().await.unwrap();
    let artifacts = ArtifactStore::open(dir.path().join("artifacts")).await.unwrap();
    (Arc::new(SqliteModelRegistry::new(db.pool, artifacts)), dir)
}

async fn active_count(registry: &SqliteModelRegistry, module_type: &str) -> usize {
    registry.list(Some(module_type), true).await.unwrap().len()
}

#[tokio::test]
async fn test_sequential_registration_numbers_versions() {
    let (registry, _dir) = setup().await;

    for i in 0..5u8 {
        registry
            .register(NewModelVersion::new("judge_safety", vec![i]))
            .await
            .unwrap();
    }
    registry
        .register(NewModelVersion::new("rubric_optimizer", b"r".to_vec()))
        .await
        .unwrap();

    let versions: Vec<i64> = registry
        .list(Some("judge_safety"), false)
        .await
        .unwrap()
        .iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(versions, vec![5, 4, 3, 2, 1]);

    // Each module type numbers independently
    let rubric = registry
        .get(&ModelSelector::version("rubric_optimizer", 1))
        .await
        .unwrap();
    assert_eq!(rubric.version, 1);
}

#[tokio::test]
async fn test_concurrent_registration_has_no_gaps_or_duplicates() {
    let (registry, _dir) = setup().await;

    let mut handles = Vec::new();
    for i in 0..8u8 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .register(NewModelVersion::new("judge_relevance", vec![i]))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut versions: Vec<i64> = registry
        .list(Some("judge_relevance"), false)
        .await
        .unwrap()
        .iter()
        .map(|v| v.version)
        .collect();
    versions.sort();
    assert_eq!(versions, (1..=8).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_concurrent_activation_keeps_one_active() {
    let (registry, _dir) = setup().await;
    let mut ids = Vec::new();
    for i in 0..4u8 {
        ids.push(
            registry
                .register(NewModelVersion::new("judge_safety", vec![i]))
                .await
                .unwrap(),
        );
    }

    let mut handles = Vec::new();
    for round in 0..3 {
        for id in ids.clone() {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move { registry.set_active(&id).await }));
        }
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let id = registry
                .register(NewModelVersion::new("judge_safety", vec![100 + round]))
                .await?;
            registry.set_active(&id).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(active_count(&registry, "judge_safety").await, 1);
    assert_eq!(registry.list(Some("judge_safety"), false).await.unwrap().len(), 7);
}

#[tokio::test]
async fn test_module_types_with_same_file_stem_keep_separate_artifacts() {
    let (registry, _dir) = setup().await;

    for i in 0..5 {
        let dotted = registry
            .register(NewModelVersion::new(format!("judge.x{}", i), b"AAAA".to_vec()))
            .await
            .unwrap();
        let underscored = registry
            .register(NewModelVersion::new(format!("judge_x{}", i), b"BBBB".to_vec()))
            .await
            .unwrap();

        let a = registry.get(&ModelSelector::id(&dotted)).await.unwrap();
        let b = registry.get(&ModelSelector::id(&underscored)).await.unwrap();
        assert_ne!(a.artifact_ref, b.artifact_ref);
        assert_eq!(registry.load(&ModelSelector::id(&dotted)).await.unwrap(), b"AAAA");
        assert_eq!(registry.load(&ModelSelector::id(&underscored)).await.unwrap(), b"BBBB");

        registry.delete(&underscored).await.unwrap();
        assert_eq!(registry.load(&ModelSelector::id(&dotted)).await.unwrap(), b"AAAA");
    }
}

#[tokio::test]
async fn test_lock_map_is_pruned() {
    let (registry, _dir) = setup().await;
    for i in 0..6 {
        registry
            .register(NewModelVersion::new(format!("judge_{}", i), b"x".to_vec()))
            .await
            .unwrap();
    }
    assert!(registry.tracked_locks() <= 1);
}

#[tokio::test]
async fn test_register_and_load_roundtrip() {
    let (registry, _dir) = setup().await;
    let artifact: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

    let id = registry
        .register(
            NewModelVersion::new("judge_faithfulness", artifact.clone())
                .with_metrics(metrics([("optimized_score", 0.81)]))
                .with_training_count(42)
                .with_notes("first cut"),
        )
        .await
        .unwrap();

    assert!(id.starts_with("judge_faithfulness_"));
    assert_eq!(registry.load(&ModelSelector::id(&id)).await.unwrap(), artifact);
    assert_eq!(
        registry
            .load(&ModelSelector::version("judge_faithfulness", 1))
            .await
            .unwrap(),
        artifact
    );

    let meta = registry.get(&ModelSelector::id(&id)).await.unwrap();
    assert_eq!(meta.metric("optimized_score"), Some(0.81));
    assert_eq!(meta.training_example_count, Some(42));
    assert_eq!(meta.notes.as_deref(), Some("first cut"));
    assert!(!meta.is_active);
    assert_eq!(meta.checksum, ArtifactStore::checksum(&artifact));
    assert!(meta.artifact_ref.starts_with("judge_faithfulness_v1_"));
}

#[tokio::test]
async fn test_at_most_one_active_version() {
    let (registry, _dir) = setup().await;
    let mut ids = Vec::new();
    for i in 0..3u8 {
        ids.push(
            registry
                .register(NewModelVersion::new("judge_minimality", vec![i]))
                .await
                .unwrap(),
        );
    }
    let other = registry
        .register(NewModelVersion::new("judge_safety", b"s".to_vec()))
        .await
        .unwrap();
    registry.set_active(&other).await.unwrap();

    for id in [&ids[0], &ids[2], &ids[1], &ids[2]] {
        registry.set_active(id).await.unwrap();
        assert_eq!(active_count(&registry, "judge_minimality").await, 1);
    }

    let active = registry.active_version("judge_minimality").await.unwrap().unwrap();
    assert_eq!(active.id, ids[2]);
    // Activation never crosses module types
    assert_eq!(active_count(&registry, "judge_safety").await, 1);
}

#[tokio::test]
async fn test_set_active_is_idempotent() {
    let (registry, _dir) = setup().await;
    let id = registry
        .register(NewModelVersion::new("rubric_optimizer", b"v1".to_vec()))
        .await
        .unwrap();

    registry.set_active(&id).await.unwrap();
    registry.set_active(&id).await.unwrap();

    let active = registry.list(Some("rubric_optimizer"), true).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, id);
    assert_eq!(
        registry.load(&ModelSelector::active("rubric_optimizer")).await.unwrap(),
        b"v1"
    );
}

#[tokio::test]
async fn test_delete_active_leaves_none_active() {
    let (registry, _dir) = setup().await;
    let v1 = registry
        .register(NewModelVersion::new("judge_safety", b"v1".to_vec()))
        .await
        .unwrap();
    let v2 = registry
        .register(NewModelVersion::new("judge_safety", b"v2".to_vec()))
        .await
        .unwrap();
    registry.set_active(&v2).await.unwrap();

    let artifact_ref = registry.get(&ModelSelector::id(&v2)).await.unwrap().artifact_ref;
    registry.delete(&v2).await.unwrap();

    assert!(!registry.artifacts().path_for(&artifact_ref).exists());
    assert!(registry.active_version("judge_safety").await.unwrap().is_none());
    let err = registry
        .load(&ModelSelector::active("judge_safety"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));

    // v1 survives untouched and inactive
    let remaining = registry.list(Some("judge_safety"), false).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, v1);
    assert!(!remaining[0].is_active);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let (registry, _dir) = setup().await;

    assert!(matches!(
        registry.set_active("nope").await.unwrap_err(),
        StoreError::NotFound { .. }
    ));
    assert!(matches!(
        registry.delete("nope").await.unwrap_err(),
        StoreError::NotFound { .. }
    ));
    assert!(matches!(
        registry
            .load(&ModelSelector::version("judge_safety", 9))
            .await
            .unwrap_err(),
        StoreError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_missing_and_tampered_artifacts() {
    let (registry, _dir) = setup().await;
    let id = registry
        .register(NewModelVersion::new("judge_relevance", b"original".to_vec()))
        .await
        .unwrap();
    let meta = registry.get(&ModelSelector::id(&id)).await.unwrap();
    let path = registry.artifacts().path_for(&meta.artifact_ref);

    std::fs::write(&path, b"tampered").unwrap();
    assert!(matches!(
        registry.load(&ModelSelector::id(&id)).await.unwrap_err(),
        StoreError::ArtifactCorrupted { .. }
    ));

    std::fs::remove_file(&path).unwrap();
    assert!(matches!(
        registry.load(&ModelSelector::id(&id)).await.unwrap_err(),
        StoreError::ArtifactMissing { .. }
    ));

    // Metadata delete still succeeds with the blob gone
    registry.delete(&id).await.unwrap();
    assert!(registry.list(None, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_explicit_version_conflict() {
    let (registry, _dir) = setup().await;
    registry
        .register(NewModelVersion::new("rubric_optimizer", b"a".to_vec()).with_version(3))
        .await
        .unwrap();

    let err = registry
        .register(NewModelVersion::new("rubric_optimizer", b"b".to_vec()).with_version(3))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::ConcurrencyConflict { version: 3, .. }
    ));

    // Auto-numbering continues after the explicit version
    let id = registry
        .register(NewModelVersion::new("rubric_optimizer", b"c".to_vec()))
        .await
        .unwrap();
    assert_eq!(registry.get(&ModelSelector::id(&id)).await.unwrap().version, 4);

    let err = registry
        .register(NewModelVersion::new("rubric_optimizer", b"d".to_vec()).with_version(0))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument { .. }));
}

#[tokio::test]
async fn test_list_ordering_and_filters() {
    let (registry, _dir) = setup().await;
    for module_type in ["judge_safety", "judge_relevance", "judge_safety"] {
        registry
            .register(NewModelVersion::new(module_type, b"x".to_vec()))
            .await
            .unwrap();
    }

    let all: Vec<(String, i64)> = registry
        .list(None, false)
        .await
        .unwrap()
        .into_iter()
        .map(|v| (v.module_type, v.version))
        .collect();
    assert_eq!(
        all,
        vec![
            ("judge_relevance".to_string(), 1),
            ("judge_safety".to_string(), 2),
            ("judge_safety".to_string(), 1),
        ]
    );
    assert!(registry.list(None, true).await.unwrap().is_empty());
}
