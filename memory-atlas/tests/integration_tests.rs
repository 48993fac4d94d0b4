//! Integration tests for memory-atlas
//!
//! Tests cover:
//! 1. Loading exported dataset files, including precomputed layouts, and
//!    writing freshly precomputed layouts back
//! 2. Projection and transition lifecycle through a session
//! 3. Box selection and picking through the orbit camera
//! 4. Semantic and lexical search feeding color composition
//! 5. Engine configuration files

use std::fs;
use std::path::PathBuf;

use serde_json::json;

use memory_atlas::{
    normalize, Algorithm, AtlasConfig, Bounds, Camera, Color, Dataset, InstallOutcome,
    LayoutSource, LocalReducer, NullEmbedder, OperationStatus, ProjectionController,
    ProjectionReport, Projected, ScreenProjector, ScreenRect, SearchMode, SearchReport, Session,
    StaticEmbedder, TickOutcome, Viewport,
};

const CATEGORIES: [&str; 3] = ["code", "decision", "research"];

/// Documents with category and timestamp metadata and `dim`-dimensional
/// embeddings clustered by category.
fn dataset_json(n: usize, dim: usize) -> serde_json::Value {
    let documents: Vec<serde_json::Value> = (0..n)
        .map(|i| {
            let cluster = i % CATEGORIES.len();
            let embedding: Vec<f32> = (0..dim)
                .map(|d| {
                    if d % CATEGORIES.len() == cluster {
                        1.0 + (i as f32) * 0.01
                    } else {
                        ((i * 13 + d * 7) % 10) as f32 * 0.01
                    }
                })
                .collect();
            json!({
                "id": format!("mem-{i:03}"),
                "text": format!(
                    "{} entry number {i} about the deploy pipeline",
                    CATEGORIES[cluster]
                ),
                "embedding": embedding,
                "metadata": {
                    "category": CATEGORIES[cluster],
                    "timestamp": format!("2024-05-{:02}T12:00:00Z", 1 + i % 28),
                }
            })
        })
        .collect();

    json!({
        "metadata": {
            "name": "integration",
            "embedding_model": "test-model",
            "embedding_dim": dim,
            "count": n,
        },
        "documents": documents,
    })
}

fn write_json(dir: &tempfile::TempDir, name: &str, value: &serde_json::Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).expect("failed to write file");
    path
}

fn fitted_camera(viewport: Viewport) -> Camera {
    let mut camera = Camera::default().with_viewport(viewport);
    camera.fit_to_radius(40.0);
    camera
}

// ============================================================================
// Test 1: Dataset files
// ============================================================================

#[test]
fn test_load_exported_dataset_with_projections() {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let mut value = dataset_json(4, 8);
    value["projections"] = json!({
        "TSNE": [[1.0, 2.0, 3.0], null, [4.0, null, 6.0], [7.0, 8.0]],
    });
    let path = write_json(&temp_dir, "export.json", &value);

    let dataset = Dataset::load(&path).expect("dataset should load");
    assert_eq!(dataset.len(), 4);
    assert_eq!(dataset.effective_dim(), 8);
    assert_eq!(dataset.precomputed_algorithms(), vec![Algorithm::Tsne]);
    assert_eq!(
        dataset.precomputed_layout(Algorithm::Tsne).unwrap(),
        vec![
            [1.0, 2.0, 3.0],
            [0.0, 0.0, 0.0],
            [4.0, 0.0, 6.0],
            [7.0, 8.0, 0.0]
        ]
    );
    assert!(dataset.validate().is_empty());
}

#[test]
fn test_load_reports_inconsistencies_without_failing() {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let mut value = dataset_json(3, 8);
    value["documents"][1]["embedding"] = json!([1.0, 2.0]);
    value["metadata"]["count"] = json!(10);
    let path = write_json(&temp_dir, "broken.json", &value);

    let dataset = Dataset::load(&path).expect("inconsistent dataset still loads");
    assert_eq!(dataset.validate().len(), 2);
}

#[test]
fn test_missing_dataset_file_is_an_error() {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    assert!(Dataset::load(temp_dir.path().join("absent.json")).is_err());
}

#[tokio::test]
async fn test_precomputed_layouts_round_trip_through_file() {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let mut value = dataset_json(12, 8);
    value["projections"] = json!({ "tsne": vec![[0.5, 0.5, 0.5]; 12] });
    let input = write_json(&temp_dir, "export.json", &value);
    let output = temp_dir.path().join("projected.json");

    let dataset = Dataset::load(&input).expect("dataset should load");
    let projected = ProjectionController::default()
        .precompute(
            &dataset,
            &[Algorithm::Pca, Algorithm::Umap],
            &LocalReducer::default(),
        )
        .await
        .expect("precompute should succeed");
    projected.save(&output).expect("failed to write dataset");

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let keys: Vec<&String> = raw["projections"].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["pca", "tsne", "umap"]);
    assert_eq!(raw["metadata"]["count"], json!(12));

    let reloaded = Dataset::load(&output).expect("written dataset should load");
    assert!(reloaded.validate().is_empty());
    for algorithm in [Algorithm::Pca, Algorithm::Umap] {
        let layout = reloaded.precomputed_layout(algorithm).unwrap();
        assert_eq!(layout.len(), 12);
        let bounds = Bounds::of(&layout).unwrap();
        for axis in 0..3 {
            assert!(bounds.min[axis] >= -20.0 - 1e-3 && bounds.max[axis] <= 20.0 + 1e-3);
        }
    }

    let mut session = Session::default();
    let report = session.open(reloaded, &LocalReducer::default()).await;
    assert!(matches!(
        report,
        ProjectionReport::Installed {
            source: LayoutSource::Precomputed,
            ..
        }
    ));
}

// ============================================================================
// Test 2: Projection lifecycle
// ============================================================================

#[tokio::test]
async fn test_projection_switch_animates_and_settles() {
    let dataset = Dataset::from_json_str(&dataset_json(24, 12).to_string()).unwrap();
    let reducer = LocalReducer::default();
    let mut session = Session::default();

    let first = session.open(dataset, &reducer).await;
    assert!(matches!(
        first,
        ProjectionReport::Installed {
            outcome: InstallOutcome::NewPointCloud,
            source: LayoutSource::Reduced,
        }
    ));
    assert_eq!(session.algorithm(), Algorithm::Umap);

    let bounds = Bounds::of(session.positions()).unwrap();
    for axis in 0..3 {
        assert!(bounds.min[axis] >= -20.0 - 1e-3);
        assert!(bounds.max[axis] <= 20.0 + 1e-3);
    }

    let umap_layout = session.positions().to_vec();
    let second = session.set_algorithm(Algorithm::Pca, &reducer).await;
    assert!(matches!(
        second,
        ProjectionReport::Installed {
            outcome: InstallOutcome::Transition,
            ..
        }
    ));
    assert_eq!(session.layout().previous().unwrap(), umap_layout.as_slice());

    let mut ticks = 0;
    while session.tick() != TickOutcome::Settled {
        ticks += 1;
        assert!(ticks < 50, "transition did not settle");
    }
    assert_eq!(session.positions(), session.layout().current().unwrap());
    assert_eq!(session.tick(), TickOutcome::Idle);
}

#[tokio::test]
async fn test_tsne_requires_precomputed_layout() {
    let dataset = Dataset::from_json_str(&dataset_json(6, 8).to_string()).unwrap();
    let reducer = LocalReducer::default();
    let mut session = Session::default();
    session.open(dataset, &reducer).await;

    let report = session.set_algorithm(Algorithm::Tsne, &reducer).await;
    let ProjectionReport::Failed(reason) = report else {
        panic!("expected failure, got {report:?}");
    };
    assert!(reason.contains("precompute"));
    assert!(matches!(
        session.projection_status(),
        OperationStatus::Failed(_)
    ));
}

#[test]
fn test_normalization_is_idempotent_on_full_range_layout() {
    let layout = vec![
        [-20.0, -20.0, -20.0],
        [20.0, 20.0, 20.0],
        [0.0, 10.0, -5.0],
    ];
    let normalized = normalize(&layout, 40.0);
    for (a, b) in layout.iter().zip(&normalized) {
        for axis in 0..3 {
            assert!((a[axis] - b[axis]).abs() < 1e-4);
        }
    }
}

// ============================================================================
// Test 3: Selection through the camera
// ============================================================================

#[tokio::test]
async fn test_full_viewport_box_selects_everything() {
    let dataset = Dataset::from_json_str(&dataset_json(9, 8).to_string()).unwrap();
    let mut session = Session::default();
    session.open(dataset, &LocalReducer::default()).await;

    let viewport = Viewport::new(800.0, 600.0);
    let camera = fitted_camera(viewport);
    let rect = ScreenRect::from_corners([0.0, 0.0], [800.0, 600.0]);

    let summary = session
        .box_select(rect, viewport, &camera)
        .expect("non-empty selection yields a summary");
    assert_eq!(summary.count, 9);
    assert_eq!(summary.categories.values().sum::<usize>(), 9);
    assert_eq!(summary.categories.get("code"), Some(&3));
    assert!(summary.earliest <= summary.latest);
    assert!(session.colors().iter().all(|c| *c == Color::CYAN));
}

#[tokio::test]
async fn test_tiny_box_changes_nothing() {
    let dataset = Dataset::from_json_str(&dataset_json(9, 8).to_string()).unwrap();
    let mut session = Session::default();
    session.open(dataset, &LocalReducer::default()).await;
    let viewport = Viewport::new(800.0, 600.0);
    let camera = fitted_camera(viewport);

    session.box_select(
        ScreenRect::from_corners([0.0, 0.0], [800.0, 600.0]),
        viewport,
        &camera,
    );
    let before = session.selection().clone();

    let summary = session.box_select(
        ScreenRect::from_corners([400.0, 300.0], [405.0, 305.0]),
        viewport,
        &camera,
    );
    assert!(summary.is_none());
    assert_eq!(session.selection(), &before);
}

#[tokio::test]
async fn test_click_at_projected_point_toggles_selection() {
    let points = [
        [-15.0, 0.0, 0.0],
        [0.0, 12.0, 0.0],
        [15.0, -10.0, 0.0],
    ];
    let dataset = Dataset::from_json_str(&dataset_json(3, 8).to_string())
        .unwrap()
        .with_precomputed(Algorithm::Pca, &points);
    let mut session = Session::default();
    session.load_dataset(dataset);
    session
        .set_algorithm(Algorithm::Pca, &LocalReducer::default())
        .await;

    let viewport = Viewport::new(800.0, 600.0);
    let camera = fitted_camera(viewport);
    let Projected::Ndc { x, y, .. } = camera.project_to_ndc(points[1]) else {
        panic!("point should be in front of the camera");
    };
    let cursor = viewport.ndc_to_pixel(x, y);

    assert_eq!(session.click_at(cursor, &camera, viewport), Some(1));
    assert_eq!(session.colors()[1], Color::GREEN);

    // Hover is suppressed while a click selection is active.
    assert!(!session.hover_at([0.0, 0.0], &camera, viewport));

    assert_eq!(session.click_at(cursor, &camera, viewport), None);
    assert_eq!(session.colors()[1], session.base_colors().get(1));

    assert_eq!(session.click_at([1.0, 1.0], &camera, viewport), None);
    assert!(session.hover_at(cursor, &camera, viewport));
    assert_eq!(session.selection().hovered(), Some(1));
}

// ============================================================================
// Test 4: Search
// ============================================================================

#[tokio::test]
async fn test_semantic_search_highlights_cluster() {
    let dim = 120;
    let dataset = Dataset::from_json_str(&dataset_json(12, dim).to_string()).unwrap();
    let mut session = Session::default();
    session.open(dataset, &LocalReducer::default()).await;

    let query: Vec<f32> = (0..dim).map(|d| if d % 3 == 0 { 1.0 } else { 0.0 }).collect();
    let report = session
        .search("code changes", &StaticEmbedder::new(query))
        .await;

    let SearchReport::Completed { mode, matches, status } = report else {
        panic!("search should complete");
    };
    assert_eq!(mode, SearchMode::Semantic);
    assert_eq!(status, OperationStatus::Ready);
    assert_eq!(matches, 4);
    assert!(session.matches().keys().all(|i| i % 3 == 0));

    let dim_factor = session.config().colors.dim_factor;
    assert_eq!(
        session.colors()[1],
        session.base_colors().get(1).scaled(dim_factor)
    );
}

#[tokio::test]
async fn test_unavailable_embedder_degrades_to_text_matching() {
    let dataset = Dataset::from_json_str(&dataset_json(12, 120).to_string()).unwrap();
    let mut session = Session::default();
    session.open(dataset, &LocalReducer::default()).await;

    let report = session.search("decision entry", &NullEmbedder).await;
    let SearchReport::Completed { mode, matches, status } = report else {
        panic!("search should complete");
    };
    assert_eq!(mode, SearchMode::Lexical);
    assert_eq!(matches, 4);
    assert!(matches!(status, OperationStatus::Degraded(_)));
    assert!(matches!(
        session.search_status(),
        OperationStatus::Degraded(_)
    ));

    let previews = session
        .search_outcome()
        .previews(session.dataset().unwrap(), 2);
    assert_eq!(previews.len(), 2);
    assert!(previews.iter().all(|p| p.snippet.starts_with("decision")));
}

#[tokio::test]
async fn test_box_selection_outranks_search_highlight() {
    let dataset = Dataset::from_json_str(&dataset_json(6, 8).to_string()).unwrap();
    let mut session = Session::default();
    session.open(dataset, &LocalReducer::default()).await;
    session.search("pipeline", &NullEmbedder).await;
    assert_eq!(session.matches().len(), 6);

    let viewport = Viewport::new(800.0, 600.0);
    let camera = fitted_camera(viewport);
    session.box_select(
        ScreenRect::from_corners([0.0, 0.0], [800.0, 600.0]),
        viewport,
        &camera,
    );
    assert!(session.colors().iter().all(|c| *c == Color::CYAN));

    session.clear_selection();
    assert!(session.colors().iter().all(|c| *c != Color::CYAN));
}

// ============================================================================
// Test 5: Configuration
// ============================================================================

#[test]
fn test_partial_config_file_keeps_defaults() {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = write_json(
        &temp_dir,
        "atlas.json",
        &json!({
            "projection": { "scale": 10.0 },
            "search": { "max_results": 5 },
            "colors": { "mode": "time" }
        }),
    );

    let config = AtlasConfig::load(&path).expect("config should load");
    assert_eq!(config.projection.scale, 10.0);
    assert_eq!(config.projection.umap_neighbors, 15);
    assert_eq!(config.search.max_results, 5);
    assert_eq!(config.search.score_floor, 0.3);
    assert_eq!(config.animation.step, 0.02);
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = write_json(&temp_dir, "bad.json", &json!({ "animation": { "step": 0.0 } }));
    assert!(AtlasConfig::load(&path).is_err());
}
