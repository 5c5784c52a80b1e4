use std::fs;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use futures::executor::block_on;
use serde_json::json;
use tempfile::TempDir;

use crate::error::ArmorViewError;
use crate::view::ViewPlane;
use crate::{ArmorViewer, ArmorViewerBuilder};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn write_armor(dir: &TempDir, name: &str, hash: &str) {
    let source = json!({
        "metadata": { "hash": hash },
        "armor": {
            "1": [
                [[1.0, 1.0, 0.0], [3.0, 1.0, 0.0], [3.0, 3.0, 0.0]],
                [[1.0, 1.0, 0.0], [3.0, 3.0, 0.0], [1.0, 3.0, 0.0]]
            ]
        }
    });
    fs::write(dir.path().join(format!("{name}.json")), source.to_string()).unwrap();
}

fn viewer(armor: &TempDir, cache: &TempDir) -> ArmorViewer {
    ArmorViewer::builder(armor.path(), cache.path())
        .with_workers(1)
        .build()
        .unwrap()
}

#[test]
fn builds_persists_and_memoizes() {
    let armor = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_armor(&armor, "M", "h1");
    let viewer = viewer(&armor, &cache);

    let first = block_on(viewer.armor_view("M", ViewPlane::Front)).unwrap();
    assert!(first.contains_key(&1));

    // Persisted under the designator, stamped with the source hash.
    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(cache.path().join("M.front.json")).unwrap())
            .unwrap();
    assert_eq!(on_disk["metadata"]["hash"], "h1");
    assert!(on_disk["view"]["1"].is_array());

    // The second call observes the very same resolved entry.
    let second = block_on(viewer.armor_view("M", ViewPlane::Front)).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn a_matching_disk_entry_skips_generation() {
    let armor = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_armor(&armor, "M", "h1");

    // A marker view no builder would produce for this source.
    let canned = json!({
        "metadata": { "hash": "h1" },
        "view": { "9": [[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]] }
    });
    fs::write(cache.path().join("M.front.json"), canned.to_string()).unwrap();

    let view = block_on(viewer(&armor, &cache).armor_view("M", ViewPlane::Front)).unwrap();
    assert!(view.contains_key(&9), "disk entry was not served");
    assert!(!view.contains_key(&1));
}

#[test]
fn hash_comparison_is_case_insensitive() {
    let armor = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_armor(&armor, "M", "AbCd09");
    let canned = json!({
        "metadata": { "hash": "aBcD09" },
        "view": { "9": [[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]] }
    });
    fs::write(cache.path().join("M.front.json"), canned.to_string()).unwrap();

    let view = block_on(viewer(&armor, &cache).armor_view("M", ViewPlane::Front)).unwrap();
    assert!(view.contains_key(&9));
}

#[test]
fn a_stale_disk_entry_is_regenerated_and_rewritten() {
    init_logging();
    let armor = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_armor(&armor, "M", "NEW");
    let stale = json!({ "metadata": { "hash": "OLD" }, "view": { "1": [] } });
    fs::write(cache.path().join("M.front.json"), stale.to_string()).unwrap();

    let view = block_on(viewer(&armor, &cache).armor_view("M", ViewPlane::Front)).unwrap();
    assert!(!view[&1].is_empty(), "stale view must be rebuilt");

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(cache.path().join("M.front.json")).unwrap())
            .unwrap();
    assert_eq!(on_disk["metadata"]["hash"], "NEW");
}

#[test]
fn a_malformed_disk_entry_counts_as_missing() {
    let armor = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_armor(&armor, "M", "h1");
    fs::write(cache.path().join("M.front.json"), "{not json").unwrap();

    let view = block_on(viewer(&armor, &cache).armor_view("M", ViewPlane::Front)).unwrap();
    assert!(view.contains_key(&1));
}

#[test]
fn views_cache_independently_per_designator() {
    let armor = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_armor(&armor, "M", "h1");
    let viewer = viewer(&armor, &cache);

    block_on(viewer.armor_view("M", ViewPlane::Front)).unwrap();
    block_on(viewer.armor_view("M", ViewPlane::Side)).unwrap();
    assert!(cache.path().join("M.front.json").exists());
    assert!(cache.path().join("M.side.json").exists());
    assert!(!cache.path().join("M.top.json").exists());
}

#[test]
fn a_missing_source_is_surfaced() {
    let armor = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let result = block_on(viewer(&armor, &cache).armor_view("nope", ViewPlane::Front));
    assert!(matches!(result, Err(ArmorViewError::SourceMissing { .. })));
}

#[test]
fn a_malformed_source_is_surfaced() {
    let armor = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    fs::write(armor.path().join("M.json"), "]").unwrap();
    let result = block_on(viewer(&armor, &cache).armor_view("M", ViewPlane::Front));
    assert!(matches!(result, Err(ArmorViewError::SourceMalformed { .. })));
}

#[test]
fn a_source_without_a_hash_is_malformed() {
    let armor = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let source = json!({ "metadata": {}, "armor": {} });
    fs::write(armor.path().join("M.json"), source.to_string()).unwrap();
    let result = block_on(viewer(&armor, &cache).armor_view("M", ViewPlane::Front));
    assert!(matches!(result, Err(ArmorViewError::SourceMalformed { .. })));
}

#[test]
fn an_unknown_view_name_is_rejected() {
    let armor = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_armor(&armor, "M", "h1");
    let result = block_on(viewer(&armor, &cache).armor_view_named("M", "rear"));
    assert!(matches!(result, Err(ArmorViewError::InvalidView(name)) if name == "rear"));
}

#[test]
fn concurrent_requests_share_one_generation() {
    init_logging();
    let armor = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_armor(&armor, "M", "h1");

    let calls = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicBool::new(false));
    let viewer = {
        let calls = calls.clone();
        let released = released.clone();
        Arc::new(
            ArmorViewerBuilder::new(armor.path(), cache.path())
                .with_workers(1)
                // The filter runs inside generation: counting its calls
                // counts builder runs, and spinning holds the build open
                // until both requests are in flight.
                .with_piece_filter(move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    while !released.load(Ordering::SeqCst) {
                        thread::sleep(Duration::from_millis(1));
                    }
                    true
                })
                .build()
                .unwrap(),
        )
    };

    let spawn_request = |viewer: Arc<ArmorViewer>| {
        thread::spawn(move || block_on(viewer.armor_view("M", ViewPlane::Front)).unwrap())
    };
    let a = spawn_request(viewer.clone());
    let b = spawn_request(viewer.clone());

    thread::sleep(Duration::from_millis(100));
    released.store(true, Ordering::SeqCst);

    let view_a = a.join().unwrap();
    let view_b = b.join().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1, "the builder must run exactly once");
    assert!(Arc::ptr_eq(&view_a, &view_b));
}
