//! Library-level tests of the upload pipeline: directory loading, transport
//! selection, the remote service round trip, and commits into SQLite.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use map_manager::artifact::Artifact;
use map_manager::clock::FixedClock;
use map_manager::config::Config;
use map_manager::dispatch::{select_transport, DispatchOutcome, Transport};
use map_manager::error::UploadError;
use map_manager::loader::{
    load_bundle, AREA_TREE_FILE, MAP_INFO_FILE, NODE_GRAPH_FILE, OCCUPANCY_GRID_FILE,
    PBSTREAM_FILE, ZONES_FILE,
};
use map_manager::msg::{AddMapRequest, AddMapResponse};
use map_manager::server::{router, AppState};
use map_manager::service::{HttpMapServiceClient, MapServiceClient};
use map_manager::store::memory::InMemoryMapStore;
use map_manager::store::sqlite::SqliteMapStore;
use map_manager::store::MapStore;
use map_manager::upload::upload_dir;
use tempfile::TempDir;

// ─── Fixtures ───────────────────────────────────────────────────────

const NODE_GRAPH: &str = r#"{
    "nodes": [{"id": 1, "x": 0.0, "y": 0.0}, {"id": 2, "x": 3.0, "y": 4.0}],
    "edges": [{"source": 1, "target": 2}]
}"#;

const AREA_TREE: &str = r#"{"root": {"name": "site", "children": [{"name": "hall"}, {"name": "yard"}]}}"#;

const ZONES: &str = r#"[
    {"name": "charger", "polygon": [{"x": 0, "y": 0}, {"x": 1, "y": 0}, {"x": 1, "y": 1}]}
]"#;

fn map_info_json(name: &str) -> String {
    format!(
        r#"{{
    "name": "{}",
    "description": "test map",
    "created": "2024-05-01T09:00:00",
    "modified": "2024-05-02T10:30:00",
    "meta_data": {{
        "resolution": 0.05,
        "width": 640,
        "height": 480,
        "origin_x": -16.0,
        "origin_y": -12.0
    }}
}}"#,
        name
    )
}

fn grid_png(w: u32, h: u32, shade: u8) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([shade])))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn optional_files() -> [(&'static str, Vec<u8>); 5] {
    [
        (OCCUPANCY_GRID_FILE, grid_png(640, 480, 254)),
        (PBSTREAM_FILE, vec![0x1f, 0x8b, 0x08, 0x00, 0x42]),
        (NODE_GRAPH_FILE, NODE_GRAPH.as_bytes().to_vec()),
        (AREA_TREE_FILE, AREA_TREE.as_bytes().to_vec()),
        (ZONES_FILE, ZONES.as_bytes().to_vec()),
    ]
}

/// A map directory with `map_info.json` and every optional file.
fn full_map_dir(name: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(MAP_INFO_FILE), map_info_json(name)).unwrap();
    for (file, bytes) in optional_files() {
        fs::write(tmp.path().join(file), bytes).unwrap();
    }
    tmp
}

fn sqlite_config(dir: &Path) -> Config {
    let mut config = Config::minimal();
    config.db.path = dir.join("maps.sqlite");
    config
}

fn clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap())
}

/// A client that counts calls and answers with a fixed response.
struct ScriptedClient {
    calls: Arc<AtomicUsize>,
    response: AddMapResponse,
}

#[async_trait]
impl MapServiceClient for ScriptedClient {
    async fn wait_for_service(&self, _timeout: Duration) -> Result<(), UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn add_map(&self, _request: &AddMapRequest) -> Result<AddMapResponse, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

fn scripted(response: AddMapResponse) -> (Transport, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = ScriptedClient {
        calls: calls.clone(),
        response,
    };
    let transport = select_transport(
        "map_manager",
        Some(Box::new(client)),
        Duration::from_secs(1),
    );
    (transport, calls)
}

// ─── Loading ────────────────────────────────────────────────────────

#[test]
fn test_every_subset_of_optional_files() {
    let files = optional_files();
    for mask in 0u32..32 {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MAP_INFO_FILE), map_info_json("subset")).unwrap();
        for (i, (file, bytes)) in files.iter().enumerate() {
            if mask & (1 << i) != 0 {
                fs::write(tmp.path().join(file), bytes).unwrap();
            }
        }

        let bundle = load_bundle(tmp.path()).unwrap();
        let present = [
            bundle.occupancy_grid.is_present(),
            bundle.pbstream.is_present(),
            bundle.node_graph.is_present(),
            bundle.area_tree.is_present(),
            bundle.zones.is_present(),
        ];
        for (i, is_present) in present.iter().enumerate() {
            assert_eq!(
                *is_present,
                mask & (1 << i) != 0,
                "mask {:05b}: {} presence mismatch",
                mask,
                files[i].0
            );
        }

        if mask & 1 != 0 {
            assert_eq!(bundle.occupancy_grid, Artifact::Present(files[0].1.clone()));
        }
        if mask & 2 != 0 {
            assert_eq!(bundle.pbstream, Artifact::Present(files[1].1.clone()));
        }
    }
}

#[test]
fn test_empty_zones_file_is_present() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(MAP_INFO_FILE), map_info_json("lab")).unwrap();
    fs::write(tmp.path().join(ZONES_FILE), "[]").unwrap();

    let bundle = load_bundle(tmp.path()).unwrap();
    assert_eq!(bundle.zones, Artifact::Present(Vec::new()));
}

#[test]
fn test_map_info_is_parsed() {
    let tmp = full_map_dir("warehouse");
    let bundle = load_bundle(tmp.path()).unwrap();
    assert_eq!(bundle.map_info.name, "warehouse");
    assert_eq!(bundle.map_info.width, 640);
    assert_eq!(bundle.map_info.origin_x, -16.0);
    assert_eq!(
        bundle.map_info.created,
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    );
}

#[test]
fn test_malformed_map_info_rejected() {
    let tmp = full_map_dir("lab");
    fs::write(tmp.path().join(MAP_INFO_FILE), r#"{"name": "lab", "meta_data": {}}"#).unwrap();

    let err = load_bundle(tmp.path()).unwrap_err();
    assert!(matches!(
        err,
        UploadError::ArtifactParse {
            file: MAP_INFO_FILE,
            ..
        }
    ));
}

#[test]
fn test_missing_directory() {
    let err = load_bundle(Path::new("/definitely/not/a/map/dir")).unwrap_err();
    assert!(matches!(err, UploadError::NotADirectory(_)));
}

#[test]
fn test_grid_that_is_not_png_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(MAP_INFO_FILE), map_info_json("lab")).unwrap();
    fs::write(tmp.path().join(OCCUPANCY_GRID_FILE), b"P5\n1 1\n255\n\x00").unwrap();

    let err = load_bundle(tmp.path()).unwrap_err();
    assert!(matches!(
        err,
        UploadError::ArtifactParse {
            file: OCCUPANCY_GRID_FILE,
            ..
        }
    ));
}

// ─── Abort before I/O ───────────────────────────────────────────────

#[tokio::test]
async fn test_missing_map_info_makes_no_calls() {
    let tmp = full_map_dir("lab");
    fs::remove_file(tmp.path().join(MAP_INFO_FILE)).unwrap();

    let store = InMemoryMapStore::new();
    let opened = AtomicUsize::new(0);
    let (opened_ref, store_ref) = (&opened, &store);
    let err = upload_dir(tmp.path(), Transport::Direct, &clock(), move || async move {
        opened_ref.fetch_add(1, Ordering::SeqCst);
        Ok(store_ref.clone())
    })
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        UploadError::MissingMandatoryArtifact {
            file: MAP_INFO_FILE,
            ..
        }
    ));
    assert_eq!(opened.load(Ordering::SeqCst), 0);
    assert_eq!(store.calls(), 0);

    let (transport, remote_calls) = scripted(AddMapResponse::ok());
    let err = upload_dir(tmp.path(), transport, &clock(), || async {
        Ok(InMemoryMapStore::new())
    })
    .await
    .unwrap_err();
    assert!(matches!(err, UploadError::MissingMandatoryArtifact { .. }));
    assert_eq!(remote_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_node_graph_never_dispatched() {
    let tmp = full_map_dir("lab");
    fs::write(tmp.path().join(NODE_GRAPH_FILE), "{\"nodes\": [").unwrap();

    let store = InMemoryMapStore::new();
    let opened = store.clone();
    let err = upload_dir(tmp.path(), Transport::Direct, &clock(), move || async move {
        Ok(opened)
    })
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        UploadError::ArtifactParse {
            file: NODE_GRAPH_FILE,
            ..
        }
    ));
    assert_eq!(store.calls(), 0);

    let (transport, remote_calls) = scripted(AddMapResponse::ok());
    let result = upload_dir(tmp.path(), transport, &clock(), || async {
        Ok(InMemoryMapStore::new())
    })
    .await;
    assert!(result.is_err());
    assert_eq!(remote_calls.load(Ordering::SeqCst), 0);
}

// ─── Remote transport ───────────────────────────────────────────────

#[tokio::test]
async fn test_remote_rejection_surfaces_message() {
    let tmp = full_map_dir("lab");
    let (transport, calls) = scripted(AddMapResponse::failed("disk full"));
    let store = InMemoryMapStore::new();
    let opened = store.clone();

    let err = upload_dir(tmp.path(), transport, &clock(), move || async move {
        Ok(opened)
    })
    .await
    .unwrap_err();

    match err {
        UploadError::RemoteRejected(message) => assert_eq!(message, "disk full"),
        other => panic!("expected RemoteRejected, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.calls(), 0, "remote path must not open the local store");
}

#[tokio::test]
async fn test_unreachable_service_times_out() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpMapServiceClient::new(&format!("http://{}", addr), "map_manager").unwrap();
    let transport = select_transport(
        "map_manager",
        Some(Box::new(client)),
        Duration::from_secs(1),
    );

    let tmp = full_map_dir("lab");
    let err = upload_dir(tmp.path(), transport, &clock(), || async {
        Ok(InMemoryMapStore::new())
    })
    .await
    .unwrap_err();
    assert!(matches!(err, UploadError::RemoteUnavailable { .. }));
}

#[tokio::test]
async fn test_remote_upload_through_service() {
    let server_store = InMemoryMapStore::new();
    let state = AppState {
        store: Arc::new(server_store.clone()),
        clock: Arc::new(clock()),
    };
    let app = router("map_manager", state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = HttpMapServiceClient::new(&format!("http://{}/", addr), "map_manager").unwrap();
    let transport = select_transport(
        "map_manager",
        Some(Box::new(client)),
        Duration::from_secs(5),
    );

    let tmp = full_map_dir("remote-lab");
    let (summary, outcome) = upload_dir(tmp.path(), transport, &clock(), || async {
        Ok(InMemoryMapStore::new())
    })
    .await
    .unwrap();

    assert_eq!(summary.name, "remote-lab");
    assert!(matches!(outcome, DispatchOutcome::Remote { .. }));

    let record = server_store
        .find_by_name("remote-lab")
        .await
        .unwrap()
        .expect("record stored by the service");
    assert_eq!(record.width, 640);
    assert_eq!(record.pbstream, Some(vec![0x1f, 0x8b, 0x08, 0x00, 0x42]));
    assert_eq!(record.zones.len(), 1);
    assert!(record.thumbnail.is_some());
    assert!(record.node_graph.unwrap().contains("\"edges\""));
}

#[tokio::test]
async fn test_service_reports_invalid_request() {
    let state = AppState {
        store: Arc::new(InMemoryMapStore::new()),
        clock: Arc::new(clock()),
    };
    let app = router("map_manager", state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // No meta_data: the service answers but refuses the map.
    let request: AddMapRequest =
        serde_json::from_str(r#"{"map_info": {"name": "broken"}}"#).unwrap();
    let client = HttpMapServiceClient::new(&format!("http://{}", addr), "map_manager").unwrap();
    client
        .wait_for_service(Duration::from_secs(5))
        .await
        .unwrap();
    let response = client.add_map(&request).await.unwrap();
    assert!(!response.success);
    assert!(response.message.contains("meta_data"));
}

#[tokio::test]
async fn test_large_pose_graph_through_service() {
    let server_store = InMemoryMapStore::new();
    let state = AppState {
        store: Arc::new(server_store.clone()),
        clock: Arc::new(clock()),
    };
    let app = router("map_manager", state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // 6 MiB of pose graph is well past axum's default body limit once
    // base64-encoded.
    let pbstream: Vec<u8> = (0..6 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    let tmp = full_map_dir("big-site");
    fs::write(tmp.path().join(PBSTREAM_FILE), &pbstream).unwrap();

    let client = HttpMapServiceClient::new(&format!("http://{}", addr), "map_manager").unwrap();
    let transport = select_transport(
        "map_manager",
        Some(Box::new(client)),
        Duration::from_secs(5),
    );
    let (_, outcome) = upload_dir(tmp.path(), transport, &clock(), || async {
        Ok(InMemoryMapStore::new())
    })
    .await
    .unwrap();
    assert!(matches!(outcome, DispatchOutcome::Remote { .. }));

    let record = server_store
        .find_by_name("big-site")
        .await
        .unwrap()
        .expect("record stored by the service");
    assert_eq!(record.pbstream.map(|p| p.len()), Some(pbstream.len()));
}

// ─── Direct commit into SQLite ──────────────────────────────────────

#[tokio::test]
async fn test_direct_insert_then_update() {
    let db_dir = TempDir::new().unwrap();
    let config = &sqlite_config(db_dir.path());

    let first_dir = full_map_dir("warehouse");
    let (_, outcome) = upload_dir(first_dir.path(), Transport::Direct, &clock(), move || async move {
        SqliteMapStore::open(config)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))
    })
    .await
    .unwrap();
    let first = match outcome {
        DispatchOutcome::Committed(record) => record,
        other => panic!("expected a commit, got {:?}", other),
    };

    // Second upload: new grid, no graphs, no zones file.
    let second_dir = TempDir::new().unwrap();
    fs::write(second_dir.path().join(MAP_INFO_FILE), map_info_json("warehouse")).unwrap();
    fs::write(
        second_dir.path().join(OCCUPANCY_GRID_FILE),
        grid_png(1200, 300, 0),
    )
    .unwrap();
    upload_dir(second_dir.path(), Transport::Direct, &clock(), move || async move {
        SqliteMapStore::open(config)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))
    })
    .await
    .unwrap();

    let store = SqliteMapStore::open(config).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);

    let stored = store.find_by_name("warehouse").await.unwrap().unwrap();
    assert_eq!(stored.id, first.id);
    assert_eq!(stored.image, Some(grid_png(1200, 300, 0)));
    assert_ne!(stored.thumbnail, first.thumbnail);
    let thumb = image::load_from_memory_with_format(
        stored.thumbnail.as_deref().unwrap(),
        ImageFormat::Pnm,
    )
    .unwrap();
    assert_eq!((thumb.width(), thumb.height()), (400, 100));

    assert_eq!(stored.node_graph, first.node_graph);
    assert_eq!(stored.area_tree, first.area_tree);
    assert_eq!(stored.pbstream, first.pbstream);
    assert_eq!(stored.zones, first.zones);
    assert_eq!(stored.modified, clock().0);

    let maps = store.list().await.unwrap();
    assert_eq!(maps.len(), 1);
    assert_eq!(maps[0].zone_count, 1);
    assert!(maps[0].has_image && maps[0].has_node_graph);
    store.close().await;
}

#[tokio::test]
async fn test_export_reloads_as_same_bundle() {
    let db_dir = TempDir::new().unwrap();
    let config = &sqlite_config(db_dir.path());
    let src = full_map_dir("roundtrip");

    let (_, outcome) = upload_dir(src.path(), Transport::Direct, &clock(), move || async move {
        SqliteMapStore::open(config)
            .await
            .map_err(|e| UploadError::Persistence(e.to_string()))
    })
    .await
    .unwrap();
    let record = match outcome {
        DispatchOutcome::Committed(record) => record,
        other => panic!("expected a commit, got {:?}", other),
    };

    let out: PathBuf = db_dir.path().join("export");
    let written = map_manager::export::write_map_dir(&record, &out).unwrap();
    assert_eq!(written.len(), 6);

    let original = load_bundle(src.path()).unwrap();
    let reloaded = load_bundle(&out).unwrap();
    assert_eq!(reloaded.occupancy_grid, original.occupancy_grid);
    assert_eq!(reloaded.pbstream, original.pbstream);
    assert_eq!(reloaded.node_graph, original.node_graph);
    assert_eq!(reloaded.area_tree, original.area_tree);
    assert_eq!(reloaded.zones, original.zones);
    assert_eq!(reloaded.map_info.modified, clock().0);
}

#[tokio::test]
async fn test_export_keeps_cleared_zone_list() {
    let src = TempDir::new().unwrap();
    fs::write(src.path().join(MAP_INFO_FILE), map_info_json("bare")).unwrap();
    fs::write(src.path().join(ZONES_FILE), "[]").unwrap();

    let (_, outcome) = upload_dir(src.path(), Transport::Direct, &clock(), || async {
        Ok(InMemoryMapStore::new())
    })
    .await
    .unwrap();
    let record = match outcome {
        DispatchOutcome::Committed(record) => record,
        other => panic!("expected a commit, got {:?}", other),
    };
    assert!(record.zones.is_empty());

    let out = TempDir::new().unwrap();
    let written = map_manager::export::write_map_dir(&record, out.path()).unwrap();
    assert_eq!(written, vec![MAP_INFO_FILE, ZONES_FILE]);

    // Re-uploading the export must clear zones again, not keep stale ones.
    let reloaded = load_bundle(out.path()).unwrap();
    assert_eq!(reloaded.zones, Artifact::Present(Vec::new()));
}
