//! Transport selection and hand-off.
//!
//! An upload goes one of two ways, decided once per run by
//! [`select_transport`]:
//!
//! - [`Transport::Remote`]: the bundle is packed into one [`AddMapRequest`]
//!   and sent to the map service, which persists it.
//! - [`Transport::Direct`]: the bundle is committed straight into the map
//!   database by [`commit`].
//!
//! Remote is chosen only when a service name is configured *and* a live
//! client is available; every other combination goes direct.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info};

use crate::artifact::Artifact;
use crate::clock::Clock;
use crate::commit::commit;
use crate::error::UploadError;
use crate::graph::{AreaTree, NodeGraph};
use crate::loader::{MapBundle, AREA_TREE_FILE, NODE_GRAPH_FILE, OCCUPANCY_GRID_FILE, ZONES_FILE};
use crate::map_info::MapInfo;
use crate::models::MapRecord;
use crate::msg::{AddMapRequest, CompressedImage};
use crate::service::MapServiceClient;
use crate::store::MapStore;
use crate::zone::Zone;

/// Default for `[service].discovery_timeout_secs`.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the service lives and how long to wait for it to appear.
pub struct RemoteTarget {
    pub service_name: String,
    pub client: Box<dyn MapServiceClient>,
    pub discovery_timeout: Duration,
}

pub enum Transport {
    Remote(RemoteTarget),
    Direct,
}

impl Transport {
    pub fn is_remote(&self) -> bool {
        matches!(self, Transport::Remote(_))
    }
}

/// Result of a successful dispatch.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The service acknowledged the upload.
    Remote { service_name: String },
    /// The bundle was committed locally.
    Committed(MapRecord),
}

pub fn select_transport(
    service_name: &str,
    client: Option<Box<dyn MapServiceClient>>,
    discovery_timeout: Duration,
) -> Transport {
    match client {
        Some(client) if !service_name.is_empty() => Transport::Remote(RemoteTarget {
            service_name: service_name.to_string(),
            client,
            discovery_timeout,
        }),
        _ => Transport::Direct,
    }
}

/// Send `bundle` over `transport`.
///
/// `open_store` is called only on the direct path, so a remote upload never
/// touches the database.
pub async fn dispatch<S, F, Fut>(
    bundle: MapBundle,
    transport: Transport,
    clock: &dyn Clock,
    open_store: F,
) -> Result<DispatchOutcome, UploadError>
where
    S: MapStore,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<S, UploadError>>,
{
    match transport {
        Transport::Remote(target) => {
            send_remote(&bundle, &target, clock).await?;
            Ok(DispatchOutcome::Remote {
                service_name: target.service_name,
            })
        }
        Transport::Direct => {
            info!("Uploading map directly to database");
            let store = open_store().await?;
            let record = commit(&store, bundle, clock).await?;
            Ok(DispatchOutcome::Committed(record))
        }
    }
}

async fn send_remote(
    bundle: &MapBundle,
    target: &RemoteTarget,
    clock: &dyn Clock,
) -> Result<(), UploadError> {
    info!("Uploading map via service {}", target.service_name);
    let request = build_request(bundle, clock);

    info!("Waiting for AddMap service...");
    if let Err(e) = target
        .client
        .wait_for_service(target.discovery_timeout)
        .await
    {
        error!("{}", e);
        return Err(e);
    }

    info!("Calling AddMap service...");
    let response = target.client.add_map(&request).await.map_err(|e| {
        error!("{}", e);
        e
    })?;

    if !response.success {
        error!("Map service rejected the upload: {}", response.message);
        return Err(UploadError::RemoteRejected(response.message));
    }
    Ok(())
}

/// Pack a bundle into one service request.
///
/// Absent graphs become empty strings, absent zones an empty list, and an
/// absent grid an empty PNG payload.
pub fn build_request(bundle: &MapBundle, clock: &dyn Clock) -> AddMapRequest {
    let text = |a: &Artifact<String>| a.as_ref().into_option().cloned().unwrap_or_default();

    AddMapRequest {
        map_info: bundle.map_info.to_message(clock),
        node_graph: text(&bundle.node_graph),
        area_tree: text(&bundle.area_tree),
        zones: match &bundle.zones {
            Artifact::Present(zones) => zones.iter().map(Zone::to_msg).collect(),
            Artifact::Absent => Vec::new(),
        },
        occupancy_grid: CompressedImage {
            format: "png".to_string(),
            data: bundle
                .occupancy_grid
                .as_ref()
                .into_option()
                .cloned()
                .unwrap_or_default(),
        },
        pbstream: bundle.pbstream.as_ref().into_option().cloned(),
    }
}

/// Unpack a service request into a bundle, validating every artifact.
///
/// The wire cannot tell an absent artifact from an empty one, so empty
/// strings, empty image data, and an empty zone list all read as absent.
pub fn bundle_from_request(request: AddMapRequest) -> Result<MapBundle, UploadError> {
    let map_info = MapInfo::from_message(&request.map_info)
        .map_err(|e| UploadError::parse("map_info", e))?;

    let occupancy_grid = if request.occupancy_grid.data.is_empty() {
        Artifact::Absent
    } else if !request.occupancy_grid.format.eq_ignore_ascii_case("png") {
        return Err(UploadError::parse(
            OCCUPANCY_GRID_FILE,
            format!("unsupported format '{}'", request.occupancy_grid.format),
        ));
    } else {
        Artifact::Present(request.occupancy_grid.data)
    };

    let node_graph = if request.node_graph.is_empty() {
        Artifact::Absent
    } else {
        let graph = NodeGraph::from_json(&request.node_graph)
            .map_err(|e| UploadError::parse(NODE_GRAPH_FILE, e))?;
        Artifact::Present(
            graph
                .to_json()
                .map_err(|e| UploadError::parse(NODE_GRAPH_FILE, e))?,
        )
    };

    let area_tree = if request.area_tree.is_empty() {
        Artifact::Absent
    } else {
        let tree = AreaTree::from_json(&request.area_tree)
            .map_err(|e| UploadError::parse(AREA_TREE_FILE, e))?;
        Artifact::Present(
            tree.to_json()
                .map_err(|e| UploadError::parse(AREA_TREE_FILE, e))?,
        )
    };

    let zones = if request.zones.is_empty() {
        Artifact::Absent
    } else {
        let zones = request
            .zones
            .iter()
            .map(Zone::from_msg)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| UploadError::parse(ZONES_FILE, e))?;
        Artifact::Present(zones)
    };

    Ok(MapBundle {
        map_info,
        occupancy_grid,
        pbstream: request.pbstream.into(),
        node_graph,
        area_tree,
        zones,
    })
}
