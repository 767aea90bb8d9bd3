//! `mapctl upload`: load one map directory and persist it.
//!
//! Loading happens first and completely; any missing mandatory file or
//! malformed artifact stops the run before a database connection is opened
//! or the service is contacted.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::dispatch::{dispatch, select_transport, DispatchOutcome, Transport};
use crate::error::UploadError;
use crate::loader::{load_bundle, MapBundle};
use crate::service::{HttpMapServiceClient, MapServiceClient};
use crate::store::sqlite::SqliteMapStore;
use crate::store::MapStore;

/// Command-line options of one upload.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub dir: PathBuf,
    /// Overrides `[service].name`.
    pub service_name: Option<String>,
    /// Never contact the service, even when one is configured.
    pub direct: bool,
    /// Load and validate only.
    pub dry_run: bool,
}

/// Load `dir` and send it over `transport`.
///
/// Nothing is sent and `open_store` is never called unless the whole
/// directory loads cleanly.
pub async fn upload_dir<S, F, Fut>(
    dir: &Path,
    transport: Transport,
    clock: &dyn Clock,
    open_store: F,
) -> Result<(MapBundleSummary, DispatchOutcome), UploadError>
where
    S: MapStore,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<S, UploadError>>,
{
    let bundle = load_bundle(dir)?;
    let summary = MapBundleSummary::of(&bundle);
    let outcome = dispatch(bundle, transport, clock, open_store).await?;
    Ok((summary, outcome))
}

pub async fn run_upload(config: &Config, opts: &UploadOptions) -> Result<()> {
    if opts.dry_run {
        let bundle = load_bundle(&opts.dir)?;
        MapBundleSummary::of(&bundle).print("upload (dry-run)");
        return Ok(());
    }

    let service_name = opts
        .service_name
        .clone()
        .unwrap_or_else(|| config.service.name.clone());

    let client: Option<Box<dyn MapServiceClient>> = match &config.service.endpoint {
        Some(endpoint) if !opts.direct => {
            Some(Box::new(HttpMapServiceClient::new(endpoint, &service_name)?))
        }
        _ => None,
    };

    let endpoint_wanted = config.service.endpoint.is_some() && !opts.direct;
    let transport = select_transport(
        &service_name,
        client,
        config.service.discovery_timeout(),
    );
    if endpoint_wanted && !transport.is_remote() {
        warn!(
            "service.endpoint is set but no service name is configured; uploading directly to {}",
            config.db.path.display()
        );
    }

    let (summary, outcome) = upload_dir(&opts.dir, transport, &SystemClock, move || async move {
        info!("Connecting to {}", config.db.path.display());
        SqliteMapStore::open(config)
            .await
            .map_err(UploadError::persistence)
    })
    .await?;

    summary.print("upload");
    match outcome {
        DispatchOutcome::Remote { service_name } => {
            println!("  sent to service: {}", service_name);
        }
        DispatchOutcome::Committed(record) => {
            println!("  stored in: {}", config.db.path.display());
            println!("  record id: {}", record.id);
        }
    }
    info!("Done uploading map {}", summary.name);
    println!("ok");

    Ok(())
}

/// What a loaded bundle contained, for reporting.
#[derive(Debug, Clone)]
pub struct MapBundleSummary {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub resolution: f64,
    pub origin: (f64, f64),
    pub present: Vec<&'static str>,
}

impl MapBundleSummary {
    pub fn of(bundle: &MapBundle) -> Self {
        let info = &bundle.map_info;
        Self {
            name: info.name.clone(),
            width: info.width,
            height: info.height,
            resolution: info.resolution,
            origin: (info.origin_x, info.origin_y),
            present: bundle.present_files(),
        }
    }

    fn print(&self, title: &str) {
        println!("{} {}", title, self.name);
        println!(
            "  grid: {}x{} cells @ {} m/cell, origin ({}, {})",
            self.width, self.height, self.resolution, self.origin.0, self.origin.1
        );
        if self.present.is_empty() {
            println!("  artifacts: (metadata only)");
        } else {
            println!("  artifacts: {}", self.present.join(", "));
        }
    }
}
