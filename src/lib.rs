//! # Map Manager
//!
//! Uploads a robot map directory as one logical map record.
//!
//! A map directory is produced by the mapping pipeline and holds up to six
//! artifacts: metadata, an occupancy-grid PNG, a Cartographer pose graph,
//! a node graph, an area tree, and zones. The loader validates whatever is
//! present, then the dispatcher either sends the bundle to a running map
//! service or commits it directly into the map database.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌────────────┐   remote   ┌──────────────┐
//! │  map dir    │──▶│  Loader    │──────────▶│  map service  │
//! │ (6 files)   │   │ MapBundle  │           │ (mapctl serve)│
//! └─────────────┘   └─────┬──────┘           └──────┬───────┘
//!                         │ direct                  │
//!                         ▼                         ▼
//!                   ┌───────────┐             ┌───────────┐
//!                   │ Committer │────────────▶│  SQLite   │
//!                   └───────────┘             └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mapctl init                              # create database
//! mapctl upload ./maps/warehouse           # direct upload
//! mapctl upload ./maps/warehouse --service-name map_manager
//! mapctl serve                             # run the map service
//! mapctl list
//! mapctl export warehouse ./out/warehouse
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`map_info`] | Map identity and grid metadata |
//! | [`loader`] | Map directory loading and validation |
//! | [`graph`] | Node graph and area tree adapters |
//! | [`zone`] | Zone polygons |
//! | [`dispatch`] | Remote vs direct transport |
//! | [`service`] | Map service client |
//! | [`commit`] | Database commit of a bundle |
//! | [`store`] | Map storage backends |
//! | [`server`] | Map service HTTP server |
//! | [`config`] | TOML configuration parsing |

pub mod artifact;
pub mod clock;
pub mod commit;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod graph;
pub mod list;
pub mod loader;
pub mod map_info;
pub mod migrate;
pub mod models;
pub mod msg;
pub mod server;
pub mod service;
pub mod store;
pub mod thumbnail;
pub mod upload;
pub mod zone;
