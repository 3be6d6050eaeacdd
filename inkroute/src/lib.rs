//! InkRoute - orchestration core for an e-paper GPS tracker
//!
//! This library ingests a GPS position stream, renders map and navigation
//! screens, drives turn-by-turn navigation along a precomputed route and
//! prefetches route-related data (speed limits, POIs, elevation, road
//! surface, place names) in the background.
//!
//! # High-Level API
//!
//! The [`orchestrator`] module provides the façade the device runs:
//!
//! ```ignore
//! use inkroute::orchestrator::OrchestratorBuilder;
//!
//! let orchestrator = OrchestratorBuilder::new(config, gps, routes, renderer, display)
//!     .build();
//! orchestrator.initialize().await?;
//! orchestrator.set_active_gpx("tracks/commute.json").await?;
//! orchestrator.start_auto_update()?;
//! ```

pub mod cache;
pub mod config;
pub mod display;
pub mod events;
pub mod geo;
pub mod logging;
pub mod navigation;
pub mod orchestrator;
pub mod position;
pub mod prefetch;
pub mod route;
pub mod service;

/// Version of the InkRoute library and CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
