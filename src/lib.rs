//! TrackShift analysis client
//!
//! Submits a baseline/current image pair to the change-analysis backend,
//! follows the resulting job until it finishes, and downloads the annotated
//! images and change list it produces.

pub mod app_state;
pub mod config;
pub mod models;
pub mod services;
pub mod telemetry;
