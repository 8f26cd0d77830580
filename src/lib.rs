//! Library crate for media-telemetry-back, exposing modules for the binary and integration tests.

pub mod clock;
pub mod config;
pub mod dao;
mod dto;
mod error;
pub mod flatten;
pub mod media_server;
pub mod player;
pub mod registry;
pub mod routes;
pub mod selector;
pub mod services;
pub mod state;
pub mod store;
