//! HTTP API handlers for musan-server

pub mod analyze;

pub use analyze::analyze_routes;
