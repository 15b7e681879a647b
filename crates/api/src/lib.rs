//! HTTP API: server, routing, and the per-request authorization pipeline.

pub mod app;
pub mod context;
pub mod guards;
pub mod middleware;
pub mod pipeline;
