//! HTTP service for the consulting analysis assistant.
//!
//! Wires the analysis pipeline, account handling and plan board behind an
//! axum router. Storage sits behind per-concern traits in [`storage`].

pub mod auth;
pub mod coordinator;
pub mod http_server;
pub mod storage;
