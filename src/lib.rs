//! PipeGraph - projection pushdown optimization for schema-aware pipeline graphs
//!
//! This crate provides the negotiation and actuation protocol by which a
//! pipeline graph optimizer discovers producer nodes that can avoid
//! materializing fields nobody downstream consumes, and replaces them with
//! equivalent, narrower-output versions before execution begins.

pub mod config;
pub mod core;
pub mod graph;
pub mod optimizer;
