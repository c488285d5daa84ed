//! Simulation kernel for a cycle-accurate non-uniform cache hierarchy
//! simulator.
//!
//! This crate implements the four pieces every hardware component graph is
//! built on:
//! 1. **Substrate:** [`ring`] (fixed-capacity FIFOs) and [`link`] (double-
//!    buffered connections plus the [`link::Component`] capability trait).
//! 2. **Engine:** [`engine`] drives the global clock loop, pumps the trace
//!    reader into fetcher connections, and checks termination.
//! 3. **Configuration:** [`config`] (the raw YAML value tree and file
//!    inclusion) and [`builder`] (two-pass graph instantiation from that
//!    tree, with forward references and shared anchors resolved).
//! 4. **Trace ingestion:** [`trace`] parses the three-file binary trace
//!    format and exposes a lazy, per-thread instruction stream.
//!
//! The standard hardware component library that exercises all of the above
//! lives in [`components`].

/// Error taxonomy and small shared value types (`Addr`, `round_down_pow2`).
pub mod common;
/// Configuration value tree: YAML parsing and `include:` resolution.
pub mod config;
/// Two-pass graph builder: definitions, instances, parameter resolution.
pub mod builder;
/// The component/link substrate: rings, connections, the `Component` trait.
pub mod link;
/// Wire types exchanged over connections (instructions, memory, predictor).
pub mod packet;
/// Fixed-capacity FIFO ring buffer.
pub mod ring;
/// The top-level clock loop and trace-pumping scheduler.
pub mod engine;
/// Binary trace format: static dictionary, dynamic stream, memory stream.
pub mod trace;
/// Reference hardware components exercising the substrate contract.
pub mod components;

pub use common::{Location, SimError, SimResult};
pub use engine::Engine;
