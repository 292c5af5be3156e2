//! Capacity-constrained supply routing for electrical distribution networks.
//!
//! The physical network (plants, substations, consumers and the segments
//! between them) is overlaid with a logical supply forest rooted at the
//! generation plants. Every consumer is kept connected to a supplier with
//! room for its load; overloads are repaired by shedding, and a device
//! simulator keeps loads moving over time.

pub mod api;
pub mod backend;
pub mod config;
pub mod domain;
pub mod error;
pub mod io;
pub mod network;
pub mod routing;
pub mod simulation;
pub mod snapshot;
pub mod telemetry;
