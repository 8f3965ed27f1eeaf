//! Typed client for the manor hosted backend.
//!
//! The house's data lives in a managed relational backend; dashboards read
//! rows through its REST layer and drive physical devices through serverless
//! control functions. This crate provides the thin typed client both the
//! agent and any future surface use:
//!
//! - [`BackendClient`]: validated base URL, API key headers, row reads and
//!   function invocation
//! - Row types for the feeds the pages render: [`LaundryMachine`],
//!   [`LightGroup`], [`SensorSample`]

pub mod client;
pub mod error;
pub mod rows;

pub use client::BackendClient;
pub use error::{BackendError, Result};
pub use rows::{LaundryMachine, LaundryState, LightGroup, SensorSample};
