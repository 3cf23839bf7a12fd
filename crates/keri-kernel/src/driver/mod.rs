//! Delegated transport: the [`Controller`](crate::Controller) over loopback
//! HTTP.
//!
//! - [`server::router`] serves any controller.
//! - [`DriverClient`] is a controller backed by a remote driver.
//! - [`DriverProcess`] spawns and supervises a driver program.

pub mod client;
pub mod process;
pub mod server;
pub mod types;

pub use client::DriverClient;
pub use process::{wait_for_ready, DriverProcess};
pub use server::router;
