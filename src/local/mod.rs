//! Local-mode backend: a transient in-process mirror of backend data,
//! injected by an external provider and usable before its initial load
//! resolves.

mod client;
mod store;

pub use client::LocalClient;
pub use store::{LocalStore, WriteHandler};
