//! Remote-mode backend: PostgreSQL-backed CRUD with hybrid plan
//! resolution, batched template lookups, and auth-failure interception.

mod client;
pub mod guard;
pub mod plans;
pub mod sql;

pub use client::RemoteClient;
pub use plans::PlanProvider;
