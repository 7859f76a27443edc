//! atril-data: the data-access layer of a music-practice tracker.
//!
//! Gives every feature a uniform CRUD surface over two interchangeable
//! backends (an in-process mirror store and hosted PostgreSQL), translating
//! between camelCase caller keys and snake_case columns, resolving the
//! hybrid plan reference/snapshot model with batched lookups, and
//! intercepting authentication failures.

pub mod case;
pub mod config;
pub mod contract;
pub mod entity;
pub mod error;
pub mod events;
pub mod local;
pub mod mode;
pub mod plan;
pub mod profile;
pub mod remote;
pub mod schema;

pub use config::Settings;
pub use contract::{DataClient, DeleteResult};
pub use entity::{EntityKind, Role};
pub use error::DataError;
pub use events::{AuthEvents, AuthFailureEvent};
pub use local::{LocalClient, LocalStore, WriteHandler};
pub use mode::{resolve_mode, ClientFactory, DataMode, SessionKeys};
pub use plan::PlanSource;
pub use remote::RemoteClient;
pub use schema::ensure_tables;
