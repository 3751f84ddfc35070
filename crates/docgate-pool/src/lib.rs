//! Bounded connection pool.
//!
//! Connections are leased through [`PooledConnection`] guards that return
//! them on drop, so a slot is released on every exit path.

pub mod config;
pub mod connector;
pub mod error;
pub mod pool;

pub use config::PoolConfig;
pub use connector::Connector;
pub use error::{PoolError, PoolResult};
pub use pool::{Pool, PoolStatus, PooledConnection};
