//! Connection factory seam.

use async_trait::async_trait;

/// Opens, checks and closes connections for a [`crate::Pool`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new connection.
    async fn connect(&self) -> Result<Self::Connection, Self::Error>;

    /// Check an idle connection before handing it out again.
    async fn is_valid(&self, _conn: &mut Self::Connection) -> bool {
        true
    }

    /// Dispose of a connection that will not be reused.
    fn close(&self, conn: Self::Connection) {
        drop(conn);
    }
}
