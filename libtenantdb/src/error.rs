use thiserror::Error;

/// Errors surfaced by the tenant database layer.
///
/// `InvalidTenantKey` is a configuration error: it is raised at open time and
/// is never retried. Everything else is an I/O-class failure the caller may
/// log and continue from.
#[derive(Debug, Error)]
pub enum TenantDbError {
    #[error("invalid tenant key: `{0}`")]
    InvalidTenantKey(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed cell value: {0}")]
    Decode(#[from] serde_json::Error),
}
