use sumo_types::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tenant {0} already registered")]
    TenantExists(String),

    #[error("database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TenantExists(_) => ErrorKind::Conflict,
            Error::Db(_) | Error::Pool(_) => ErrorKind::Internal,
        }
    }
}
