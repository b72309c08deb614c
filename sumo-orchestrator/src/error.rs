use sumo_types::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("resource not found")]
    NotFound,

    #[error("orchestrator unavailable: {0}")]
    Unavailable(String),

    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound => ErrorKind::NotFound,
            Error::Unavailable(_) => ErrorKind::OrchestratorUnavailable,
            Error::Kube(_) => ErrorKind::Internal,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// Maps a raw `kube::Error` to our port error, folding a 404 API response
/// into `Error::NotFound` so callers can branch on kind without matching
/// on `kube`'s own error shape.
pub(crate) fn from_kube(e: kube::Error) -> Error {
    if let kube::Error::Api(ref resp) = e {
        if resp.code == 404 {
            return Error::NotFound;
        }
    }
    Error::Kube(e)
}
