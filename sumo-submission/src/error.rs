use sumo_types::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid submission: {0}")]
    InvalidInput(String),

    #[error("payload exceeds the configured size limit")]
    PayloadTooLarge,

    #[error("too many concurrent jobs ({active}/{max})")]
    TooManyJobs { active: i64, max: i32 },

    #[error(transparent)]
    Orchestrator(#[from] sumo_orchestrator::Error),

    #[error(transparent)]
    Store(#[from] sumo_store::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::PayloadTooLarge => ErrorKind::PayloadTooLarge,
            Error::TooManyJobs { .. } => ErrorKind::TooManyJobs,
            Error::Orchestrator(e) => e.kind(),
            Error::Store(e) => e.kind(),
        }
    }
}
