use sumo_types::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Orchestrator(#[from] sumo_orchestrator::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Orchestrator(e) => e.kind(),
        }
    }
}
