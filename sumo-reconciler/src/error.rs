use sumo_types::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] sumo_store::Error),

    #[error(transparent)]
    Orchestrator(#[from] sumo_orchestrator::Error),

    #[error(transparent)]
    Planner(#[from] sumo_storage_planner::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Store(e) => e.kind(),
            Error::Orchestrator(e) => e.kind(),
            Error::Planner(e) => e.kind(),
        }
    }
}
