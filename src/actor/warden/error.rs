use thiserror::Error;

use crate::actor::executor::ArrangementOutcome;
use crate::layout_engine::grid::GeometryError;
use crate::layout_engine::repository::RepositoryError;
use crate::layout_engine::resolver::ResolveError;
use crate::sys::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("no displays are available")]
    NoDisplays,
    #[error("{} of {} window moves failed", .0.report.failed.len(), .0.report.failed.len() + .0.report.applied)]
    PartialFailure(ArrangementOutcome),
    #[error("persistent store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("saved layouts could not be restored, refusing to overwrite them: {0}")]
    StoreLocked(String),
    #[error("the engine has shut down")]
    EngineStopped,
}

impl From<ResolveError> for EngineError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NoDisplays => EngineError::NoDisplays,
            ResolveError::Geometry(e) => EngineError::Geometry(e),
        }
    }
}

impl EngineError {
    /// The arrangement that was partially carried out, if any.
    pub fn outcome(&self) -> Option<&ArrangementOutcome> {
        match self {
            EngineError::PartialFailure(outcome) => Some(outcome),
            _ => None,
        }
    }
}
