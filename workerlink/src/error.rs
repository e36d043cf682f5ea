use config::ConfigError;
use snafu::prelude::*;
use workerlink_core::WorkerError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApplicationError {
    #[snafu(display("Could not load the worker configuration"))]
    Configuration { source: ConfigError },
    #[snafu(display("Expected a dispatcher to be registered"))]
    MissingDispatcher,
    #[snafu(context(false), display("{}", source))]
    Worker { source: WorkerError },
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;
