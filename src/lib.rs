pub mod args;
pub mod checker;
pub mod compose;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod ports;
pub mod report;
pub mod rollback;
pub mod start;
pub mod utils;
pub mod version;

pub use args::Args;
pub use checker::{CheckContext, CheckOutcome, CheckerConfig, UpdateChecker};
pub use domain::{
    BatchContainerDetail, CheckReport, CheckStatus, Container, ContainerUpdate, RollbackStrategy,
    RollbackTarget,
};
pub use errors::{AppError, RegistryError, RuntimeError, UpdateCheckError};
pub use ports::{RegistryPort, RuntimePort};
pub use rollback::resolve_rollback_version;
pub use start::run_app;
