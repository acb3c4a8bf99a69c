//! CLI command implementations

pub mod credentials;
pub mod run;
pub mod setup;

pub use run::{RunArgs, RunExit, EXIT_INTERRUPTED};
pub use setup::SetupArgs;
