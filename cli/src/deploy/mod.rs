//! Deployment orchestration

pub mod cancel;
pub mod executor;
pub mod fsm;
pub mod messages;
pub mod tasks;

pub use executor::{run_deployment, DeployContext, DeployOptions, DeployOutcome};
pub use fsm::{DeploySession, Stage, Timings};
pub use messages::{DeployMessage, Effect, Report};
