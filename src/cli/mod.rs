pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod plan;
pub mod run;
pub mod runtime;
pub mod validate;
pub mod workflows;

pub use plan::{cmd_plan, PlanArgs};
pub use run::{cmd_run, RunArgs};
pub use validate::{cmd_validate, ValidateArgs};
pub use workflows::cmd_workflows;
