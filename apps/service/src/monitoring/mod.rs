/// Monitoring engine module - keeps registered endpoints warm
///
/// This module is responsible for:
/// - Describing probe targets and their protocols
/// - Running one check per protocol behind the `Checker` trait
/// - Scheduling every probe on its own interval
/// - Reading the probe set from the registry
pub mod checker;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod source;
pub mod types;

pub use executor::MonitoringExecutor;
pub use registry::CheckerRegistry;
pub use scheduler::MonitoringScheduler;
pub use types::CheckResult;
