pub mod alerts;
pub mod error;
pub mod orchestrator;
pub mod reconcile;
pub mod scheduler;

pub use alerts::{AlertSink, ChannelAlertSink, LogAlertSink};
pub use error::PipelineError;
pub use orchestrator::{
    Orchestrator, PassReport, PassSettings, ScanProgress, SiteReport, StopSignal,
};
pub use reconcile::{ReconcileStats, Reconciler};
pub use scheduler::build_scheduler;
