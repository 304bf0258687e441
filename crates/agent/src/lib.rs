pub mod composer;
pub mod orchestrator;
pub mod session;

pub use composer::Composer;
pub use orchestrator::{
    APOLOGY_REPLY, GenerationId, GenerationRequest, IgnoreReason, Intent, IntentOutcome, Orchestrator,
    OrchestratorState, Settlement,
};
pub use session::{InsightsSession, SessionEvent, SessionHandle, SessionSnapshot};
