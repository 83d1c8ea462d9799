mod local;
mod reconcile;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use local::LocalSessionService;
pub use reconcile::{ActiveSession, Reconciliation, SessionReconciler};
pub use view::CurrentEntryView;
pub use workflow::{QuizSessionService, SubmitOutcome};
