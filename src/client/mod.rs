//! Chat client: session controller, crisis detection, quick replies and the
//! HTTP client for the coach proxy.

pub mod crisis;
pub mod proxy_client;
pub mod quick_replies;
pub mod session;

pub use crisis::CrisisExitPolicy;
pub use proxy_client::{CoachProxy, HttpCoachProxy};
pub use session::{QuickReplyOutcome, SessionController, SessionStore, FALLBACK_REPLY};
