//! Command handler modules
//!
//! Glue between the command line and the library: establishing a session and
//! running a playlist sync.

pub mod onboarding;
pub mod sync;

pub use onboarding::ensure_session;
pub use sync::handle_sync;
