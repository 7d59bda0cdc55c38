//! Sandbox boundary for model-requested operations.
//!
//! Two independent checks gate everything the model can do:
//!
//! - [`PathGuard`] pins every filesystem path to a single root
//!   directory, after canonicalization (so `..` segments and symlinks
//!   cannot escape it).
//! - [`CommandFilter`] rejects shell commands matching a syntactic
//!   denylist before they are ever spawned.
//!
//! The command filter is best-effort: it reduces the space of dangerous
//! commands but is not an isolation boundary. A command that passes the
//! filter still runs with the agent's own privileges, confined only by
//! the working directory. This is a documented limitation, not a bug.

mod command;
mod path;

pub use command::CommandFilter;
pub use path::PathGuard;
