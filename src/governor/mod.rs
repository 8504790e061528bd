//! Multi-credential request governor.
//!
//! Spreads calls to a quota-limited upstream across a pool of interchangeable
//! credentials. Each credential keeps a rolling window of call timestamps and
//! is only handed out while the window has room; a process-wide minimum
//! interval spaces out every dispatched call; credentials the upstream rejects
//! are frozen until their window frees up.
//!
//! Building blocks, from the bottom up:
//! - [`window`]: the pure rolling-window check
//! - [`Credential`] and [`Lease`]: per-credential state and the handle a caller gets
//! - [`CredentialPool`]: the credential set, with eligibility and cooldown bookkeeping
//! - [`SelectionPolicy`]: tie-break among eligible credentials
//! - [`RequestGovernor`]: the async front end with acquire, dispatch, and rejection handling

mod credential;
mod pool;
mod request;
mod selection;
pub mod window;

pub use credential::{redact, Credential, CredentialId, Lease};
pub use pool::CredentialPool;
pub use request::{AcquireStep, RejectionOutcome, RequestGovernor};
pub use selection::{choose, SelectionPolicy};
pub use window::WindowCheck;
