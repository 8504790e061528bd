//! A single upstream credential and the lease handed to callers.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::window::{self, WindowCheck};

/// Index of a credential inside its pool. Stable for the process lifetime.
pub type CredentialId = usize;

/// Number of characters kept on each side of a redacted secret.
const LABEL_EDGE_CHARS: usize = 4;

/// Returns a log-safe label for a secret: `abcd…wxyz`, or `****` if too short.
pub fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= LABEL_EDGE_CHARS * 2 {
        return "****".to_string();
    }
    let head: String = chars[..LABEL_EDGE_CHARS].iter().collect();
    let tail: String = chars[chars.len() - LABEL_EDGE_CHARS..].iter().collect();
    format!("{}…{}", head, tail)
}

/// One upstream access key with its rolling usage history.
pub struct Credential {
    id: CredentialId,
    secret: Arc<str>,
    label: Arc<str>,
    history: VecDeque<Instant>,
    frozen_until: Option<Instant>,
    usage_count: u64,
}

impl Credential {
    pub(crate) fn new(id: CredentialId, secret: &str) -> Self {
        Credential {
            id,
            secret: Arc::from(secret),
            label: Arc::from(redact(secret)),
            history: VecDeque::new(),
            frozen_until: None,
            usage_count: 0,
        }
    }

    pub fn id(&self) -> CredentialId {
        self.id
    }

    /// Redacted form of the secret, safe to log.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Total claims on this credential since startup.
    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }

    pub fn frozen_until(&self) -> Option<Instant> {
        self.frozen_until
    }

    /// A credential is frozen while its cooldown end lies in the future.
    pub fn is_frozen(&self, now: Instant) -> bool {
        matches!(self.frozen_until, Some(until) if until > now)
    }

    /// Remaining cooldown, or `None` when not frozen.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.frozen_until
            .filter(|until| *until > now)
            .map(|until| until.saturating_duration_since(now))
    }

    pub(crate) fn window_check(
        &mut self,
        now: Instant,
        window: Duration,
        max_calls: usize,
    ) -> WindowCheck {
        window::check(&mut self.history, now, window, max_calls)
    }

    /// Calls still counted inside the window at `now`.
    pub(crate) fn calls_in_window(&mut self, now: Instant, window: Duration) -> usize {
        window::prune(&mut self.history, now, window);
        self.history.len()
    }

    pub(crate) fn record_use(&mut self, now: Instant) {
        self.history.push_back(now);
        self.usage_count += 1;
    }

    /// Moves a claimed slot from its claim time to the moment the call actually
    /// goes out.
    ///
    /// If the claim already aged out of the window while it was queued, the
    /// call only goes ahead when the window still has room for it. Returns
    /// false when it does not; the caller must claim again.
    pub(crate) fn confirm_dispatch(
        &mut self,
        claimed_at: Instant,
        dispatched_at: Instant,
        window: Duration,
        max_calls: usize,
    ) -> bool {
        window::prune(&mut self.history, dispatched_at, window);
        match self.history.iter().position(|ts| *ts == claimed_at) {
            Some(pos) => {
                self.history.remove(pos);
            }
            None if self.history.len() >= max_calls => return false,
            None => {}
        }
        self.history.push_back(dispatched_at);
        true
    }

    /// Freezes until `until`. An existing later cooldown is kept.
    pub(crate) fn freeze(&mut self, until: Instant) {
        self.frozen_until = Some(match self.frozen_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    /// Clears an elapsed cooldown. Returns true if the credential was restored.
    pub(crate) fn restore_if_expired(&mut self, now: Instant) -> bool {
        match self.frozen_until {
            Some(until) if until <= now => {
                self.frozen_until = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn lease(&self, claimed_at: Instant) -> Lease {
        Lease {
            id: self.id,
            secret: Arc::clone(&self.secret),
            label: Arc::clone(&self.label),
            claimed_at,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("in_history", &self.history.len())
            .field("frozen_until", &self.frozen_until)
            .field("usage_count", &self.usage_count)
            .finish()
    }
}

/// A claimed credential, returned by the governor for exactly one upstream call.
///
/// The window slot is already recorded when a lease is handed out; dropping a
/// lease never needs to give anything back.
#[derive(Clone)]
pub struct Lease {
    id: CredentialId,
    secret: Arc<str>,
    label: Arc<str>,
    claimed_at: Instant,
}

impl Lease {
    pub fn id(&self) -> CredentialId {
        self.id
    }

    /// When the window slot was claimed.
    pub fn claimed_at(&self) -> Instant {
        self.claimed_at
    }

    /// The raw secret to authenticate the upstream call with. Never log this.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}
