//! Rolling-window quota check for a single credential.
//!
//! The check is pure: it only looks at the history it is handed and the `now`
//! it is given, so every boundary case can be tested without a clock.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Result of a window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCheck {
    /// Whether another call fits inside the window right now.
    pub eligible: bool,
    /// How long until the oldest call leaves the window (zero when eligible).
    pub wait: Duration,
}

impl WindowCheck {
    const ELIGIBLE: WindowCheck = WindowCheck {
        eligible: true,
        wait: Duration::ZERO,
    };
}

/// Drops every timestamp that is no longer inside the window.
///
/// An entry stays only while `now - ts < window`, so a call made exactly one
/// window ago no longer counts.
pub fn prune(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    history.retain(|ts| now.saturating_duration_since(*ts) < window);
}

/// Decides whether a credential with this history may issue a call at `now`.
///
/// Prunes `history` in place, then:
/// - fewer than `max_calls` entries left: eligible, no wait
/// - otherwise: ineligible, wait until the oldest entry ages out
pub fn check(
    history: &mut VecDeque<Instant>,
    now: Instant,
    window: Duration,
    max_calls: usize,
) -> WindowCheck {
    prune(history, now, window);

    if history.len() < max_calls {
        return WindowCheck::ELIGIBLE;
    }

    // History is appended in time order, but min() keeps this correct for any input
    let wait = history
        .iter()
        .min()
        .map(|oldest| (*oldest + window).saturating_duration_since(now))
        .unwrap_or(Duration::ZERO);

    WindowCheck {
        eligible: false,
        wait,
    }
}
