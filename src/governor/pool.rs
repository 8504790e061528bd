//! The set of credentials owned by the governor.
//!
//! Every method takes `now` explicitly and none of them sleep or do I/O, so
//! the governor can run any combination of them inside a single critical
//! section.

use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

use super::credential::{Credential, CredentialId, Lease};
use super::window::WindowCheck;

/// All known credentials plus the window parameters they are checked against.
pub struct CredentialPool {
    credentials: Vec<Credential>,
    window: Duration,
    max_calls: usize,
}

impl CredentialPool {
    /// Builds a pool from configured secrets, in order.
    ///
    /// Blank entries are skipped and duplicates are collapsed so one key
    /// cannot be counted against two histories.
    pub fn new<S: AsRef<str>>(secrets: &[S], window: Duration, max_calls: usize) -> Self {
        let mut seen = HashSet::new();
        let mut credentials = Vec::with_capacity(secrets.len());
        for secret in secrets {
            let secret = secret.as_ref().trim();
            if secret.is_empty() {
                continue;
            }
            if !seen.insert(secret.to_string()) {
                log::warn!(
                    "Ignoring duplicate credential {}",
                    super::credential::redact(secret)
                );
                continue;
            }
            credentials.push(Credential::new(credentials.len(), secret));
        }

        CredentialPool {
            credentials,
            window,
            max_calls,
        }
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn get(&self, id: CredentialId) -> Option<&Credential> {
        self.credentials.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Runs the window check for one credential, ignoring its frozen state.
    pub fn check(&mut self, id: CredentialId, now: Instant) -> Option<WindowCheck> {
        let (window, max_calls) = (self.window, self.max_calls);
        self.credentials
            .get_mut(id)
            .map(|c| c.window_check(now, window, max_calls))
    }

    /// Ids of every non-frozen credential with window capacity left.
    pub fn list_eligible(&mut self, now: Instant) -> Vec<CredentialId> {
        self.eligible_with_usage(now)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    /// Like [`list_eligible`](Self::list_eligible), paired with each usage count.
    pub fn eligible_with_usage(&mut self, now: Instant) -> Vec<(CredentialId, u64)> {
        let (window, max_calls) = (self.window, self.max_calls);
        self.credentials
            .iter_mut()
            .filter(|c| !c.is_frozen(now))
            .filter_map(|c| {
                c.window_check(now, window, max_calls)
                    .eligible
                    .then(|| (c.id(), c.usage_count()))
            })
            .collect()
    }

    /// Shortest wait among credentials that are over quota but not frozen.
    ///
    /// `None` when no such credential exists (empty pool, or all frozen).
    pub fn soonest_available(&mut self, now: Instant) -> Option<Duration> {
        let (window, max_calls) = (self.window, self.max_calls);
        self.credentials
            .iter_mut()
            .filter(|c| !c.is_frozen(now))
            .map(|c| c.window_check(now, window, max_calls))
            .filter(|check| !check.eligible)
            .map(|check| check.wait)
            .min()
    }

    /// Shortest remaining cooldown among frozen credentials.
    pub fn soonest_thaw(&self, now: Instant) -> Option<Duration> {
        self.credentials
            .iter()
            .filter_map(|c| c.cooldown_remaining(now))
            .min()
    }

    /// Appends `now` to the credential's history.
    pub fn record_use(&mut self, id: CredentialId, now: Instant) {
        if let Some(credential) = self.credentials.get_mut(id) {
            credential.record_use(now);
        }
    }

    /// Excludes the credential from selection until `until`.
    pub fn freeze(&mut self, id: CredentialId, until: Instant) {
        if let Some(credential) = self.credentials.get_mut(id) {
            credential.freeze(until);
        }
    }

    /// Clears every cooldown that has elapsed and returns the restored ids.
    pub fn restore_expired(&mut self, now: Instant) -> Vec<CredentialId> {
        self.credentials
            .iter_mut()
            .filter_map(|c| c.restore_if_expired(now).then(|| c.id()))
            .collect()
    }

    /// Calls currently counted in the window for `id`.
    pub fn calls_in_window(&mut self, id: CredentialId, now: Instant) -> usize {
        let window = self.window;
        self.credentials
            .get_mut(id)
            .map(|c| c.calls_in_window(now, window))
            .unwrap_or(0)
    }

    /// Restamps a claimed slot with the time the call is dispatched.
    ///
    /// Returns false if the claim aged out while queued and the window has
    /// since filled up; the slot must then be claimed again.
    pub fn confirm_dispatch(
        &mut self,
        id: CredentialId,
        claimed_at: Instant,
        dispatched_at: Instant,
    ) -> bool {
        let (window, max_calls) = (self.window, self.max_calls);
        self.credentials
            .get_mut(id)
            .is_some_and(|c| c.confirm_dispatch(claimed_at, dispatched_at, window, max_calls))
    }

    pub fn lease(&self, id: CredentialId, claimed_at: Instant) -> Option<Lease> {
        self.credentials.get(id).map(|c| c.lease(claimed_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    fn pool(secrets: &[&str], max_calls: usize) -> CredentialPool {
        CredentialPool::new(secrets, WINDOW, max_calls)
    }

    #[test]
    fn test_new_skips_blank_and_duplicate_secrets() {
        let pool = pool(&["key-aaaa-0001", "  ", "key-bbbb-0002", "key-aaaa-0001"], 2);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(1).map(|c| c.label().to_string()), Some("key-…0002".to_string()));
    }

    #[test]
    fn test_empty_pool() {
        let mut pool = pool(&[], 2);
        let now = Instant::now();
        assert!(pool.is_empty());
        assert!(pool.list_eligible(now).is_empty());
        assert_eq!(pool.soonest_available(now), None);
        assert_eq!(pool.soonest_thaw(now), None);
    }

    #[test]
    fn test_record_use_exhausts_window() {
        let mut pool = pool(&["key-aaaa-0001", "key-bbbb-0002"], 2);
        let now = Instant::now();

        pool.record_use(0, now);
        pool.record_use(0, now + Duration::from_secs(1));

        let later = now + Duration::from_secs(10);
        assert_eq!(pool.list_eligible(later), vec![1]);
        assert_eq!(pool.soonest_available(later), Some(Duration::from_secs(50)));
    }

    #[test]
    fn test_soonest_available_picks_minimum() {
        let mut pool = pool(&["key-aaaa-0001", "key-bbbb-0002"], 1);
        let now = Instant::now();
        pool.record_use(0, now);
        pool.record_use(1, now + Duration::from_secs(20));

        let later = now + Duration::from_secs(30);
        assert!(pool.list_eligible(later).is_empty());
        assert_eq!(pool.soonest_available(later), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_frozen_credentials_are_not_eligible_or_waiting() {
        let mut pool = pool(&["key-aaaa-0001", "key-bbbb-0002"], 2);
        let now = Instant::now();
        pool.freeze(0, now + Duration::from_secs(15));

        assert_eq!(pool.list_eligible(now), vec![1]);
        assert_eq!(pool.soonest_available(now), None);
        assert_eq!(pool.soonest_thaw(now), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_restore_expired_returns_restored_ids() {
        let mut pool = pool(&["key-aaaa-0001", "key-bbbb-0002", "key-cccc-0003"], 2);
        let now = Instant::now();
        pool.freeze(0, now + Duration::from_secs(5));
        pool.freeze(2, now + Duration::from_secs(50));

        assert!(pool.restore_expired(now + Duration::from_secs(4)).is_empty());
        assert_eq!(pool.restore_expired(now + Duration::from_secs(5)), vec![0]);
        assert_eq!(
            pool.list_eligible(now + Duration::from_secs(5)),
            vec![0, 1]
        );
    }

    #[test]
    fn test_check_ignores_frozen_state() {
        let mut pool = pool(&["key-aaaa-0001"], 1);
        let now = Instant::now();
        pool.record_use(0, now);
        pool.freeze(0, now + Duration::from_secs(100));

        let check = pool.check(0, now + Duration::from_secs(1)).unwrap();
        assert!(!check.eligible);
        assert_eq!(check.wait, Duration::from_secs(59));
        assert!(pool.check(7, now).is_none());
    }

    #[test]
    fn test_eligible_with_usage_reports_counts() {
        let mut pool = pool(&["key-aaaa-0001", "key-bbbb-0002"], 5);
        let now = Instant::now();
        pool.record_use(1, now);
        pool.record_use(1, now);
        assert_eq!(pool.eligible_with_usage(now), vec![(0, 0), (1, 2)]);
        assert_eq!(pool.calls_in_window(1, now), 2);
    }

    #[test]
    fn test_confirm_dispatch_restamps_claim() {
        let mut pool = pool(&["key-aaaa-0001"], 1);
        let now = Instant::now();
        pool.record_use(0, now);

        let sent = now + Duration::from_secs(30);
        assert!(pool.confirm_dispatch(0, now, sent));
        // The slot now expires one window after the real call
        assert!(!pool.check(0, now + WINDOW).unwrap().eligible);
        assert!(pool.check(0, sent + WINDOW).unwrap().eligible);
        assert!(!pool.confirm_dispatch(9, now, sent));
    }
}
