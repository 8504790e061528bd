//! Tie-break policy among eligible credentials.

use clap::ValueEnum;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;

use super::credential::CredentialId;

/// How the governor picks one credential when several are eligible.
///
/// `LeastUsed` is the default: the credential with the lowest lifetime usage
/// count wins, ties broken uniformly at random. `Random` picks uniformly among
/// all eligible credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Lowest usage count first, random among equals
    #[default]
    LeastUsed,
    /// Uniform random among eligible credentials
    Random,
}

/// Picks a credential from `(id, usage_count)` candidates.
///
/// Returns `None` only when `candidates` is empty.
pub fn choose<R: Rng + ?Sized>(
    policy: SelectionPolicy,
    candidates: &[(CredentialId, u64)],
    rng: &mut R,
) -> Option<CredentialId> {
    match policy {
        SelectionPolicy::Random => candidates.choose(rng).map(|(id, _)| *id),
        SelectionPolicy::LeastUsed => {
            let min_usage = candidates.iter().map(|(_, usage)| *usage).min()?;
            let least_used: Vec<CredentialId> = candidates
                .iter()
                .filter(|(_, usage)| *usage == min_usage)
                .map(|(id, _)| *id)
                .collect();
            least_used.choose(rng).copied()
        }
    }
}
