use crate::models::Listing;
use std::collections::HashSet;

/// What one subscriber's fresh batch means against their baseline
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Listings to announce
    pub to_notify: Vec<Listing>,
    /// The baseline to persist: the batch, deduplicated
    pub baseline: Vec<Listing>,
    /// Whether this batch populated an absent baseline
    pub first_population: bool,
    /// Clear the announce flag once `to_notify` has been dispatched
    pub clear_announce_flag: bool,
}

/// Drop repeated fingerprints, keeping the first occurrence
pub fn dedupe(batch: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::with_capacity(batch.len());
    batch
        .into_iter()
        .filter(|listing| seen.insert(listing.fingerprint.clone()))
        .collect()
}

/// Decide what is new in `batch` and what the next baseline is.
///
/// An empty stored baseline counts as no baseline. The new baseline always
/// replaces the old one wholesale; listings that disappeared are not reported.
/// A flag still set against an existing baseline is stale and only cleared.
pub fn reconcile(baseline: Option<&[Listing]>, batch: Vec<Listing>, announce: bool) -> Reconciliation {
    let batch = dedupe(batch);

    if batch.is_empty() {
        return Reconciliation {
            to_notify: Vec::new(),
            baseline: batch,
            first_population: false,
            clear_announce_flag: false,
        };
    }

    match baseline.filter(|stored| !stored.is_empty()) {
        None => Reconciliation {
            to_notify: if announce { batch.clone() } else { Vec::new() },
            baseline: batch,
            first_population: true,
            clear_announce_flag: announce,
        },
        Some(stored) => {
            let known: HashSet<&str> = stored.iter().map(|l| l.fingerprint.as_str()).collect();
            let to_notify = batch
                .iter()
                .filter(|listing| !known.contains(listing.fingerprint.as_str()))
                .cloned()
                .collect();
            Reconciliation {
                to_notify,
                baseline: batch,
                first_population: false,
                clear_announce_flag: announce,
            }
        }
    }
}
