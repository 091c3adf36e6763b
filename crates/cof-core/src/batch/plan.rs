//! Batch selection and destination assignment. No I/O.

use rand::Rng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::descriptor::MediaDescriptor;
use crate::ledger::DownloadLedger;
use crate::naming::{self, NamingResolver};

/// One selected item and where it will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub descriptor: MediaDescriptor,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    /// Items not in the ledger before this batch.
    pub pending: usize,
    /// Prefix of the pending list, in catalog order.
    pub items: Vec<PlannedItem>,
}

/// Descriptors whose source URL is not in the ledger, in input order.
pub fn pending<'a>(descriptors: &'a [MediaDescriptor], ledger: &DownloadLedger) -> Vec<&'a MediaDescriptor> {
    descriptors
        .iter()
        .filter(|d| !ledger.contains(&d.source_url))
        .collect()
}

/// Uniform in `min..=max`. Callers validate `min <= max`; a reversed range is swapped.
pub fn batch_size<R: Rng + ?Sized>(min: usize, max: usize, rng: &mut R) -> usize {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    rng.gen_range(lo..=hi)
}

/// Resolves destinations for `items`. A path already owned by another URL
/// (in the ledger or earlier in this batch) gets `_2`, `_3`, ... before the
/// extension.
pub fn assign_destinations(
    items: Vec<MediaDescriptor>,
    resolver: &NamingResolver,
    ledger: &DownloadLedger,
) -> Vec<PlannedItem> {
    let mut claimed: HashSet<PathBuf> = ledger
        .claimed_paths()
        .into_iter()
        .map(Path::to_path_buf)
        .collect();
    items
        .into_iter()
        .map(|descriptor| {
            let base = resolver.resolve(&descriptor);
            let mut destination = base.clone();
            let mut n = 2;
            while claimed.contains(&destination) {
                destination = naming::with_suffix(&base, n);
                n += 1;
            }
            if destination != base {
                tracing::warn!(
                    "{} already taken, writing {} as {}",
                    base.display(),
                    descriptor.source_url,
                    destination.display()
                );
            }
            claimed.insert(destination.clone());
            PlannedItem {
                descriptor,
                destination,
            }
        })
        .collect()
}

/// Pending items, a random batch size, then destinations for the selected prefix.
pub fn plan<R: Rng + ?Sized>(
    descriptors: &[MediaDescriptor],
    ledger: &DownloadLedger,
    resolver: &NamingResolver,
    min: usize,
    max: usize,
    rng: &mut R,
) -> BatchPlan {
    let pending = pending(descriptors, ledger);
    if pending.is_empty() {
        return BatchPlan::default();
    }
    let size = batch_size(min, max, rng).min(pending.len());
    let selected = pending.iter().take(size).map(|d| (*d).clone()).collect();
    BatchPlan {
        pending: pending.len(),
        items: assign_destinations(selected, resolver, ledger),
    }
}
