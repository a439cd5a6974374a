//! # Merge Executor
//!
//! Applies a [`Resolution`]: every losing primary candidate becomes a
//! direct secondary of the true primary, and so do the secondaries it
//! already had. Re-pointing the existing secondaries keeps links flattened;
//! without it they would be stranded on a now-demoted id.

use crate::resolver::Resolution;
use crate::store::ContactTx;
use anyhow::Result;
use tracing::debug;

/// Demote all losing candidates under the true primary. Returns the number
/// of rows rewritten. Every write lands in the active transaction.
pub fn execute(tx: &mut dyn ContactTx, resolution: &Resolution) -> Result<usize> {
    let target = resolution.true_primary.id;
    let mut rewritten = 0;

    for candidate in &resolution.demoted {
        // Existing secondaries first, then the candidate itself, so no
        // intermediate state points a secondary at another secondary.
        for member in tx.find_cluster(candidate.id)? {
            if member.id != candidate.id {
                tx.update_to_secondary(member.id, target)?;
                rewritten += 1;
            }
        }
        tx.update_to_secondary(candidate.id, target)?;
        rewritten += 1;
        debug!(demoted = %candidate.id, primary = %target, "merged cluster");
    }

    Ok(rewritten)
}
