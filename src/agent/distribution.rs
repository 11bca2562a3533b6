//! Population allocation across profiles.
//!
//! Agents are allocated proportionally to the configured weights using
//! integer division. The last profile in configuration order absorbs the
//! rounding remainder, so the allocation always sums to the target size.

use log::{debug, info, warn};

/// Errors raised while allocating a population
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DistributionError {
    #[error("agent distribution is empty")]
    Empty,

    #[error("agent distribution weights sum to zero")]
    ZeroWeight,
}

/// Allocate `target_size` agents across `distribution`.
///
/// # Arguments
///
/// * `target_size` - Total number of agents to create
/// * `distribution` - Profile weights in configuration order
///
/// # Returns
///
/// * Per-profile agent counts, in the order of `distribution`
pub fn allocate_agents(
    target_size: usize,
    distribution: &[(String, u32)],
) -> Result<Vec<(String, usize)>, DistributionError> {
    let Some(((last_profile, last_weight), rest)) = distribution.split_last() else {
        return Err(DistributionError::Empty);
    };
    let total_weight: u64 = distribution.iter().map(|(_, weight)| u64::from(*weight)).sum();
    if total_weight == 0 {
        return Err(DistributionError::ZeroWeight);
    }

    let mut allocation = Vec::with_capacity(distribution.len());
    let mut allocated = 0usize;
    for (profile, weight) in rest {
        let count = (target_size as u64 * u64::from(*weight) / total_weight) as usize;
        debug!("Allocating {} agents to profile '{}' (weight {})", count, profile, weight);
        allocated += count;
        allocation.push((profile.clone(), count));
    }

    // Adjust for rounding: the last profile takes whatever is left.
    let remainder_count = target_size - allocated;
    let exact = (target_size as u64 * u64::from(*last_weight) / total_weight) as usize;
    if exact != remainder_count {
        warn!(
            "Agent distribution does not divide {} evenly; profile '{}' receives {} agents instead of {}",
            target_size, last_profile, remainder_count, exact
        );
    }
    allocation.push((last_profile.clone(), remainder_count));

    info!(
        "Allocated {} agents: {}",
        target_size,
        allocation
            .iter()
            .map(|(profile, count)| format!("{}={}", profile, count))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(allocation)
}
