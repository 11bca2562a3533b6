//! Configuration validation utilities.
//!
//! Field-level checks shared by the configuration types. They return a
//! plain message; callers wrap it into the matching `ValidationError`.

use log::warn;

/// Validate an action probability
///
/// # Arguments
/// * `action` - Action name, used in the error message
/// * `probability` - Configured selection probability
///
/// # Returns
/// * `Ok(())` if the probability is a number in `[0, 1]`
/// * `Err(String)` with an error message otherwise
///
/// # Examples
/// ```
/// use ringsim::utils::validation::validate_probability;
///
/// assert!(validate_probability("ringshub_Trust", 0.25).is_ok());
/// assert!(validate_probability("ringshub_Trust", 1.5).is_err());
/// ```
pub fn validate_probability(action: &str, probability: f64) -> Result<(), String> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(format!(
            "{}.probability must be between 0 and 1, got {}",
            action, probability
        ));
    }
    Ok(())
}

/// Validate a token amount given in whole tokens
pub fn validate_token_amount(field: &str, tokens: f64) -> Result<(), String> {
    if !tokens.is_finite() || tokens < 0.0 {
        return Err(format!("{} must be a non-negative number, got {}", field, tokens));
    }
    Ok(())
}

/// Validate the agent distribution
///
/// Checks that:
/// - at least one profile is listed
/// - the weights do not all sum to zero
///
/// Profiles with weight zero are allowed but logged, since they never
/// receive agents unless they are last in order.
pub fn validate_distribution(distribution: &[(String, u32)]) -> Result<(), String> {
    if distribution.is_empty() {
        return Err("agent_distribution must list at least one profile".to_string());
    }
    let total: u64 = distribution.iter().map(|(_, weight)| u64::from(*weight)).sum();
    if total == 0 {
        return Err("agent_distribution weights sum to zero".to_string());
    }
    for (profile, weight) in distribution {
        if *weight == 0 {
            warn!("Profile '{}' has weight 0 in agent_distribution", profile);
        }
    }
    Ok(())
}
