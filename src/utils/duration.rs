//! Duration parsing utilities.
//!
//! Block spacing and similar settings may be written either as a plain
//! number of seconds or as a string with a unit suffix (`"5s"`, `"2m"`,
//! `"1h"`).

/// Parse duration string (e.g., "5s", "30m", "1h") to seconds
///
/// Supported suffixes:
/// - Seconds: "s", "sec", "secs", "second", "seconds"
/// - Minutes: "m", "min", "mins", "minute", "minutes"
/// - Hours: "h", "hr", "hrs", "hour", "hours"
/// - Days: "d", "day", "days"
///
/// A bare number is taken as seconds.
///
/// # Arguments
/// * `duration` - The duration string to parse
///
/// # Returns
/// * `Ok(u64)` - The duration in seconds if parsing succeeds
/// * `Err(String)` - An error message if parsing fails
///
/// # Examples
/// ```
/// use ringsim::utils::duration::parse_duration_to_seconds;
///
/// assert_eq!(parse_duration_to_seconds("5"), Ok(5));
/// assert_eq!(parse_duration_to_seconds("5s"), Ok(5));
/// assert_eq!(parse_duration_to_seconds("2m"), Ok(120));
/// assert!(parse_duration_to_seconds("soon").is_err());
/// ```
pub fn parse_duration_to_seconds(duration: &str) -> Result<u64, String> {
    let duration = duration.trim();
    let split = duration
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(duration.len());
    let (number, unit) = duration.split_at(split);
    if number.is_empty() {
        return Err(format!("Invalid duration format: {}", duration));
    }
    let value: u64 = number
        .parse()
        .map_err(|_| format!("Invalid duration format: {}", duration))?;

    let multiplier = match unit.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600,
        "d" | "day" | "days" => 86_400,
        _ => return Err(format!("Invalid duration format: {}", duration)),
    };
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Duration out of range: {}", duration))
}

/// Serde helper for second counts written as `5` or `"5s"`.
pub mod seconds {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Count(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Seconds::deserialize(deserializer)? {
            Seconds::Count(value) => Ok(value),
            Seconds::Text(text) => super::parse_duration_to_seconds(&text).map_err(de::Error::custom),
        }
    }
}
