//! Config value validators.
//!
//! A validator is a pure function from a config value to an error message.
//! Rule sets map config keys to validators; see [`crate::network::NetworkCommon::validate`].

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// Validation result carrying a human readable reason on failure.
pub type ValidateResult = std::result::Result<(), String>;

/// Shared validator function.
pub type Validator = Arc<dyn Fn(&str) -> ValidateResult + Send + Sync>;

/// Validators keyed by config key.
pub type Rules = HashMap<String, Validator>;

/// Wrap a validator so that it is applied as-is (empty values are checked too).
pub fn required<F>(f: F) -> Validator
where
    F: Fn(&str) -> ValidateResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a validator so that an empty value is always accepted.
pub fn optional<F>(f: F) -> Validator
where
    F: Fn(&str) -> ValidateResult + Send + Sync + 'static,
{
    Arc::new(move |value: &str| if value.is_empty() { Ok(()) } else { f(value) })
}

/// Accept any value.
pub fn is_any(_value: &str) -> ValidateResult {
    Ok(())
}

/// Accept boolean-like values ("true", "false", "1", "0", "yes", "no", "on", "off").
pub fn is_bool(value: &str) -> ValidateResult {
    match value.to_lowercase().as_str() {
        "true" | "false" | "1" | "0" | "yes" | "no" | "on" | "off" => Ok(()),
        _ => Err(format!("Invalid value for a boolean {:?}", value)),
    }
}

/// Accept an integer within `min..=max`.
pub fn is_in_range(min: u64, max: u64) -> impl Fn(&str) -> ValidateResult + Send + Sync + 'static {
    move |value: &str| {
        let n = value
            .parse::<u64>()
            .map_err(|_| format!("Invalid value for an integer {:?}", value))?;
        if n < min || n > max {
            return Err(format!("Value must be between {} and {}", min, max));
        }
        Ok(())
    }
}

/// Accept an IPv4 or IPv6 address.
pub fn is_network_address(value: &str) -> ValidateResult {
    value.parse::<IpAddr>().map(|_| ()).map_err(|_| format!("Not an IP address {:?}", value))
}

/// Accept an IPv4 address.
pub fn is_network_address_v4(value: &str) -> ValidateResult {
    match value.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => Ok(()),
        _ => Err(format!("Not an IPv4 address {:?}", value)),
    }
}

/// Accept an IPv6 address.
pub fn is_network_address_v6(value: &str) -> ValidateResult {
    match value.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => Ok(()),
        _ => Err(format!("Not an IPv6 address {:?}", value)),
    }
}

/// Accept an address in CIDR notation (host bits may be set).
pub fn is_network_address_cidr(value: &str) -> ValidateResult {
    value
        .parse::<ipnet::IpNet>()
        .map(|_| ())
        .map_err(|_| format!("Not a CIDR address {:?}", value))
}

/// Accept a value usable as a single URL path segment.
pub fn is_url_segment_safe(value: &str) -> ValidateResult {
    for c in ['/', '?', '&', '+'] {
        if value.contains(c) {
            return Err(format!("Cannot contain {:?}", c));
        }
    }
    Ok(())
}
