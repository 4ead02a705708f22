//! Well-known network config keys and helpers.

/// Prefix of the free-form user namespace.
pub const USER_PREFIX: &str = "user.";

/// Config keys that only apply to the member they were set on and are never replicated.
pub const MEMBER_SPECIFIC_KEYS: &[&str] =
    &["bgp.ipv4.nexthop", "bgp.ipv6.nexthop", "bridge.external_interfaces", "parent"];

/// Config key naming the network a network depends on.
pub const DEPENDENCY_KEY: &str = "network";

/// Whether the key is in the free-form user namespace (never validated, never diffed).
pub fn is_user_config(key: &str) -> bool {
    key.starts_with(USER_PREFIX)
}

/// Whether the key only applies to the local member.
pub fn is_member_specific(key: &str) -> bool {
    MEMBER_SPECIFIC_KEYS.contains(&key)
}

/// Whether a config value is a true-like boolean.
pub fn is_true(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Split a comma separated list, trimming whitespace around each entry.
///
/// An empty or blank input yields no entries; empty entries between commas are kept.
pub fn split_list(value: &str) -> Vec<&str> {
    if value.trim().is_empty() {
        return Vec::new();
    }
    value.split(',').map(str::trim).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_config() {
        assert!(is_user_config("user.foo"));
        assert!(!is_user_config("username"));
        assert!(!is_user_config("ipv4.address"));
    }

    #[test]
    fn test_member_specific() {
        assert!(is_member_specific("parent"));
        assert!(is_member_specific("bgp.ipv6.nexthop"));
        assert!(!is_member_specific("ipv4.address"));
    }

    #[test]
    fn test_split_list() {
        assert!(split_list("").is_empty());
        assert!(split_list("  ").is_empty());
        assert_eq!(split_list("80, 81-82 ,90"), vec!["80", "81-82", "90"]);
        assert_eq!(split_list("80,,81"), vec!["80", "", "81"]);
    }
}
