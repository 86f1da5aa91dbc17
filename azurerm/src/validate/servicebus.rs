use regex::Regex;
use std::sync::LazyLock;

static NAMESPACE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][-a-zA-Z0-9]{4,48}[a-zA-Z0-9]$")
        .expect("NAMESPACE_NAME_REGEX is a valid regex pattern")
});

static QUEUE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]$|^[a-zA-Z0-9][\w.\-/~]{0,258}[\w~]$")
        .expect("QUEUE_NAME_REGEX is a valid regex pattern")
});

static TOPIC_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([-._~a-zA-Z0-9]{0,258}[a-zA-Z0-9])?$")
        .expect("TOPIC_NAME_REGEX is a valid regex pattern")
});

static SUBSCRIPTION_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([-._a-zA-Z0-9]{0,48}[a-zA-Z0-9_])?$")
        .expect("SUBSCRIPTION_NAME_REGEX is a valid regex pattern")
});

/// Shared by authorization rules and subscription rules
static RULE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([-._a-zA-Z0-9]{0,48}[a-zA-Z0-9])?$")
        .expect("RULE_NAME_REGEX is a valid regex pattern")
});

pub const NAMESPACE_SKUS: [&str; 3] = ["Basic", "Standard", "Premium"];
pub const NAMESPACE_CAPACITIES: [i64; 6] = [0, 1, 2, 4, 8, 16];
pub const PREMIUM_MESSAGING_PARTITIONS: [i64; 4] = [0, 1, 2, 4];

const SQL_FILTER_MAX_LENGTH: usize = 1024;

pub fn namespace_name(value: &str) -> Result<(), String> {
    if !NAMESPACE_NAME_REGEX.is_match(value) {
        return Err(format!(
            "{:?} must be between 6 and 50 characters, start with a letter, end with a letter or number and contain only letters, numbers and hyphens",
            value
        ));
    }
    if value.ends_with("-sb") || value.ends_with("-mgmt") {
        return Err(format!(
            "{:?} cannot end with a hyphen, -sb, or -mgmt",
            value
        ));
    }
    Ok(())
}

pub fn queue_name(value: &str) -> Result<(), String> {
    if !QUEUE_NAME_REGEX.is_match(value) {
        return Err(format!(
            "{:?} can contain only letters, numbers, periods, hyphens, underscores, slashes and tildes, must start with a letter or number, end with a letter, number, underscore or tilde and be up to 260 characters",
            value
        ));
    }
    Ok(())
}

pub fn topic_name(value: &str) -> Result<(), String> {
    if !TOPIC_NAME_REGEX.is_match(value) {
        return Err(format!(
            "{:?} can contain only letters, numbers, periods, hyphens, underscores and tildes, must start and end with a letter or number and be up to 260 characters",
            value
        ));
    }
    Ok(())
}

pub fn subscription_name(value: &str) -> Result<(), String> {
    if !SUBSCRIPTION_NAME_REGEX.is_match(value) {
        return Err(format!(
            "{:?} can contain only letters, numbers, periods, hyphens and underscores, must start with a letter or number and be up to 50 characters",
            value
        ));
    }
    Ok(())
}

pub fn subscription_rule_name(value: &str) -> Result<(), String> {
    if !RULE_NAME_REGEX.is_match(value) {
        return Err(format!(
            "{:?} can contain only letters, numbers, periods, hyphens and underscores, must start and end with a letter or number and be up to 50 characters",
            value
        ));
    }
    Ok(())
}

pub fn authorization_rule_name(value: &str) -> Result<(), String> {
    if !RULE_NAME_REGEX.is_match(value) {
        return Err(format!(
            "{:?} can contain only letters, numbers, periods, hyphens and underscores, must start and end with a letter or number and be between 1 and 50 characters",
            value
        ));
    }
    Ok(())
}

pub fn sql_filter(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("SQL filter expression cannot be empty".to_string());
    }
    if value.chars().count() > SQL_FILTER_MAX_LENGTH {
        return Err(format!(
            "SQL filter expression cannot exceed {} characters",
            SQL_FILTER_MAX_LENGTH
        ));
    }
    Ok(())
}

pub fn namespace_sku(value: &str) -> Result<(), String> {
    if !NAMESPACE_SKUS.contains(&value) {
        return Err(format!(
            "sku must be one of {}, got {:?}",
            NAMESPACE_SKUS.join(", "),
            value
        ));
    }
    Ok(())
}

/// Capacity is only meaningful for Premium namespaces
pub fn namespace_capacity(sku: &str, capacity: i64) -> Result<(), String> {
    if !NAMESPACE_CAPACITIES.contains(&capacity) {
        return Err(format!(
            "capacity must be one of 0, 1, 2, 4, 8 or 16, got {}",
            capacity
        ));
    }
    if sku.eq_ignore_ascii_case("Premium") {
        if capacity == 0 {
            return Err("service bus SKU \"Premium\" only supports `capacity` of 1, 2, 4, 8 or 16".to_string());
        }
    } else if capacity != 0 {
        return Err(format!(
            "service bus SKU {:?} only supports `capacity` of 0",
            sku
        ));
    }
    Ok(())
}

pub fn premium_messaging_partitions(sku: &str, partitions: i64) -> Result<(), String> {
    if !PREMIUM_MESSAGING_PARTITIONS.contains(&partitions) {
        return Err(format!(
            "premium_messaging_partitions must be one of 0, 1, 2 or 4, got {}",
            partitions
        ));
    }
    if !sku.eq_ignore_ascii_case("Premium") && partitions > 0 {
        return Err("premium messaging partitions is not supported by service bus SKU \"Basic\" or \"Standard\"".to_string());
    }
    if sku.eq_ignore_ascii_case("Premium") && partitions == 0 {
        return Err("service bus SKU \"Premium\" only supports `premium_messaging_partitions` of 1, 2 or 4".to_string());
    }
    Ok(())
}
