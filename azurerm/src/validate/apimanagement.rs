use regex::Regex;
use std::sync::LazyLock;

static APIM_SKU_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(Consumption_0|Basic_(1|2)|Developer_1|Standard_[1-4]|Premium_([1-9]|[1-9][0-9])|BasicV2_([1-9]|10)|StandardV2_([1-9]|10))$",
    )
    .expect("APIM_SKU_NAME_REGEX is a valid regex pattern")
});

static SERVICE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z](?:[a-zA-Z0-9-]{0,48}[a-zA-Z0-9])?$")
        .expect("SERVICE_NAME_REGEX is a valid regex pattern")
});

static CHILD_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,78}[a-zA-Z0-9])?$")
        .expect("CHILD_NAME_REGEX is a valid regex pattern")
});

static API_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^*#&+:<>?]{1,256}$").expect("API_NAME_REGEX is a valid regex pattern")
});

static API_PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:|[\w.][\w\-/.]{0,398}[\w\-]|[\w.])$")
        .expect("API_PATH_REGEX is a valid regex pattern")
});

static BACKEND_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w]$|^[\w][\w\-]{0,78}[\w]$")
        .expect("BACKEND_NAME_REGEX is a valid regex pattern")
});

static PUBLISHER_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\S$|^\S.{0,98}\S$").expect("PUBLISHER_NAME_REGEX is a valid regex pattern")
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w!#$%&'*+/=?^`{|}~.-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$")
        .expect("EMAIL_REGEX is a valid regex pattern")
});

static NAMED_VALUE_DISPLAY_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\-._]+$")
        .expect("NAMED_VALUE_DISPLAY_NAME_REGEX is a valid regex pattern")
});

const PUBLISHER_EMAIL_MAX_LENGTH: usize = 100;

/// `{tier}_{capacity}` as accepted by the service
pub fn apim_sku_name(value: &str) -> Result<(), String> {
    if !APIM_SKU_NAME_REGEX.is_match(value) {
        return Err(format!(
            "{:?} is not a valid sku name; expected Consumption_0, Basic_1-2, Developer_1, Standard_1-4, Premium_1-99, BasicV2_1-10 or StandardV2_1-10",
            value
        ));
    }
    Ok(())
}

/// Splits a sku name into tier and capacity
pub fn split_sku_name(value: &str) -> Option<(&str, i64)> {
    let (tier, capacity) = value.split_once('_')?;
    Some((tier, capacity.parse().ok()?))
}

pub fn api_management_service_name(value: &str) -> Result<(), String> {
    if !SERVICE_NAME_REGEX.is_match(value) {
        return Err(format!(
            "{:?} must be between 1 and 50 characters in length and contain only letters, numbers or hyphens, start with a letter and end with a letter or number",
            value
        ));
    }
    Ok(())
}

pub fn api_management_child_name(value: &str) -> Result<(), String> {
    if !CHILD_NAME_REGEX.is_match(value) {
        return Err(format!(
            "{:?} may only contain alphanumeric characters and dashes up to 80 characters in length",
            value
        ));
    }
    Ok(())
}

pub fn api_management_api_name(value: &str) -> Result<(), String> {
    if !API_NAME_REGEX.is_match(value) {
        return Err(format!(
            "{:?} may only be up to 256 characters in length and not include the characters `*`, `#`, `&`, `+`, `:`, `<`, `>`, `?`",
            value
        ));
    }
    Ok(())
}

pub fn api_management_api_path(value: &str) -> Result<(), String> {
    if !API_PATH_REGEX.is_match(value) {
        return Err(format!(
            "{:?} must not exceed 400 characters and cannot start with a slash or end with a slash",
            value
        ));
    }
    Ok(())
}

pub fn api_management_backend_name(value: &str) -> Result<(), String> {
    if !BACKEND_NAME_REGEX.is_match(value) {
        return Err(format!(
            "{:?} may only contain alphanumeric characters, underscores and dashes up to 80 characters in length",
            value
        ));
    }
    Ok(())
}

pub fn api_management_publisher_name(value: &str) -> Result<(), String> {
    if !PUBLISHER_NAME_REGEX.is_match(value) {
        return Err(
            "the publisher name must not be empty, must not start or end with whitespace and may be up to 100 characters"
                .to_string(),
        );
    }
    Ok(())
}

pub fn api_management_publisher_email(value: &str) -> Result<(), String> {
    if value.chars().count() > PUBLISHER_EMAIL_MAX_LENGTH {
        return Err(format!(
            "the publisher email may be up to {} characters",
            PUBLISHER_EMAIL_MAX_LENGTH
        ));
    }
    if !EMAIL_REGEX.is_match(value) {
        return Err(format!("{:?} is not a valid email address", value));
    }
    Ok(())
}

pub fn named_value_display_name(value: &str) -> Result<(), String> {
    if !NAMED_VALUE_DISPLAY_NAME_REGEX.is_match(value) {
        return Err(format!(
            "{:?} may only contain alphanumeric characters, periods, underscores and dashes",
            value
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_names() {
        for valid in [
            "Consumption_0",
            "Basic_1",
            "Basic_2",
            "Developer_1",
            "Standard_4",
            "Premium_1",
            "Premium_99",
            "BasicV2_10",
            "StandardV2_3",
        ] {
            assert!(apim_sku_name(valid).is_ok(), "{} should be valid", valid);
        }
        for invalid in [
            "",
            "Consumption_1",
            "Basic_3",
            "Developer_2",
            "Standard_5",
            "Premium_0",
            "Premium_100",
            "premium_1",
            "BasicV2_11",
            "Standard",
        ] {
            assert!(apim_sku_name(invalid).is_err(), "{} should be invalid", invalid);
        }
    }

    #[test]
    fn sku_names_split_into_tier_and_capacity() {
        assert_eq!(split_sku_name("Premium_3"), Some(("Premium", 3)));
        assert_eq!(split_sku_name("Consumption_0"), Some(("Consumption", 0)));
        assert_eq!(split_sku_name("Premium"), None);
    }

    #[test]
    fn service_names() {
        assert!(api_management_service_name("a").is_ok());
        assert!(api_management_service_name("my-apim-1").is_ok());
        assert!(api_management_service_name("1apim").is_err());
        assert!(api_management_service_name("apim-").is_err());
        assert!(api_management_service_name("apim_1").is_err());
        assert!(api_management_service_name(&"a".repeat(51)).is_err());
    }

    #[test]
    fn child_names() {
        assert!(api_management_child_name("1version-set").is_ok());
        assert!(api_management_child_name("set-").is_err());
        assert!(api_management_child_name(&"a".repeat(80)).is_ok());
        assert!(api_management_child_name(&"a".repeat(81)).is_err());
    }

    #[test]
    fn api_names() {
        assert!(api_management_api_name("echo api (v1)").is_ok());
        assert!(api_management_api_name("").is_err());
        for bad in ["a*b", "a#b", "a&b", "a+b", "a:b", "a<b", "a>b", "a?b"] {
            assert!(api_management_api_name(bad).is_err(), "{} should be invalid", bad);
        }
        assert!(api_management_api_name(&"a".repeat(257)).is_err());
    }

    #[test]
    fn api_paths() {
        for valid in ["", "a", "echo", "api/v1", "api.v1-beta"] {
            assert!(api_management_api_path(valid).is_ok(), "{:?} should be valid", valid);
        }
        for invalid in ["/echo", "echo/", "ech o", "a".repeat(401).as_str()] {
            assert!(api_management_api_path(invalid).is_err(), "{:?} should be invalid", invalid);
        }
    }

    #[test]
    fn backend_names() {
        assert!(api_management_backend_name("b").is_ok());
        assert!(api_management_backend_name("my_backend-1").is_ok());
        assert!(api_management_backend_name("-backend").is_err());
        assert!(api_management_backend_name("backend.1").is_err());
    }

    #[test]
    fn publisher_fields() {
        assert!(api_management_publisher_name("Contoso Ltd").is_ok());
        assert!(api_management_publisher_name("C").is_ok());
        assert!(api_management_publisher_name(" Contoso").is_err());
        assert!(api_management_publisher_name("").is_err());

        assert!(api_management_publisher_email("admin@contoso.com").is_ok());
        assert!(api_management_publisher_email("admin@contoso").is_err());
        assert!(api_management_publisher_email("not-an-email").is_err());
        let long = format!("{}@contoso.com", "a".repeat(100));
        assert!(api_management_publisher_email(&long).is_err());
    }

    #[test]
    fn named_value_display_names() {
        assert!(named_value_display_name("my.value_1-x").is_ok());
        assert!(named_value_display_name("my value").is_err());
        assert!(named_value_display_name("").is_err());
    }
}
