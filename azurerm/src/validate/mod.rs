//! Value checks for attribute configuration
//!
//! Every check is a plain `fn(&str) -> Result<(), String>` so it can be unit
//! tested directly; [`attribute`] wraps them as tfplug validators.

pub mod apimanagement;
pub mod servicebus;

pub use apimanagement::*;
pub use servicebus::*;

use regex::Regex;
use std::sync::LazyLock;

/// ISO 8601 duration such as `PT5M`, `P10675199DT2H48M5.4775807S` or `P1W`
static ISO8601_DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^P(?:\d+Y)?(?:\d+M)?(?:\d+W)?(?:\d+D)?(?:T(?:\d+H)?(?:\d+M)?(?:\d+(?:\.\d+)?S)?)?$",
    )
    .expect("ISO8601_DURATION_REGEX is a valid regex pattern")
});

static RESOURCE_GROUP_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-\w._()]+$").expect("RESOURCE_GROUP_NAME_REGEX is a valid regex pattern")
});

pub fn iso8601_duration(value: &str) -> Result<(), String> {
    if value == "P" || value.ends_with('T') || !ISO8601_DURATION_REGEX.is_match(value) {
        return Err(format!("{:?} is not a valid ISO 8601 duration", value));
    }
    Ok(())
}

pub fn resource_group_name(value: &str) -> Result<(), String> {
    if value.is_empty() || value.chars().count() > 90 {
        return Err("resource group name must be between 1 and 90 characters".to_string());
    }
    if !RESOURCE_GROUP_NAME_REGEX.is_match(value) {
        return Err(
            "resource group name may only contain alphanumeric characters, dash, underscores, parentheses and periods"
                .to_string(),
        );
    }
    if value.ends_with('.') {
        return Err("resource group name cannot end with a period".to_string());
    }
    Ok(())
}

/// Checks exposed as tfplug validators
pub mod attribute {
    use tfplug::schema::Validator;
    use tfplug::validator::FnValidator;

    macro_rules! attribute_validators {
        ($($name:ident => $description:literal),+ $(,)?) => {
            $(
                pub fn $name() -> Box<dyn Validator> {
                    FnValidator::create($description, super::$name)
                }
            )+
        };
    }

    attribute_validators!(
        iso8601_duration => "value must be an ISO 8601 duration",
        resource_group_name => "value must be a valid resource group name",
        apim_sku_name => "value must be an API Management SKU in the form Name_Capacity",
        api_management_service_name => "value must be a valid API Management service name",
        api_management_child_name => "value must be a valid API Management child resource name",
        api_management_api_name => "value must be a valid API Management API name",
        api_management_api_path => "value must be a valid API Management API path",
        api_management_backend_name => "value must be a valid API Management backend name",
        api_management_publisher_name => "value must be a valid publisher name",
        api_management_publisher_email => "value must be a valid publisher email",
        named_value_display_name => "value must be a valid named value display name",
        namespace_name => "value must be a valid Service Bus namespace name",
        queue_name => "value must be a valid Service Bus queue name",
        topic_name => "value must be a valid Service Bus topic name",
        subscription_name => "value must be a valid Service Bus subscription name",
        subscription_rule_name => "value must be a valid Service Bus subscription rule name",
        authorization_rule_name => "value must be a valid authorization rule name",
        sql_filter => "value must be a SQL filter expression of at most 1024 characters",
        namespace_sku => "value must be Basic, Standard or Premium",
    );
}
