//! Pieces shared by resources that live inside an API Management service

use tfplug::plan_modifier::RequiresReplace;
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::types::{Diagnostic, DynamicValue};

use crate::api::Client;
use crate::parse::ApiManagementId;
use crate::resources::common::{attr, required_string};
use crate::validate::attribute;

/// `api_management_name` and `resource_group_name`, both forcing replacement
pub(crate) fn parent_attributes() -> [Attribute; 2] {
    [
        AttributeBuilder::new("api_management_name", AttributeType::String)
            .description("The name of the API Management service")
            .required()
            .validator(attribute::api_management_service_name())
            .plan_modifier(RequiresReplace::create())
            .build(),
        AttributeBuilder::new("resource_group_name", AttributeType::String)
            .description("The resource group holding the API Management service")
            .required()
            .validator(attribute::resource_group_name())
            .plan_modifier(RequiresReplace::create())
            .build(),
    ]
}

pub(crate) fn parent_service_id(
    client: &Client,
    config: &DynamicValue,
) -> Result<ApiManagementId, Diagnostic> {
    Ok(ApiManagementId::new(
        client.subscription_id(),
        &required_string(config, "resource_group_name")?,
        &required_string(config, "api_management_name")?,
    ))
}

/// The service reports unset text properties as empty strings
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Optional string from the first element of a list-nested block
pub(crate) fn block_string(block: Option<&DynamicValue>, name: &str) -> Option<String> {
    block.and_then(|b| b.get_optional_string(&attr(name)))
}
