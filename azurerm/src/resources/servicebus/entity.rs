//! Pieces shared by queues and topics

use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::types::Diagnostic;

use crate::api::{ApiError, Client};
use crate::parse::NamespaceId;
use crate::resources::common::attr;
use crate::validate::attribute;

/// Partitioned entities outside Premium report their size across 16 partitions
const STANDARD_PARTITION_COUNT: i64 = 16;

pub(crate) const ENTITY_STATUSES: [&str; 8] = [
    "Active",
    "Creating",
    "Deleting",
    "Disabled",
    "ReceiveDisabled",
    "Renaming",
    "SendDisabled",
    "Unknown",
];

pub(crate) async fn namespace_is_premium(
    client: &Client,
    namespace: &NamespaceId,
) -> Result<bool, ApiError> {
    let namespace = client.servicebus().get_namespace(namespace).await?;
    Ok(namespace
        .sku
        .is_some_and(|sku| sku.name.eq_ignore_ascii_case("Premium")))
}

pub(crate) fn express_not_supported(kind: &str, name: &str) -> Diagnostic {
    Diagnostic::error(
        "Express entities not supported",
        format!(
            "Service Bus {} {:?} does not support Express Entities in Premium SKU and must be disabled",
            kind, name
        ),
    )
    .with_attribute(attr("express_enabled"))
}

/// Maps the size the service reports back to the size that was configured
pub(crate) fn configured_max_size(reported: i64, partitioned: bool, premium: bool) -> i64 {
    if partitioned && !premium {
        reported / STANDARD_PARTITION_COUNT
    } else {
        reported
    }
}

/// ISO 8601 duration the service fills in when unset
pub(crate) fn duration_attribute(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .optional()
        .computed()
        .validator(attribute::iso8601_duration())
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitioned_standard_size_is_scaled_down() {
        assert_eq!(configured_max_size(81920, true, false), 5120);
        assert_eq!(configured_max_size(81920, true, true), 81920);
        assert_eq!(configured_max_size(1024, false, false), 1024);
    }
}
