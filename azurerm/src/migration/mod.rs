//! State upgraders for resources whose stored ID format changed
//!
//! Each upgrader takes the state written by schema version N and returns the
//! state for version N+1. A resource lists its upgraders in version order and
//! hands them to [`upgrade_resource_state`].

pub mod apimanagement;
pub mod servicebus;

pub use apimanagement::{api_v0_to_v1, api_version_set_v0_to_v1, named_value_v0_to_v1};
pub use servicebus::{
    namespace_authorization_rule_v0_to_v1, namespace_network_rule_set_v0_to_v1,
    queue_authorization_rule_v0_to_v1, topic_authorization_rule_v0_to_v1,
};

use crate::parse::ParseError;
use thiserror::Error;
use tfplug::resource::{UpgradeResourceStateRequest, UpgradeResourceStateResponse};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("state has no `id` attribute")]
    MissingId,

    #[error("migrated ID {id:?} is not valid: {source}")]
    InvalidId {
        id: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to decode prior state: {0}")]
    Decode(String),

    #[error("no upgrade path from schema version {0}")]
    UnsupportedVersion(i64),
}

/// Rewrites one schema version's state into the next
pub type Upgrader = fn(DynamicValue) -> Result<DynamicValue, MigrationError>;

/// Runs `upgraders[version..]` over the raw prior state
pub fn upgrade_resource_state(
    request: UpgradeResourceStateRequest,
    upgraders: &[Upgrader],
) -> UpgradeResourceStateResponse {
    match run_upgraders(&request, upgraders) {
        Ok(upgraded_state) => UpgradeResourceStateResponse {
            upgraded_state,
            diagnostics: vec![],
        },
        Err(e) => UpgradeResourceStateResponse {
            upgraded_state: DynamicValue::null(),
            diagnostics: vec![Diagnostic::error(
                format!("Failed to upgrade {} state", request.type_name),
                e.to_string(),
            )],
        },
    }
}

fn run_upgraders(
    request: &UpgradeResourceStateRequest,
    upgraders: &[Upgrader],
) -> Result<DynamicValue, MigrationError> {
    let mut state = request
        .raw_state
        .decode()
        .map_err(|e| MigrationError::Decode(e.to_string()))?;

    let start = usize::try_from(request.version)
        .map_err(|_| MigrationError::UnsupportedVersion(request.version))?;

    for (version, upgrade) in upgraders.iter().enumerate().skip(start) {
        info!(
            "Upgrading {} state from schema version {} to {}",
            request.type_name,
            version,
            version + 1
        );
        state = upgrade(state)?;
    }

    Ok(state)
}

/// Applies `rewrite` to the `id` attribute and checks the result with `parse`
pub(crate) fn rewrite_id<T>(
    mut state: DynamicValue,
    rewrite: impl FnOnce(&str) -> String,
    parse: fn(&str) -> Result<T, ParseError>,
) -> Result<DynamicValue, MigrationError> {
    let path = AttributePath::new("id");
    let old_id = state
        .get_optional_string(&path)
        .ok_or(MigrationError::MissingId)?;
    let new_id = rewrite(&old_id);

    parse(&new_id).map_err(|source| MigrationError::InvalidId {
        id: new_id.clone(),
        source,
    })?;

    debug!("Updating ID from {:?} to {:?}", old_id, new_id);
    state
        .set_string(&path, new_id)
        .map_err(|e| MigrationError::Decode(e.to_string()))?;
    Ok(state)
}

#[cfg(test)]
pub(crate) fn state_with(values: &[(&str, &str)]) -> DynamicValue {
    let mut state = DynamicValue::object();
    for (key, value) in values {
        state
            .set_string(&AttributePath::new(key), value.to_string())
            .unwrap();
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfplug::types::RawState;

    fn request(version: i64, json: &str) -> UpgradeResourceStateRequest {
        UpgradeResourceStateRequest {
            type_name: "azurerm_api_management_named_value".to_string(),
            version,
            raw_state: RawState {
                json: Some(json.as_bytes().to_vec()),
                flatmap: Default::default(),
            },
        }
    }

    const LEGACY_NAMED_VALUE: &str = r#"{"id":"/subscriptions/s/resourceGroups/rg/providers/Microsoft.ApiManagement/service/apim/properties/nv","display_name":"nv"}"#;

    #[test]
    fn runs_upgraders_from_prior_version() {
        let response = upgrade_resource_state(request(0, LEGACY_NAMED_VALUE), &[named_value_v0_to_v1]);

        assert!(response.diagnostics.is_empty());
        assert_eq!(
            response
                .upgraded_state
                .get_string(&AttributePath::new("id"))
                .unwrap(),
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.ApiManagement/service/apim/namedValues/nv"
        );
        assert_eq!(
            response
                .upgraded_state
                .get_string(&AttributePath::new("display_name"))
                .unwrap(),
            "nv"
        );
    }

    #[test]
    fn current_version_passes_through() {
        let current = r#"{"id":"/subscriptions/s/resourceGroups/rg/providers/Microsoft.ApiManagement/service/apim/namedValues/nv"}"#;
        let response = upgrade_resource_state(request(1, current), &[named_value_v0_to_v1]);

        assert!(response.diagnostics.is_empty());
        assert!(response
            .upgraded_state
            .get_string(&AttributePath::new("id"))
            .unwrap()
            .ends_with("/namedValues/nv"));
    }

    #[test]
    fn invalid_result_is_reported() {
        let response = upgrade_resource_state(
            request(0, r#"{"id":"/subscriptions/s/resourceGroups/rg"}"#),
            &[named_value_v0_to_v1],
        );
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.upgraded_state.is_null());
    }

    #[test]
    fn negative_version_is_rejected() {
        let response = upgrade_resource_state(request(-1, LEGACY_NAMED_VALUE), &[named_value_v0_to_v1]);
        assert_eq!(response.diagnostics.len(), 1);
    }

    #[test]
    fn missing_id_is_an_error() {
        let result = rewrite_id(state_with(&[("name", "x")]), str::to_string, crate::parse::NamespaceId::parse);
        assert!(matches!(result, Err(MigrationError::MissingId)));
    }
}
