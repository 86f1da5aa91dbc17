use super::{rewrite_id, MigrationError};
use crate::parse::{ApiId, ApiVersionSetId, NamedValueId};
use tfplug::types::{AttributePath, DynamicValue};

const REVISION_MARKER: &str = ";rev=";

pub fn api_version_set_v0_to_v1(state: DynamicValue) -> Result<DynamicValue, MigrationError> {
    rewrite_id(
        state,
        |id| id.replace("/api-version-set/", "/apiVersionSets/"),
        ApiVersionSetId::parse,
    )
}

pub fn named_value_v0_to_v1(state: DynamicValue) -> Result<DynamicValue, MigrationError> {
    rewrite_id(
        state,
        |id| id.replace("/properties/", "/namedValues/"),
        NamedValueId::parse,
    )
}

/// Version 0 stored the bare API name; version 1 pins the revision in the ID
pub fn api_v0_to_v1(state: DynamicValue) -> Result<DynamicValue, MigrationError> {
    let revision = state
        .get_optional_string(&AttributePath::new("revision"))
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "1".to_string());

    rewrite_id(
        state,
        |id| {
            if id.contains(REVISION_MARKER) {
                id.to_string()
            } else {
                format!("{}{}{}", id, REVISION_MARKER, revision)
            }
        },
        ApiId::parse,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::state_with;

    const SERVICE: &str =
        "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ApiManagement/service/apim1";

    fn id_of(state: &DynamicValue) -> String {
        state.get_string(&AttributePath::new("id")).unwrap()
    }

    #[test]
    fn version_set_segment_is_renamed() {
        let state = state_with(&[("id", format!("{}/api-version-set/vs1", SERVICE).as_str())]);
        assert_eq!(
            id_of(&api_version_set_v0_to_v1(state).unwrap()),
            format!("{}/apiVersionSets/vs1", SERVICE)
        );
    }

    #[test]
    fn named_value_segment_is_renamed() {
        let state = state_with(&[("id", format!("{}/properties/nv1", SERVICE).as_str())]);
        assert_eq!(
            id_of(&named_value_v0_to_v1(state).unwrap()),
            format!("{}/namedValues/nv1", SERVICE)
        );
    }

    #[test]
    fn api_gets_revision_from_state() {
        let state = state_with(&[
            ("id", format!("{}/apis/echo", SERVICE).as_str()),
            ("revision", "3"),
        ]);
        assert_eq!(
            id_of(&api_v0_to_v1(state).unwrap()),
            format!("{}/apis/echo;rev=3", SERVICE)
        );
    }

    #[test]
    fn api_defaults_to_first_revision() {
        let state = state_with(&[("id", format!("{}/apis/echo", SERVICE).as_str())]);
        assert_eq!(
            id_of(&api_v0_to_v1(state).unwrap()),
            format!("{}/apis/echo;rev=1", SERVICE)
        );
    }

    #[test]
    fn api_with_revision_is_unchanged() {
        let id = format!("{}/apis/echo;rev=2", SERVICE);
        let state = state_with(&[("id", id.as_str()), ("revision", "5")]);
        assert_eq!(id_of(&api_v0_to_v1(state).unwrap()), id);
    }

    #[test]
    fn malformed_legacy_id_fails() {
        let state = state_with(&[("id", "/subscriptions/s/resourceGroups/rg/api-version-set/vs1")]);
        assert!(matches!(
            api_version_set_v0_to_v1(state),
            Err(MigrationError::InvalidId { .. })
        ));
    }
}
