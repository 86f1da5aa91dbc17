//! Helpers shared by every resource and data source

use crate::api::ApiError;
use crate::parse::ParseError;
use crate::provider_data::AzureRmProviderData;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::data_source::ReadDataSourceResponse;
use tfplug::import_state_passthrough_id;
use tfplug::provider::ProviderData;
use tfplug::resource::{
    CreateResourceResponse, ImportResourceStateRequest, ImportResourceStateResponse,
    ReadResourceResponse, UpdateResourceResponse,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tracing::warn;

pub(crate) fn attr(name: &str) -> AttributePath {
    AttributePath::new(name)
}

pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

/// Stores the provider data handed to a resource or data source
///
/// `None` is expected while Terraform validates configuration before the
/// provider block is known; only data of the wrong type is an error.
pub(crate) fn store_provider_data(
    slot: &mut Option<AzureRmProviderData>,
    provider_data: Option<ProviderData>,
) -> Vec<Diagnostic> {
    let Some(data) = provider_data else {
        return vec![];
    };

    match data.downcast_ref::<AzureRmProviderData>() {
        Some(provider_data) => {
            *slot = Some(provider_data.clone());
            vec![]
        }
        None => vec![Diagnostic::error(
            "Invalid provider data",
            "Failed to extract AzureRmProviderData from provider data",
        )],
    }
}

pub(crate) fn already_exists(id: &str) -> Diagnostic {
    Diagnostic::error(
        "Resource already exists",
        format!(
            "A resource with the ID {:?} already exists - to be managed via Terraform this resource needs to be imported into the State. Please see the resource documentation for \"terraform import\" for more information.",
            id
        ),
    )
}

/// Turns the result of a pre-create lookup into "must not exist yet"
pub(crate) fn ensure_absent<T>(lookup: Result<T, ApiError>, id: &str) -> Result<(), Diagnostic> {
    match lookup {
        Ok(_) => Err(already_exists(id)),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(Diagnostic::error(
            "Failed to check for existing resource",
            format!("checking for presence of existing {}: {}", id, e),
        )),
    }
}

pub(crate) fn api_diagnostic(summary: impl Into<String>, error: &ApiError) -> Diagnostic {
    Diagnostic::error(summary, error.to_string())
}

pub(crate) fn required_string(config: &DynamicValue, name: &str) -> Result<String, Diagnostic> {
    config.get_string(&attr(name)).map_err(|_| {
        Diagnostic::error(
            format!("Missing {}", name),
            format!("The '{}' attribute is required", name),
        )
        .with_attribute(attr(name))
    })
}

/// Parses the `id` attribute of a state value
pub(crate) fn state_id<T>(
    state: &DynamicValue,
    parse: fn(&str) -> Result<T, ParseError>,
) -> Result<T, Diagnostic> {
    let id = state
        .get_string(&attr("id"))
        .map_err(|_| Diagnostic::error("Missing ID", "The resource state has no 'id'"))?;
    parse(&id).map_err(|e| {
        Diagnostic::error("Invalid resource ID", format!("parsing {:?}: {}", id, e))
            .with_attribute(attr("id"))
    })
}

/// Parses a user supplied ID attribute such as `namespace_id`
pub(crate) fn config_id<T>(
    config: &DynamicValue,
    name: &str,
    parse: fn(&str) -> Result<T, ParseError>,
) -> Result<T, Diagnostic> {
    let value = required_string(config, name)?;
    parse(&value).map_err(|e| {
        Diagnostic::error(
            format!("Invalid {}", name),
            format!("parsing {:?}: {}", value, e),
        )
        .with_attribute(attr(name))
    })
}

/// Validates the import ID with `parse` and stores it as `id`
///
/// The framework reads the resource afterwards, which fills in the rest of
/// the state from the ID.
pub(crate) fn import_by_id<T>(
    ctx: &Context,
    request: ImportResourceStateRequest,
    parse: fn(&str) -> Result<T, ParseError>,
) -> ImportResourceStateResponse {
    let mut response = ImportResourceStateResponse {
        imported_resources: vec![],
        diagnostics: vec![],
    };

    if let Err(e) = parse(&request.id) {
        response.diagnostics.push(Diagnostic::error(
            "Invalid import ID",
            format!("parsing {:?}: {}", request.id, e),
        ));
        return response;
    }

    import_state_passthrough_id(ctx, attr("id"), &request, &mut response);
    response
}

/// Create failed before anything was stored remotely
pub(crate) fn create_failed(diagnostic: Diagnostic) -> CreateResourceResponse {
    CreateResourceResponse {
        new_state: DynamicValue::null(),
        private: vec![],
        diagnostics: vec![diagnostic],
    }
}

/// Update failed; the prior state still describes the remote object
pub(crate) fn update_failed(prior_state: DynamicValue, diagnostic: Diagnostic) -> UpdateResourceResponse {
    UpdateResourceResponse {
        new_state: prior_state,
        private: vec![],
        diagnostics: vec![diagnostic],
    }
}

pub(crate) fn read_failed(
    current_state: DynamicValue,
    private: Vec<u8>,
    diagnostic: Diagnostic,
) -> ReadResourceResponse {
    ReadResourceResponse {
        new_state: Some(current_state),
        diagnostics: vec![diagnostic],
        private,
    }
}

/// Finishes a read: a missing remote object drops the resource from state
pub(crate) fn read_response(
    type_name: &str,
    id: &str,
    result: Result<DynamicValue, ApiError>,
    current_state: DynamicValue,
    private: Vec<u8>,
) -> ReadResourceResponse {
    match result {
        Ok(state) => ReadResourceResponse {
            new_state: Some(state),
            diagnostics: vec![],
            private,
        },
        Err(e) if e.is_not_found() => {
            warn!("{} {:?} was not found - removing from state", type_name, id);
            ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
                private,
            }
        }
        Err(e) => read_failed(
            current_state,
            private,
            api_diagnostic(format!("Failed to read {}", type_name), &e),
        ),
    }
}

pub(crate) fn data_source_failed(diagnostic: Diagnostic) -> ReadDataSourceResponse {
    ReadDataSourceResponse {
        state: DynamicValue::null(),
        diagnostics: vec![diagnostic],
    }
}

/// Finishes a data source read; a missing remote object is an error here
pub(crate) fn data_source_response(
    type_name: &str,
    id: &str,
    result: Result<DynamicValue, ApiError>,
) -> ReadDataSourceResponse {
    match result {
        Ok(state) => ReadDataSourceResponse {
            state,
            diagnostics: vec![],
        },
        Err(e) if e.is_not_found() => data_source_failed(Diagnostic::error(
            format!("{} not found", type_name),
            format!("{:?} does not exist", id),
        )),
        Err(e) => data_source_failed(api_diagnostic(format!("Failed to read {}", type_name), &e)),
    }
}

/// Azure accepts display names such as `West Europe` and reports `westeurope`
pub(crate) fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_lowercase()
}

/// Plan modifier predicate: only a different region forces replacement
pub(crate) fn location_changed(prior: &Dynamic, planned: &Dynamic) -> bool {
    match (prior.as_str(), planned.as_str()) {
        (Some(prior), Some(planned)) => normalize_location(prior) != normalize_location(planned),
        _ => true,
    }
}

/// Keeps the configured spelling when it names the same region
pub(crate) fn location_for_state(prior: Option<String>, remote: Option<String>) -> Option<String> {
    match (prior, remote) {
        (Some(prior), Some(remote)) if normalize_location(&prior) == normalize_location(&remote) => {
            Some(prior)
        }
        (_, remote) => remote.map(|l| normalize_location(&l)),
    }
}

/// Keeps the configured spelling of an ARM ID that ARM reports in other casing
pub(crate) fn id_for_state(prior: Option<String>, remote: Option<String>) -> Option<String> {
    match (prior, remote) {
        (Some(prior), Some(remote)) if prior.eq_ignore_ascii_case(&remote) => Some(prior),
        (_, remote) => remote,
    }
}

pub(crate) fn tags(config: &DynamicValue) -> Option<HashMap<String, String>> {
    let tags = config.get_string_map(&attr("tags"));
    if tags.is_empty() {
        None
    } else {
        Some(tags)
    }
}

/// Converts an enabled flag into the `Enabled`/`Disabled` enum ARM uses
pub(crate) fn enabled_flag(enabled: bool) -> String {
    if enabled { "Enabled" } else { "Disabled" }.to_string()
}

pub(crate) fn flag_enabled(value: Option<&str>) -> Option<bool> {
    value.map(|v| v.eq_ignore_ascii_case("Enabled"))
}

/// How [`StateWriter`] treats values already present in the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// After create/update: fill only what the plan left unknown
    Apply,
    /// During read: the remote object is the source of truth
    Refresh,
}

/// Writes remote values into a state built from the plan or prior state
pub(crate) struct StateWriter<'a> {
    state: &'a mut DynamicValue,
    mode: WriteMode,
}

impl<'a> StateWriter<'a> {
    pub fn new(state: &'a mut DynamicValue, mode: WriteMode) -> Self {
        Self { state, mode }
    }

    pub fn value(&mut self, name: &str, value: Dynamic) -> &mut Self {
        let path = attr(name);
        let write = match self.mode {
            WriteMode::Refresh => true,
            WriteMode::Apply => self.state.get(&path).contains_unknown(),
        };
        if write {
            let _ = self.state.set_value(&path, value);
        }
        self
    }

    /// Writes regardless of mode; for identity attributes derived from the ID
    pub fn always(&mut self, name: &str, value: impl Into<Dynamic>) -> &mut Self {
        let _ = self.state.set_value(&attr(name), value.into());
        self
    }

    pub fn string(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        self.value(name, value.map(str::to_string).into())
    }

    pub fn bool(&mut self, name: &str, value: Option<bool>) -> &mut Self {
        self.value(name, value.into())
    }

    pub fn i64(&mut self, name: &str, value: Option<i64>) -> &mut Self {
        self.value(name, value.into())
    }

    /// An empty list is stored as null, matching an unset attribute
    pub fn strings(&mut self, name: &str, values: &[String]) -> &mut Self {
        if values.is_empty() {
            return self.value(name, Dynamic::Null);
        }
        self.value(
            name,
            Dynamic::List(values.iter().cloned().map(Dynamic::String).collect()),
        )
    }

    pub fn string_map(&mut self, name: &str, values: Option<&HashMap<String, String>>) -> &mut Self {
        match values {
            Some(m) if !m.is_empty() => {
                let map = m
                    .iter()
                    .map(|(k, v)| (k.clone(), Dynamic::String(v.clone())))
                    .collect();
                self.value(name, Dynamic::Map(map))
            }
            _ => self.value(name, Dynamic::Null),
        }
    }

    /// A list-nested block; `None` writes an empty list
    pub fn block(&mut self, name: &str, fields: Option<HashMap<String, Dynamic>>) -> &mut Self {
        let items = fields.map(|f| vec![Dynamic::Map(f)]).unwrap_or_default();
        self.value(name, Dynamic::List(items))
    }

    pub fn blocks(&mut self, name: &str, items: Vec<HashMap<String, Dynamic>>) -> &mut Self {
        self.value(name, Dynamic::List(items.into_iter().map(Dynamic::Map).collect()))
    }
}

/// Builds the object stored for one nested block element
pub(crate) fn block_fields<const N: usize>(fields: [(&str, Dynamic); N]) -> HashMap<String, Dynamic> {
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::NamespaceId;
    use std::sync::Arc;
    use tfplug::types::ClientCapabilities;

    #[test]
    fn apply_mode_only_fills_unknowns() {
        let mut state = DynamicValue::object();
        state.set_string(&attr("sku"), "Standard".to_string()).unwrap();
        state.mark_unknown(&attr("endpoint")).unwrap();

        StateWriter::new(&mut state, WriteMode::Apply)
            .string("sku", Some("Premium"))
            .string("endpoint", Some("https://ns.servicebus.windows.net:443/"));

        assert_eq!(state.get_string(&attr("sku")).unwrap(), "Standard");
        assert_eq!(
            state.get_string(&attr("endpoint")).unwrap(),
            "https://ns.servicebus.windows.net:443/"
        );
    }

    #[test]
    fn refresh_mode_overwrites() {
        let mut state = DynamicValue::object();
        state.set_string(&attr("sku"), "Standard".to_string()).unwrap();

        StateWriter::new(&mut state, WriteMode::Refresh)
            .string("sku", Some("Premium"))
            .bool("zone_redundant", None)
            .block("proxy", None);

        assert_eq!(state.get_string(&attr("sku")).unwrap(), "Premium");
        assert_eq!(state.get(&attr("zone_redundant")), Dynamic::Null);
        assert_eq!(state.get_list(&attr("proxy")).unwrap(), vec![]);
    }

    #[test]
    fn location_keeps_configured_spelling() {
        assert_eq!(
            location_for_state(Some("West Europe".into()), Some("westeurope".into())),
            Some("West Europe".to_string())
        );
        assert_eq!(
            location_for_state(Some("West Europe".into()), Some("northeurope".into())),
            Some("northeurope".to_string())
        );
        assert_eq!(
            location_for_state(None, Some("North Europe".into())),
            Some("northeurope".to_string())
        );
    }

    #[test]
    fn ensure_absent_maps_lookup_results() {
        let id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns";
        assert!(ensure_absent(Err::<(), _>(ApiError::NotFound(id.into())), id).is_ok());

        let err = ensure_absent(Ok(()), id).unwrap_err();
        assert!(err.detail.contains("already exists - to be managed via Terraform"));

        assert!(ensure_absent(Err::<(), _>(ApiError::ServiceUnavailable), id).is_err());
    }

    #[test]
    fn provider_data_of_wrong_type_is_rejected() {
        let mut slot = None;
        assert!(store_provider_data(&mut slot, None).is_empty());
        assert!(slot.is_none());

        let diagnostics = store_provider_data(&mut slot, Some(Arc::new(42u32)));
        assert_eq!(diagnostics.len(), 1);
        assert!(slot.is_none());
    }

    #[test]
    fn import_rejects_malformed_ids() {
        let request = ImportResourceStateRequest {
            type_name: "azurerm_servicebus_namespace".to_string(),
            id: "/subscriptions/s/resourceGroups/rg".to_string(),
            client_capabilities: ClientCapabilities::default(),
        };
        let response = import_by_id(&Context::new(), request, NamespaceId::parse);
        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics.len(), 1);
    }

    #[test]
    fn state_id_requires_valid_id() {
        let mut state = DynamicValue::object();
        assert!(state_id(&state, NamespaceId::parse).is_err());

        state
            .set_string(
                &attr("id"),
                "/subscriptions/s/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/ns"
                    .to_string(),
            )
            .unwrap();
        assert_eq!(state_id(&state, NamespaceId::parse).unwrap().name, "ns");
    }
}
