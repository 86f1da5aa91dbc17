//! Shared implementation of the namespace, queue and topic authorization rules
//!
//! The three resources differ only in the parent they hang off; each one
//! supplies a [`RuleScope`] and reuses [`AuthorizationRuleResource`].

use async_trait::async_trait;
use std::fmt::Display;
use std::marker::PhantomData;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, ResourceWithUpgradeState, UpdateResourceRequest,
    UpdateResourceResponse, UpgradeResourceStateRequest, UpgradeResourceStateResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{Diagnostic, DynamicValue};
use tracing::info;

use crate::api::servicebus::AuthorizationRule;
use crate::api::{ApiError, Client};
use crate::migration::{self, Upgrader};
use crate::parse::{ParseError, ResourceId};
use crate::resources::common::{
    api_diagnostic, attr, config_id, create_failed, ensure_absent, import_by_id, not_configured,
    read_failed, read_response, required_string, state_id, store_provider_data, update_failed,
    StateWriter, WriteMode,
};
use crate::validate::attribute;
use crate::AzureRmProviderData;

/// The parent an authorization rule is scoped to
pub trait RuleScope: Send + Sync + 'static {
    const TYPE_NAME: &'static str;
    /// Attribute holding the parent's ARM ID, e.g. `queue_id`
    const PARENT_ATTRIBUTE: &'static str;
    /// Human readable parent kind used in descriptions and logs
    const PARENT_KIND: &'static str;
    const UPGRADERS: &'static [Upgrader];

    type Id: ResourceId + Display + Send + Sync;
    type ParentId: ResourceId + Display + Send + Sync;

    fn parse(input: &str) -> Result<Self::Id, ParseError>;
    fn parse_parent(input: &str) -> Result<Self::ParentId, ParseError>;
    fn rule_id(parent: &Self::ParentId, name: &str) -> Self::Id;
    fn parent_of(id: &Self::Id) -> Self::ParentId;
    fn name_of(id: &Self::Id) -> &str;
}

pub struct AuthorizationRuleResource<S: RuleScope> {
    provider_data: Option<AzureRmProviderData>,
    _scope: PhantomData<S>,
}

impl<S: RuleScope> Default for AuthorizationRuleResource<S> {
    fn default() -> Self {
        Self {
            provider_data: None,
            _scope: PhantomData,
        }
    }
}

impl<S: RuleScope> AuthorizationRuleResource<S> {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn with_provider_data(provider_data: AzureRmProviderData) -> Self {
        Self {
            provider_data: Some(provider_data),
            _scope: PhantomData,
        }
    }
}

fn key_attribute(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .computed()
        .sensitive()
        .plan_modifier(UseStateForUnknown::create())
        .build()
}

fn right_attribute(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Bool)
        .description(description)
        .optional()
        .default(StaticDefault::bool(false))
        .build()
}

/// `manage` is only accepted together with `listen` and `send`
pub(crate) fn validate_rights(config: &DynamicValue) -> Vec<Diagnostic> {
    let manage = config.get_optional_bool(&attr("manage"));
    if manage != Some(true) {
        return vec![];
    }

    let listen = config.get(&attr("listen"));
    let send = config.get(&attr("send"));
    if !listen.is_known() || !send.is_known() {
        return vec![];
    }

    if listen.as_bool() == Some(true) && send.as_bool() == Some(true) {
        vec![]
    } else {
        vec![Diagnostic::error(
            "Invalid authorization rule rights",
            "the `manage` right requires both `listen` and `send` to be enabled",
        )
        .with_attribute(attr("manage"))]
    }
}

fn expand_rights(config: &DynamicValue) -> AuthorizationRule {
    let flag = |name: &str| config.get_optional_bool(&attr(name)).unwrap_or(false);
    AuthorizationRule::with_rights(flag("listen"), flag("send"), flag("manage"))
}

impl<S: RuleScope> AuthorizationRuleResource<S> {
    fn rule_id(&self, config: &DynamicValue) -> Result<S::Id, Diagnostic> {
        let parent = config_id(config, S::PARENT_ATTRIBUTE, S::parse_parent)?;
        let name = required_string(config, "name")?;
        Ok(S::rule_id(&parent, &name))
    }

    pub(crate) async fn refresh(
        client: &Client,
        id: &S::Id,
        state: &mut DynamicValue,
        mode: WriteMode,
    ) -> Result<(), ApiError> {
        let api = client.servicebus();
        let rule = api.get_authorization_rule(id).await?;
        let keys = api.list_keys(id).await?;

        StateWriter::new(state, mode)
            .always("id", id.id())
            .always("name", S::name_of(id).to_string())
            .always(S::PARENT_ATTRIBUTE, S::parent_of(id).id())
            .bool("listen", Some(rule.has_right("Listen")))
            .bool("send", Some(rule.has_right("Send")))
            .bool("manage", Some(rule.has_right("Manage")))
            .string("primary_key", keys.primary_key.as_deref())
            .string("secondary_key", keys.secondary_key.as_deref())
            .string(
                "primary_connection_string",
                keys.primary_connection_string.as_deref(),
            )
            .string(
                "secondary_connection_string",
                keys.secondary_connection_string.as_deref(),
            )
            .string(
                "primary_connection_string_alias",
                keys.alias_primary_connection_string.as_deref(),
            )
            .string(
                "secondary_connection_string_alias",
                keys.alias_secondary_connection_string.as_deref(),
            );

        Ok(())
    }
}

#[async_trait]
impl<S: RuleScope> Resource for AuthorizationRuleResource<S> {
    fn type_name(&self) -> &str {
        S::TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(1)
            .description(&format!(
                "Manages an authorization rule on a Service Bus {}",
                S::PARENT_KIND
            ))
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the authorization rule")
                    .required()
                    .validator(attribute::authorization_rule_name())
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(S::PARENT_ATTRIBUTE, AttributeType::String)
                    .description(&format!("The ARM ID of the {}", S::PARENT_KIND))
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(right_attribute("listen", "Grants receive access"))
            .attribute(right_attribute("send", "Grants send access"))
            .attribute(right_attribute(
                "manage",
                "Grants management access; requires listen and send",
            ))
            .attribute(key_attribute("primary_key", "The primary shared access key"))
            .attribute(key_attribute("secondary_key", "The secondary shared access key"))
            .attribute(key_attribute(
                "primary_connection_string",
                "Connection string using the primary key",
            ))
            .attribute(key_attribute(
                "secondary_connection_string",
                "Connection string using the secondary key",
            ))
            .attribute(key_attribute(
                "primary_connection_string_alias",
                "Primary connection string through the disaster recovery alias",
            ))
            .attribute(key_attribute(
                "secondary_connection_string_alias",
                "Secondary connection string through the disaster recovery alias",
            ))
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = validate_rights(&request.config);

        if let Some(parent) = request
            .config
            .get_optional_string(&attr(S::PARENT_ATTRIBUTE))
        {
            if let Err(e) = S::parse_parent(&parent) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid {}", S::PARENT_ATTRIBUTE),
                        format!("parsing {:?}: {}", parent, e),
                    )
                    .with_attribute(attr(S::PARENT_ATTRIBUTE)),
                );
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return create_failed(not_configured());
        };
        let client = &provider_data.client;

        let id = match self.rule_id(&request.config) {
            Ok(id) => id,
            Err(diag) => return create_failed(diag),
        };

        let api = client.servicebus();
        if let Err(diag) = ensure_absent(api.get_authorization_rule(&id).await, &id.id()) {
            return create_failed(diag);
        }

        info!("Creating {} {}", S::TYPE_NAME, id);
        if let Err(e) = api
            .create_or_update_authorization_rule(&ctx, &id, &expand_rights(&request.config))
            .await
        {
            return create_failed(api_diagnostic(
                format!("Failed to create authorization rule {:?}", S::name_of(&id)),
                &e,
            ));
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = Self::refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read created authorization rule", &e));
        }

        CreateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return read_failed(request.current_state, request.private, not_configured());
        };

        let id = match state_id(&request.current_state, S::parse) {
            Ok(id) => id,
            Err(diag) => return read_failed(request.current_state, request.private, diag),
        };

        let mut state = request.current_state.clone();
        let result = Self::refresh(&provider_data.client, &id, &mut state, WriteMode::Refresh)
            .await
            .map(|_| state);
        read_response(
            S::TYPE_NAME,
            &id.id(),
            result,
            request.current_state,
            request.private,
        )
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return update_failed(request.prior_state, not_configured());
        };
        let client = &provider_data.client;

        let id = match state_id(&request.prior_state, S::parse) {
            Ok(id) => id,
            Err(diag) => return update_failed(request.prior_state, diag),
        };

        info!("Updating {} {}", S::TYPE_NAME, id);
        if let Err(e) = client
            .servicebus()
            .create_or_update_authorization_rule(&ctx, &id, &expand_rights(&request.config))
            .await
        {
            return update_failed(
                request.prior_state,
                api_diagnostic(
                    format!("Failed to update authorization rule {:?}", S::name_of(&id)),
                    &e,
                ),
            );
        }

        let mut new_state = request.planned_state;
        let mut diagnostics = vec![];
        if let Err(e) = Self::refresh(client, &id, &mut new_state, WriteMode::Apply).await {
            diagnostics.push(api_diagnostic("Failed to read updated authorization rule", &e));
        }

        UpdateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let Some(provider_data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return DeleteResourceResponse { diagnostics };
        };

        match state_id(&request.prior_state, S::parse) {
            Ok(id) => {
                info!("Deleting {} {}", S::TYPE_NAME, id);
                if let Err(e) = provider_data
                    .client
                    .servicebus()
                    .delete_authorization_rule(&ctx, &id)
                    .await
                {
                    diagnostics.push(api_diagnostic(
                        format!("Failed to delete authorization rule {:?}", S::name_of(&id)),
                        &e,
                    ));
                }
            }
            Err(diag) => diagnostics.push(diag),
        }

        DeleteResourceResponse { diagnostics }
    }

    fn as_upgrade_state(&self) -> Option<&dyn ResourceWithUpgradeState> {
        Some(self)
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl<S: RuleScope> ResourceWithConfigure for AuthorizationRuleResource<S> {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        ConfigureResourceResponse {
            diagnostics: store_provider_data(&mut self.provider_data, request.provider_data),
        }
    }
}

#[async_trait]
impl<S: RuleScope> ResourceWithImportState for AuthorizationRuleResource<S> {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        import_by_id(&ctx, request, S::parse)
    }
}

#[async_trait]
impl<S: RuleScope> ResourceWithUpgradeState for AuthorizationRuleResource<S> {
    async fn upgrade_state(
        &self,
        _ctx: Context,
        request: UpgradeResourceStateRequest,
    ) -> UpgradeResourceStateResponse {
        migration::upgrade_resource_state(request, S::UPGRADERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::object;
    use tfplug::types::Dynamic;

    #[test]
    fn manage_requires_listen_and_send() {
        let full = object(&[
            ("listen", true.into()),
            ("send", true.into()),
            ("manage", true.into()),
        ]);
        assert!(validate_rights(&full).is_empty());

        let missing_send = object(&[
            ("listen", true.into()),
            ("send", false.into()),
            ("manage", true.into()),
        ]);
        let diagnostics = validate_rights(&missing_send);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.contains("`listen` and `send`"));

        let listen_only = object(&[("listen", true.into()), ("manage", false.into())]);
        assert!(validate_rights(&listen_only).is_empty());
    }

    #[test]
    fn unknown_rights_are_not_rejected() {
        let config = object(&[
            ("listen", Dynamic::Unknown),
            ("send", false.into()),
            ("manage", true.into()),
        ]);
        assert!(validate_rights(&config).is_empty());
    }

    #[test]
    fn rights_expand_in_fixed_order() {
        let config = object(&[
            ("manage", true.into()),
            ("send", true.into()),
            ("listen", true.into()),
        ]);
        assert_eq!(
            expand_rights(&config).properties.rights,
            vec!["Listen", "Send", "Manage"]
        );
    }
}
