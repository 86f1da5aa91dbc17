//! gRPC service implementation
//!
//! Implements the Terraform Plugin Protocol v6 service on top of the
//! factory-based [`Provider`] API. Every request gets a fresh resource or
//! data source instance configured with the stored provider data.

use crate::context::Context;
use crate::error::TfplugError;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::plan_modifier::values_equal;
use crate::proto::{self, provider_server::Provider as ProtoProvider};
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderData, ProviderMetadataRequest,
    ProviderSchemaRequest, ResourceFactory, StopProviderRequest, ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ModifyPlanRequest, ReadResourceRequest, ResourceSchemaRequest,
    ResourceWithConfigure, UpdateResourceRequest, UpgradeResourceStateRequest,
    ValidateResourceConfigRequest,
};
use crate::schema::{
    Attribute, Block, DefaultRequest, NestedBlock, NestingMode, PlanModifierRequest, Schema,
    StringKind, ValidatorRequest,
};
use crate::types::{
    has_errors, AttributePath, AttributePathStep, ClientCapabilities, Diagnostic,
    DiagnosticSeverity, Dynamic, DynamicValue, RawState,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};

type GrpcResult<T> = std::result::Result<Response<T>, Status>;

/// Serves a [`Provider`] over the tfplugin6 gRPC protocol
pub struct GrpcProviderServer<P: Provider> {
    provider: Arc<RwLock<P>>,
    resources: Arc<HashMap<String, ResourceFactory>>,
    data_sources: Arc<HashMap<String, DataSourceFactory>>,
    provider_data: Arc<RwLock<Option<ProviderData>>>,
    ctx: Context,
    legacy_type_system: bool,
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    pub fn new(provider: P) -> Self {
        let resources = provider.resources();
        let data_sources = provider.data_sources();
        Self {
            provider: Arc::new(RwLock::new(provider)),
            resources: Arc::new(resources),
            data_sources: Arc::new(data_sources),
            provider_data: Arc::new(RwLock::new(None)),
            ctx: Context::new(),
            legacy_type_system: false,
        }
    }

    /// Report plan/apply results with the legacy type system flag, which makes
    /// Terraform tolerate provider-normalised values instead of failing
    pub fn with_legacy_type_system(mut self, enabled: bool) -> Self {
        self.legacy_type_system = enabled;
        self
    }

    /// Root context shared by every request; cancelled by StopProvider
    pub fn context(&self) -> Context {
        self.ctx.clone()
    }

    async fn resource(
        &self,
        type_name: &str,
    ) -> std::result::Result<(Box<dyn ResourceWithConfigure>, Vec<Diagnostic>), Status> {
        let factory = self
            .resources
            .get(type_name)
            .ok_or_else(|| unknown("resource", type_name))?;
        let mut resource = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(self.ctx.clone(), ConfigureResourceRequest { provider_data })
            .await;
        Ok((resource, response.diagnostics))
    }

    async fn data_source(
        &self,
        type_name: &str,
    ) -> std::result::Result<(Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>), Status> {
        let factory = self
            .data_sources
            .get(type_name)
            .ok_or_else(|| unknown("data source", type_name))?;
        let mut data_source = factory();
        let provider_data = self.provider_data.read().await.clone();
        let response = data_source
            .configure(self.ctx.clone(), ConfigureDataSourceRequest { provider_data })
            .await;
        Ok((data_source, response.diagnostics))
    }

    async fn resource_schema(&self, resource: &dyn ResourceWithConfigure) -> Schema {
        resource
            .schema(self.ctx.clone(), ResourceSchemaRequest)
            .await
            .schema
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> ProtoProvider for GrpcProviderServer<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> GrpcResult<proto::get_metadata::Response> {
        let provider = self.provider.read().await;
        let metadata = provider
            .metadata(self.ctx.clone(), ProviderMetadataRequest)
            .await;

        let mut resources: Vec<_> = self.resources.keys().cloned().collect();
        resources.sort();
        let mut data_sources: Vec<_> = self.data_sources.keys().cloned().collect();
        data_sources.sort();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities_to_proto(
                &metadata.server_capabilities,
            )),
            diagnostics: vec![],
            data_sources: data_sources
                .into_iter()
                .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
                .collect(),
            resources: resources
                .into_iter()
                .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> GrpcResult<proto::get_provider_schema::Response> {
        let provider = self.provider.read().await;
        let metadata = provider
            .metadata(self.ctx.clone(), ProviderMetadataRequest)
            .await;
        let provider_schema = provider
            .schema(self.ctx.clone(), ProviderSchemaRequest)
            .await;
        drop(provider);

        let mut diagnostics = provider_schema.diagnostics;
        let mut resource_schemas = HashMap::new();
        for (type_name, factory) in self.resources.iter() {
            let resource = factory();
            let response = resource
                .schema(self.ctx.clone(), ResourceSchemaRequest)
                .await;
            diagnostics.extend(response.diagnostics);
            resource_schemas.insert(type_name.clone(), schema_to_proto(&response.schema));
        }

        let mut data_source_schemas = HashMap::new();
        for (type_name, factory) in self.data_sources.iter() {
            let data_source = factory();
            let response = data_source
                .schema(self.ctx.clone(), DataSourceSchemaRequest)
                .await;
            diagnostics.extend(response.diagnostics);
            data_source_schemas.insert(type_name.clone(), schema_to_proto(&response.schema));
        }

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&provider_schema.schema)),
            resource_schemas,
            data_source_schemas,
            diagnostics: diagnostics_to_proto(&diagnostics),
            provider_meta: None,
            server_capabilities: Some(server_capabilities_to_proto(
                &metadata.server_capabilities,
            )),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> GrpcResult<proto::validate_provider_config::Response> {
        let req = request.into_inner();
        let config = decode_dynamic_value(req.config.as_ref())?;

        let provider = self.provider.read().await;
        let schema = provider
            .schema(self.ctx.clone(), ProviderSchemaRequest)
            .await
            .schema;
        let mut diagnostics = validate_block(&schema.block, &config.value, &AttributePath::root());
        let response = provider
            .validate(self.ctx.clone(), ValidateProviderConfigRequest { config })
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> GrpcResult<proto::validate_resource_config::Response> {
        let req = request.into_inner();
        let config = decode_dynamic_value(req.config.as_ref())?;
        let (resource, _) = self.resource(&req.type_name).await?;
        let schema = self.resource_schema(resource.as_ref()).await;

        let mut diagnostics = validate_block(&schema.block, &config.value, &AttributePath::root());
        let response = resource
            .validate(
                self.ctx.clone(),
                ValidateResourceConfigRequest {
                    type_name: req.type_name,
                    config,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> GrpcResult<proto::validate_data_resource_config::Response> {
        let req = request.into_inner();
        let config = decode_dynamic_value(req.config.as_ref())?;
        let (data_source, _) = self.data_source(&req.type_name).await?;
        let schema = data_source
            .schema(self.ctx.clone(), DataSourceSchemaRequest)
            .await
            .schema;

        let mut diagnostics = validate_block(&schema.block, &config.value, &AttributePath::root());
        let response = data_source
            .validate(
                self.ctx.clone(),
                ValidateDataSourceConfigRequest {
                    type_name: req.type_name,
                    config,
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> GrpcResult<proto::upgrade_resource_state::Response> {
        let req = request.into_inner();
        let (resource, mut diagnostics) = self.resource(&req.type_name).await?;
        let schema = self.resource_schema(resource.as_ref()).await;

        let raw_state = req
            .raw_state
            .map(|raw| RawState {
                json: (!raw.json.is_empty()).then_some(raw.json),
                flatmap: (!raw.flatmap.is_empty()).then_some(raw.flatmap),
            })
            .unwrap_or_default();

        let upgraded = if req.version < schema.version {
            match resource.as_upgrade_state() {
                Some(upgrader) => {
                    tracing::debug!(
                        "Upgrading {} state from version {} to {}",
                        req.type_name,
                        req.version,
                        schema.version
                    );
                    let response = upgrader
                        .upgrade_state(
                            self.ctx.clone(),
                            UpgradeResourceStateRequest {
                                type_name: req.type_name.clone(),
                                version: req.version,
                                raw_state,
                            },
                        )
                        .await;
                    diagnostics.extend(response.diagnostics);
                    response.upgraded_state
                }
                None => {
                    diagnostics.push(Diagnostic::error(
                        "Unable to upgrade resource state",
                        format!(
                            "{} has no upgrader from schema version {} to {}",
                            req.type_name, req.version, schema.version
                        ),
                    ));
                    DynamicValue::null()
                }
            }
        } else {
            match raw_state.decode() {
                Ok(state) => state,
                Err(e) => {
                    diagnostics.push(Diagnostic::error(
                        "Unable to decode stored state",
                        e.to_string(),
                    ));
                    DynamicValue::null()
                }
            }
        };

        let upgraded_state = if has_errors(&diagnostics) {
            None
        } else {
            Some(encode_dynamic_value(&conform_state(&upgraded, &schema))?)
        };

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state,
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> GrpcResult<proto::configure_provider::Response> {
        let req = request.into_inner();
        let config = decode_dynamic_value(req.config.as_ref())?;

        let mut provider = self.provider.write().await;
        let response = provider
            .configure(
                self.ctx.clone(),
                ConfigureProviderRequest {
                    terraform_version: req.terraform_version,
                    config,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;
        drop(provider);

        if let Some(data) = response.provider_data {
            *self.provider_data.write().await = Some(data);
        }

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(&response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> GrpcResult<proto::read_resource::Response> {
        let req = request.into_inner();
        let current_state = decode_dynamic_value(req.current_state.as_ref())?;
        let provider_meta = decode_optional(req.provider_meta.as_ref())?;
        let (resource, mut diagnostics) = self.resource(&req.type_name).await?;
        let schema = self.resource_schema(resource.as_ref()).await;

        let response = resource
            .read(
                self.ctx.clone(),
                ReadResourceRequest {
                    type_name: req.type_name.clone(),
                    current_state: current_state.clone(),
                    private: req.private,
                    provider_meta,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        let new_state = match response.new_state {
            Some(state) => conform_state(&state, &schema),
            None => {
                tracing::info!("{} no longer exists, removing from state", req.type_name);
                DynamicValue::null()
            }
        };

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            diagnostics: diagnostics_to_proto(&diagnostics),
            private: response.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> GrpcResult<proto::plan_resource_change::Response> {
        let req = request.into_inner();
        let prior_state = decode_dynamic_value(req.prior_state.as_ref())?;
        let proposed_new_state = decode_dynamic_value(req.proposed_new_state.as_ref())?;
        let config = decode_dynamic_value(req.config.as_ref())?;
        let provider_meta = decode_optional(req.provider_meta.as_ref())?;

        // Destroy plans carry no state
        if proposed_new_state.is_null() {
            return Ok(Response::new(proto::plan_resource_change::Response {
                planned_state: Some(encode_dynamic_value(&DynamicValue::null())?),
                requires_replace: vec![],
                planned_private: req.prior_private,
                diagnostics: vec![],
                legacy_type_system: self.legacy_type_system,
            }));
        }

        let (resource, mut diagnostics) = self.resource(&req.type_name).await?;
        let schema = self.resource_schema(resource.as_ref()).await;

        let mut plan = ResourcePlan::new(&schema, &config, &prior_state, proposed_new_state);
        plan.run();
        diagnostics.append(&mut plan.diagnostics);
        let mut planned_state = plan.planned;
        let mut requires_replace = plan.requires_replace;
        let mut planned_private = req.prior_private.clone();

        if let Some(modifier) = resource.as_modify_plan() {
            if !has_errors(&diagnostics) {
                let response = modifier
                    .modify_plan(
                        self.ctx.clone(),
                        ModifyPlanRequest {
                            type_name: req.type_name.clone(),
                            config,
                            prior_state,
                            proposed_new_state: planned_state,
                            prior_private: req.prior_private,
                            provider_meta,
                        },
                    )
                    .await;
                planned_state = response.planned_state;
                requires_replace.extend(response.requires_replace);
                planned_private = response.planned_private;
                diagnostics.extend(response.diagnostics);
            }
        }

        let planned_state = conform_state(&planned_state, &schema);

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_dynamic_value(&planned_state)?),
            requires_replace: requires_replace
                .iter()
                .map(attribute_path_to_proto)
                .collect(),
            planned_private,
            diagnostics: diagnostics_to_proto(&diagnostics),
            legacy_type_system: self.legacy_type_system,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> GrpcResult<proto::apply_resource_change::Response> {
        let req = request.into_inner();
        let prior_state = decode_dynamic_value(req.prior_state.as_ref())?;
        let planned_state = decode_dynamic_value(req.planned_state.as_ref())?;
        let config = decode_dynamic_value(req.config.as_ref())?;
        let provider_meta = decode_optional(req.provider_meta.as_ref())?;
        let (resource, mut diagnostics) = self.resource(&req.type_name).await?;
        let schema = self.resource_schema(resource.as_ref()).await;

        if has_errors(&diagnostics) {
            return Ok(Response::new(proto::apply_resource_change::Response {
                new_state: Some(encode_dynamic_value(&prior_state)?),
                private: req.planned_private,
                diagnostics: diagnostics_to_proto(&diagnostics),
                legacy_type_system: self.legacy_type_system,
            }));
        }

        let (new_state, private) = if planned_state.is_null() {
            tracing::info!("Deleting {}", req.type_name);
            let response = resource
                .delete(
                    self.ctx.clone(),
                    DeleteResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior_state.clone(),
                        planned_private: req.planned_private.clone(),
                        provider_meta,
                    },
                )
                .await;
            let failed = has_errors(&response.diagnostics);
            diagnostics.extend(response.diagnostics);
            // A failed delete leaves the object in place
            let state = if failed {
                prior_state
            } else {
                DynamicValue::null()
            };
            (state, req.planned_private)
        } else if prior_state.is_null() {
            tracing::info!("Creating {}", req.type_name);
            let response = resource
                .create(
                    self.ctx.clone(),
                    CreateResourceRequest {
                        type_name: req.type_name.clone(),
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            diagnostics.extend(response.diagnostics);
            (response.new_state, response.private)
        } else {
            tracing::info!("Updating {}", req.type_name);
            let response = resource
                .update(
                    self.ctx.clone(),
                    UpdateResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state,
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            diagnostics.extend(response.diagnostics);
            (response.new_state, response.private)
        };

        let mut new_state = conform_state(&new_state, &schema);
        if has_errors(&diagnostics) {
            new_state = DynamicValue::new(new_state.value.unknowns_to_null());
        }

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            private,
            diagnostics: diagnostics_to_proto(&diagnostics),
            legacy_type_system: self.legacy_type_system,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> GrpcResult<proto::import_resource_state::Response> {
        let req = request.into_inner();
        let (resource, mut diagnostics) = self.resource(&req.type_name).await?;
        let schema = self.resource_schema(resource.as_ref()).await;

        let mut imported_resources = vec![];
        match resource.as_import_state() {
            Some(importer) => {
                let response = importer
                    .import_state(
                        self.ctx.clone(),
                        ImportResourceStateRequest {
                            type_name: req.type_name.clone(),
                            id: req.id,
                            client_capabilities: client_capabilities_from_proto(
                                req.client_capabilities.as_ref(),
                            ),
                        },
                    )
                    .await;
                diagnostics.extend(response.diagnostics);
                for imported in response.imported_resources {
                    let state = conform_state(&imported.state, &schema);
                    imported_resources.push(proto::import_resource_state::ImportedResource {
                        type_name: imported.type_name,
                        state: Some(encode_dynamic_value(&state)?),
                        private: imported.private,
                    });
                }
            }
            None => diagnostics.push(Diagnostic::error(
                "Resource import not supported",
                format!("{} does not support import", req.type_name),
            )),
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> GrpcResult<proto::read_data_source::Response> {
        let req = request.into_inner();
        let config = decode_dynamic_value(req.config.as_ref())?;
        let provider_meta = decode_optional(req.provider_meta.as_ref())?;
        let (data_source, mut diagnostics) = self.data_source(&req.type_name).await?;
        let schema = data_source
            .schema(self.ctx.clone(), DataSourceSchemaRequest)
            .await
            .schema;

        let response = data_source
            .read(
                self.ctx.clone(),
                ReadDataSourceRequest {
                    type_name: req.type_name,
                    config,
                    provider_meta,
                    client_capabilities: client_capabilities_from_proto(
                        req.client_capabilities.as_ref(),
                    ),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        let state = conform_state(&response.state, &schema);
        Ok(Response::new(proto::read_data_source::Response {
            state: Some(encode_dynamic_value(&state)?),
            diagnostics: diagnostics_to_proto(&diagnostics),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> GrpcResult<proto::stop_provider::Response> {
        self.ctx.cancel();
        let provider = self.provider.read().await;
        let response = provider.stop(self.ctx.clone(), StopProviderRequest).await;
        Ok(Response::new(proto::stop_provider::Response {
            error: response.error.unwrap_or_default(),
        }))
    }
}

/// Attribute-level planning: defaults, computed unknowns, plan modifiers
struct ResourcePlan<'a> {
    schema: &'a Schema,
    config: &'a DynamicValue,
    prior: &'a DynamicValue,
    planned: DynamicValue,
    requires_replace: Vec<AttributePath>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ResourcePlan<'a> {
    fn new(
        schema: &'a Schema,
        config: &'a DynamicValue,
        prior: &'a DynamicValue,
        proposed: DynamicValue,
    ) -> Self {
        Self {
            schema,
            config,
            prior,
            planned: proposed,
            requires_replace: vec![],
            diagnostics: vec![],
        }
    }

    fn creating(&self) -> bool {
        self.prior.is_null()
    }

    fn run(&mut self) {
        let block = &self.schema.block;
        self.apply_defaults(block, &AttributePath::root());

        let changed = self.creating() || !values_equal(&self.prior.value, &self.planned.value);
        if changed {
            self.mark_computed_unknown(block, &AttributePath::root());
        }

        self.apply_plan_modifiers(block, &AttributePath::root());
    }

    fn apply_defaults(&mut self, block: &Block, base: &AttributePath) {
        for attr in &block.attributes {
            let path = join(base, &attr.name);
            let Some(default) = &attr.default else {
                continue;
            };
            if self.config.get(&path).is_null() {
                let value = default.default_value(DefaultRequest { path: path.clone() });
                let _ = self.planned.set_value(&path, value.value.value);
            }
        }
        for nested in &block.block_types {
            for element in self.block_elements(nested, base) {
                self.apply_defaults(&nested.block, &element);
            }
        }
    }

    fn mark_computed_unknown(&mut self, block: &Block, base: &AttributePath) {
        for attr in &block.attributes {
            let path = join(base, &attr.name);
            if attr.computed && attr.default.is_none() && self.config.get(&path).is_null() {
                let _ = self.planned.mark_unknown(&path);
            }
        }
        for nested in &block.block_types {
            for element in self.block_elements(nested, base) {
                self.mark_computed_unknown(&nested.block, &element);
            }
        }
    }

    fn apply_plan_modifiers(&mut self, block: &Block, base: &AttributePath) {
        for attr in &block.attributes {
            if attr.plan_modifiers.is_empty() {
                continue;
            }
            let path = join(base, &attr.name);
            self.modify_attribute(attr, &path);
        }
        for nested in &block.block_types {
            for element in self.block_elements(nested, base) {
                self.apply_plan_modifiers(&nested.block, &element);
            }
        }
    }

    fn modify_attribute(&mut self, attr: &Attribute, path: &AttributePath) {
        let config_value = DynamicValue::new(self.config.get(path));
        let state_value = DynamicValue::new(self.prior.get(path));
        let mut plan_value = DynamicValue::new(self.planned.get(path));

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify(PlanModifierRequest {
                config_value: config_value.clone(),
                state_value: state_value.clone(),
                plan_value,
                path: path.clone(),
                creating: self.creating(),
            });
            plan_value = response.plan_value;
            if response.requires_replace && !self.requires_replace.contains(path) {
                self.requires_replace.push(path.clone());
            }
            self.diagnostics.extend(response.diagnostics);
        }

        let _ = self.planned.set_value(path, plan_value.value);
    }

    /// Paths of each planned element of a nested block
    fn block_elements(&self, nested: &NestedBlock, base: &AttributePath) -> Vec<AttributePath> {
        let path = join(base, &nested.type_name);
        match (nested.nesting, self.planned.get(&path)) {
            (NestingMode::List | NestingMode::Set, Dynamic::List(items)) => (0..items.len())
                .map(|i| path.clone().index(i as i64))
                .collect(),
            (NestingMode::Single | NestingMode::Group, Dynamic::Map(_)) => vec![path],
            _ => vec![],
        }
    }
}

fn unknown(kind: &'static str, name: &str) -> Status {
    TfplugError::UnknownType {
        kind,
        name: name.to_string(),
    }
    .into()
}

fn join(base: &AttributePath, name: &str) -> AttributePath {
    base.clone().attribute(name)
}

/// Run attribute validators over known configuration values
fn validate_block(block: &Block, config: &Dynamic, base: &AttributePath) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];
    let Some(values) = config.as_map() else {
        return diagnostics;
    };

    for attr in &block.attributes {
        let value = values.get(&attr.name).cloned().unwrap_or(Dynamic::Null);
        if !value.is_known() {
            continue;
        }
        let path = join(base, &attr.name);
        for validator in &attr.validators {
            let response = validator.validate(ValidatorRequest {
                config_value: DynamicValue::new(value.clone()),
                path: path.clone(),
            });
            diagnostics.extend(response.diagnostics);
        }
    }

    for nested in &block.block_types {
        let path = join(base, &nested.type_name);
        match values.get(&nested.type_name) {
            Some(Dynamic::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    diagnostics.extend(validate_block(
                        &nested.block,
                        item,
                        &path.clone().index(i as i64),
                    ));
                }
            }
            Some(item @ Dynamic::Map(_)) => {
                diagnostics.extend(validate_block(&nested.block, item, &path));
            }
            _ => {}
        }
    }

    diagnostics
}

/// Shape a value so it carries exactly the attributes and blocks of the schema
///
/// Missing attributes become null, unknown keys are dropped and absent
/// list/set blocks become empty lists.
pub fn conform_state(value: &DynamicValue, schema: &Schema) -> DynamicValue {
    match &value.value {
        Dynamic::Null => DynamicValue::null(),
        Dynamic::Unknown => DynamicValue::unknown(),
        other => DynamicValue::new(conform_object(other, &schema.block)),
    }
}

fn conform_object(value: &Dynamic, block: &Block) -> Dynamic {
    let empty = HashMap::new();
    let source = value.as_map().unwrap_or(&empty);
    let mut out = HashMap::new();

    for attr in &block.attributes {
        let v = source.get(&attr.name).cloned().unwrap_or(Dynamic::Null);
        out.insert(attr.name.clone(), v);
    }

    for nested in &block.block_types {
        let v = source
            .get(&nested.type_name)
            .cloned()
            .unwrap_or(Dynamic::Null);
        let conformed = match (nested.nesting, v) {
            (_, Dynamic::Unknown) => Dynamic::Unknown,
            (NestingMode::List | NestingMode::Set, Dynamic::List(items)) => Dynamic::List(
                items
                    .iter()
                    .map(|item| conform_object(item, &nested.block))
                    .collect(),
            ),
            (NestingMode::List | NestingMode::Set, _) => Dynamic::List(vec![]),
            (NestingMode::Map, Dynamic::Map(items)) => Dynamic::Map(
                items
                    .iter()
                    .map(|(k, item)| (k.clone(), conform_object(item, &nested.block)))
                    .collect(),
            ),
            (NestingMode::Map, _) => Dynamic::Map(HashMap::new()),
            (NestingMode::Single | NestingMode::Group, Dynamic::Null) => Dynamic::Null,
            (NestingMode::Single | NestingMode::Group, other) => {
                conform_object(&other, &nested.block)
            }
            (NestingMode::Invalid, other) => other,
        };
        out.insert(nested.type_name.clone(), conformed);
    }

    Dynamic::Map(out)
}

#[allow(clippy::result_large_err)]
fn decode_dynamic_value(
    value: Option<&proto::DynamicValue>,
) -> std::result::Result<DynamicValue, Status> {
    let Some(value) = value else {
        return Ok(DynamicValue::null());
    };
    let decoded = if !value.msgpack.is_empty() {
        DynamicValue::decode_msgpack(&value.msgpack)
    } else {
        DynamicValue::decode_json(&value.json)
    };
    decoded.map_err(|e| {
        tracing::error!("Failed to decode dynamic value: {}", e);
        Status::from(e)
    })
}

#[allow(clippy::result_large_err)]
fn decode_optional(
    value: Option<&proto::DynamicValue>,
) -> std::result::Result<Option<DynamicValue>, Status> {
    let decoded = decode_dynamic_value(value)?;
    Ok((!decoded.is_null()).then_some(decoded))
}

#[allow(clippy::result_large_err)]
fn encode_dynamic_value(value: &DynamicValue) -> std::result::Result<proto::DynamicValue, Status> {
    let msgpack = value.encode_msgpack().map_err(Status::from)?;
    Ok(proto::DynamicValue {
        msgpack,
        json: vec![],
    })
}

fn client_capabilities_from_proto(caps: Option<&proto::ClientCapabilities>) -> ClientCapabilities {
    caps.map(|c| ClientCapabilities {
        deferral_allowed: c.deferral_allowed,
        write_only_attributes_allowed: c.write_only_attributes_allowed,
    })
    .unwrap_or_default()
}

fn server_capabilities_to_proto(
    caps: &crate::types::ServerCapabilities,
) -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: caps.plan_destroy,
        get_provider_schema_optional: caps.get_provider_schema_optional,
        move_resource_state: caps.move_resource_state,
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> proto::schema::Block {
    proto::schema::Block {
        version: block.version,
        attributes: block.attributes.iter().map(attribute_to_proto).collect(),
        block_types: block
            .block_types
            .iter()
            .map(|nested| proto::schema::NestedBlock {
                type_name: nested.type_name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting: nesting_to_proto(nested.nesting) as i32,
                min_items: nested.min_items,
                max_items: nested.max_items,
            })
            .collect(),
        description: block.description.clone(),
        description_kind: string_kind_to_proto(block.description_kind) as i32,
        deprecated: block.deprecated,
    }
}

fn attribute_to_proto(attr: &Attribute) -> proto::schema::Attribute {
    proto::schema::Attribute {
        name: attr.name.clone(),
        r#type: attr.r#type.encode(),
        description: attr.description.clone(),
        required: attr.required,
        optional: attr.optional,
        computed: attr.computed,
        sensitive: attr.sensitive,
        description_kind: proto::StringKind::Plain as i32,
        deprecated: attr.deprecated,
        write_only: false,
    }
}

fn nesting_to_proto(mode: NestingMode) -> proto::schema::nested_block::NestingMode {
    use proto::schema::nested_block::NestingMode as P;
    match mode {
        NestingMode::Invalid => P::Invalid,
        NestingMode::Single => P::Single,
        NestingMode::List => P::List,
        NestingMode::Set => P::Set,
        NestingMode::Map => P::Map,
        NestingMode::Group => P::Group,
    }
}

fn string_kind_to_proto(kind: StringKind) -> proto::StringKind {
    match kind {
        StringKind::Plain => proto::StringKind::Plain,
        StringKind::Markdown => proto::StringKind::Markdown,
    }
}

fn attribute_path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::{step::Selector, Step};
    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

fn diagnostics_to_proto(diagnostics: &[Diagnostic]) -> Vec<proto::Diagnostic> {
    diagnostics
        .iter()
        .map(|d| proto::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid,
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
            } as i32,
            summary: d.summary.clone(),
            detail: d.detail.clone(),
            attribute: d.attribute.as_ref().map(attribute_path_to_proto),
        })
        .collect()
}
