//! Terraform Plugin Protocol v6 for async Rust providers
//!
//! A provider implements [`Provider`] and hands out factories for its
//! [`Resource`]s and [`DataSource`]s; [`serve`] runs the plugin process.
//! Schemas are declared with the builders in [`schema`], values are read
//! and written through [`DynamicValue`] and [`AttributePath`].

pub mod context;
pub mod data_source;
pub mod defaults;
pub mod error;
pub mod grpc;
pub mod import;
pub mod plan_modifier;
pub mod proto;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod server;
pub mod types;
pub mod validator;

pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use grpc::GrpcProviderServer;
pub use import::import_state_passthrough_id;
pub use provider::{Provider, ProviderData};
pub use resource::{
    Resource, ResourceWithConfigure, ResourceWithImportState, ResourceWithModifyPlan,
    ResourceWithUpgradeState,
};
pub use schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, Schema, SchemaBuilder};
pub use server::{serve, LogLevel, ServerConfig};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
