//! Drives the azurerm provider through the gRPC service without contacting Azure

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use azurerm::AzureRmProvider;
use serial_test::serial;
use std::collections::HashMap;
use tfplug::proto::{self, provider_server::Provider as _};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::GrpcProviderServer;
use tonic::Request;

const CREDENTIAL_VARS: [&str; 4] = [
    "ARM_SUBSCRIPTION_ID",
    "ARM_TENANT_ID",
    "ARM_CLIENT_ID",
    "ARM_CLIENT_SECRET",
];

fn clear_env() {
    for var in CREDENTIAL_VARS.iter().chain(&[
        "ARM_ENVIRONMENT",
        "ARM_RESOURCE_MANAGER_ENDPOINT",
        "ARM_AUTHORITY_HOST",
    ]) {
        std::env::remove_var(var);
    }
}

fn object(pairs: &[(&str, Dynamic)]) -> DynamicValue {
    DynamicValue::new(Dynamic::Map(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    ))
}

fn encode(value: &DynamicValue) -> Option<proto::DynamicValue> {
    Some(proto::DynamicValue {
        msgpack: value.encode_msgpack().unwrap(),
        json: vec![],
    })
}

fn decode(value: Option<proto::DynamicValue>) -> DynamicValue {
    DynamicValue::decode_msgpack(&value.unwrap().msgpack).unwrap()
}

fn server() -> GrpcProviderServer<AzureRmProvider> {
    GrpcProviderServer::new(AzureRmProvider::new())
}

#[tokio::test]
async fn schema_lists_every_resource_and_data_source() {
    let response = server()
        .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
        .await
        .unwrap()
        .into_inner();

    assert!(response.diagnostics.is_empty());
    assert_eq!(response.resource_schemas.len(), 16);
    assert_eq!(response.data_source_schemas.len(), 3);

    let provider = response.provider.unwrap().block.unwrap();
    let secret = provider
        .attributes
        .iter()
        .find(|a| a.name == "client_secret")
        .unwrap();
    assert!(secret.sensitive);
    assert!(provider.block_types.iter().any(|b| b.type_name == "features"));

    let api = &response.resource_schemas["azurerm_api_management_api"];
    assert_eq!(api.version, 1);
    let namespace = &response.resource_schemas["azurerm_servicebus_namespace"];
    assert!(namespace
        .block
        .as_ref()
        .unwrap()
        .attributes
        .iter()
        .any(|a| a.name == "default_primary_key" && a.sensitive && a.computed));
}

#[tokio::test]
#[serial]
async fn configure_without_credentials_fails() {
    clear_env();

    let response = server()
        .configure_provider(Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: encode(&object(&[])),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.diagnostics.len(), 4);
    assert_eq!(response.diagnostics[0].summary, "Missing subscription_id");
}

#[tokio::test]
#[serial]
async fn configure_from_environment() {
    clear_env();
    for var in CREDENTIAL_VARS {
        std::env::set_var(var, "00000000-0000-0000-0000-000000000000");
    }

    let response = server()
        .configure_provider(Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: encode(&object(&[("environment", "usgovernment".into())])),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);

    clear_env();
}

#[tokio::test]
async fn namespace_name_is_validated() {
    let response = server()
        .validate_resource_config(Request::new(proto::validate_resource_config::Request {
            type_name: "azurerm_servicebus_namespace".to_string(),
            config: encode(&object(&[
                ("name", "orders-sb".into()),
                ("resource_group_name", "rg".into()),
                ("location", "westeurope".into()),
                ("sku", "Standard".into()),
            ])),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(response
        .diagnostics
        .iter()
        .any(|d| d.detail.contains("-sb")));
}

#[tokio::test]
async fn legacy_version_set_state_is_upgraded() {
    let legacy = r#"{"id":"/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ApiManagement/service/apim1/api-version-set/pets","name":"pets"}"#;

    let response = server()
        .upgrade_resource_state(Request::new(proto::upgrade_resource_state::Request {
            type_name: "azurerm_api_management_api_version_set".to_string(),
            version: 0,
            raw_state: Some(proto::RawState {
                json: legacy.as_bytes().to_vec(),
                flatmap: HashMap::new(),
            }),
        }))
        .await
        .unwrap()
        .into_inner();

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let state = decode(response.upgraded_state);
    assert!(state
        .get_string(&AttributePath::new("id"))
        .unwrap()
        .ends_with("/apiVersionSets/pets"));
}

#[tokio::test]
async fn import_rejects_ids_of_other_resources() {
    let server = server();
    let queue = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.ServiceBus/namespaces/sb-orders/queues/orders";

    let response = server
        .import_resource_state(Request::new(proto::import_resource_state::Request {
            type_name: "azurerm_servicebus_topic".to_string(),
            id: queue.to_string(),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.diagnostics.len(), 1);
    assert!(response.imported_resources.is_empty());

    let response = server
        .import_resource_state(Request::new(proto::import_resource_state::Request {
            type_name: "azurerm_servicebus_queue".to_string(),
            id: queue.to_string(),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let state = decode(response.imported_resources[0].state.clone());
    assert_eq!(
        state.get_string(&AttributePath::new("id")).unwrap(),
        queue
    );
}
