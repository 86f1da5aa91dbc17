//! API Management REST API

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tfplug::context::Context;

use super::{ApiError, Client, RequestOptions, API_MANAGEMENT_API_VERSION};
use crate::parse::{
    ApiId, ApiManagementId, ApiVersionSetId, BackendId, DeletedServiceId, NamedValueId, ProductId,
    ResourceId,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiManagementService {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub sku: ServiceSku,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ServiceIdentity>,
    #[serde(default)]
    pub properties: ServiceProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceIdentity {
    /// `None`, `SystemAssigned`, `UserAssigned` or `SystemAssigned, UserAssigned`
    #[serde(rename = "type")]
    pub identity_type: String,
    #[serde(skip_serializing)]
    pub principal_id: Option<String>,
    #[serde(skip_serializing)]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_assigned_identities: Option<HashMap<String, UserAssignedIdentity>>,
}

/// Details of a user-assigned identity; requests send an empty object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentity {
    #[serde(skip_serializing)]
    pub principal_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSku {
    pub name: String,
    pub capacity: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProperties {
    #[serde(default)]
    pub publisher_name: String,
    #[serde(default)]
    pub publisher_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_network_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_network_configuration: Option<VirtualNetworkConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_network_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_client_certificate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version_constraint: Option<ApiVersionConstraint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_sender_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname_configurations: Option<Vec<HostnameConfiguration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_locations: Option<Vec<AdditionalLocation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<CertificateConfiguration>>,
    #[serde(skip_serializing)]
    pub gateway_url: Option<String>,
    #[serde(skip_serializing)]
    pub gateway_regional_url: Option<String>,
    #[serde(skip_serializing)]
    pub management_api_url: Option<String>,
    #[serde(skip_serializing)]
    pub portal_url: Option<String>,
    #[serde(skip_serializing)]
    pub developer_portal_url: Option<String>,
    #[serde(skip_serializing)]
    pub scm_url: Option<String>,
    #[serde(rename = "publicIPAddresses", default, skip_serializing)]
    pub public_ip_addresses: Vec<String>,
    #[serde(rename = "privateIPAddresses", default, skip_serializing)]
    pub private_ip_addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkConfiguration {
    pub subnet_resource_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostnameConfiguration {
    /// `Management`, `Portal`, `DeveloperPortal`, `Proxy` or `Scm`
    #[serde(rename = "type")]
    pub hostname_type: String,
    pub host_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiate_client_certificate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ssl_binding: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_client_id: Option<String>,
    /// `BuiltIn` for the default `*.azure-api.net` names
    #[serde(skip_serializing)]
    pub certificate_source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalLocation {
    pub location: String,
    #[serde(default)]
    pub sku: ServiceSku,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_network_configuration: Option<VirtualNetworkConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_gateway: Option<bool>,
    #[serde(skip_serializing)]
    pub gateway_regional_url: Option<String>,
    #[serde(rename = "publicIPAddresses", default, skip_serializing)]
    pub public_ip_addresses: Vec<String>,
    #[serde(rename = "privateIPAddresses", default, skip_serializing)]
    pub private_ip_addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_password: Option<String>,
    /// `CertificateAuthority` or `Root`
    pub store_name: String,
    #[serde(skip_serializing)]
    pub certificate: Option<CertificateInformation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CertificateInformation {
    pub expiry: String,
    pub subject: String,
    pub thumbprint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersionConstraint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_api_version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeletedService {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub properties: DeletedServiceProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeletedServiceProperties {
    pub service_id: Option<String>,
    pub scheduled_purge_date: Option<String>,
    pub deletion_date: Option<String>,
}

/// Minimal shape of list results where only the name matters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedResource {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Api {
    #[serde(default)]
    pub properties: ApiProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_revision_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version_set_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_required: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub api_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_api_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_key_parameter_names: Option<SubscriptionKeyParameterNames>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<ApiContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<ApiLicense>,
    #[serde(skip_serializing)]
    pub is_current: Option<bool>,
    #[serde(skip_serializing)]
    pub is_online: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionKeyParameterNames {
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiLicense {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiVersionSet {
    #[serde(default)]
    pub properties: ApiVersionSetProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersionSetProperties {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub versioning_scheme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_header_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_query_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamedValue {
    #[serde(default)]
    pub properties: NamedValueProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedValueProperties {
    #[serde(default)]
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault: Option<KeyVaultContract>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyVaultContract {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_client_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Backend {
    #[serde(default)]
    pub properties: BackendProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProperties {
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<BackendCredentials>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<BackendProxy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<BackendTls>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendCredentials {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificate: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub header: HashMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub query: HashMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<BackendAuthorization>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendAuthorization {
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub parameter: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendProxy {
    #[serde(default)]
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendTls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_certificate_chain: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_certificate_name: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub properties: ProductProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductProperties {
    #[serde(default)]
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriptions_limit: Option<i64>,
    /// `published` or `notPublished`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortalSigninSettings {
    #[serde(default)]
    pub properties: PortalSigninProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortalSigninProperties {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortalSignupSettings {
    #[serde(default)]
    pub properties: PortalSignupProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalSignupProperties {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub terms_of_service: TermsOfService,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermsOfService {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub consent_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub properties: PolicyProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyProperties {
    /// `xml` for inline content, `xml-link` for a URL
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub value: String,
}

/// API Management operations on an ARM client
pub struct ApiManagementApi<'a> {
    client: &'a Client,
}

impl<'a> ApiManagementApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get_service(&self, id: &ApiManagementId) -> Result<ApiManagementService, ApiError> {
        self.client.get(&id.id(), API_MANAGEMENT_API_VERSION).await
    }

    pub async fn create_or_update_service(
        &self,
        ctx: &Context,
        id: &ApiManagementId,
        service: &ApiManagementService,
    ) -> Result<ApiManagementService, ApiError> {
        tracing::info!("Writing API Management service {}", id);
        self.client
            .put(ctx, &id.id(), API_MANAGEMENT_API_VERSION, service)
            .await
    }

    pub async fn delete_service(&self, ctx: &Context, id: &ApiManagementId) -> Result<(), ApiError> {
        tracing::info!("Deleting API Management service {}", id);
        self.client
            .delete(ctx, &id.id(), API_MANAGEMENT_API_VERSION)
            .await
    }

    pub async fn get_signin_settings(&self, id: &ApiManagementId) -> Result<PortalSigninSettings, ApiError> {
        self.client
            .get(&portal_settings(id, "signin"), API_MANAGEMENT_API_VERSION)
            .await
    }

    pub async fn update_signin_settings(
        &self,
        ctx: &Context,
        id: &ApiManagementId,
        settings: &PortalSigninSettings,
    ) -> Result<PortalSigninSettings, ApiError> {
        self.client
            .put(ctx, &portal_settings(id, "signin"), API_MANAGEMENT_API_VERSION, settings)
            .await
    }

    pub async fn get_signup_settings(&self, id: &ApiManagementId) -> Result<PortalSignupSettings, ApiError> {
        self.client
            .get(&portal_settings(id, "signup"), API_MANAGEMENT_API_VERSION)
            .await
    }

    pub async fn update_signup_settings(
        &self,
        ctx: &Context,
        id: &ApiManagementId,
        settings: &PortalSignupSettings,
    ) -> Result<PortalSignupSettings, ApiError> {
        self.client
            .put(ctx, &portal_settings(id, "signup"), API_MANAGEMENT_API_VERSION, settings)
            .await
    }

    /// The service-wide policy, `None` when the service has none
    pub async fn get_service_policy(&self, id: &ApiManagementId) -> Result<Option<Policy>, ApiError> {
        match self
            .client
            .get(&service_policy(id), API_MANAGEMENT_API_VERSION)
            .await
        {
            Ok(policy) => Ok(Some(policy)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_or_update_service_policy(
        &self,
        ctx: &Context,
        id: &ApiManagementId,
        policy: &Policy,
    ) -> Result<Policy, ApiError> {
        tracing::info!("Writing policy of API Management service {}", id);
        self.client
            .put(ctx, &service_policy(id), API_MANAGEMENT_API_VERSION, policy)
            .await
    }

    pub async fn delete_service_policy(&self, ctx: &Context, id: &ApiManagementId) -> Result<(), ApiError> {
        tracing::info!("Removing policy of API Management service {}", id);
        self.client
            .delete_with(
                ctx,
                &service_policy(id),
                API_MANAGEMENT_API_VERSION,
                &RequestOptions::if_match_any(),
            )
            .await
    }

    pub async fn get_deleted_service(&self, id: &DeletedServiceId) -> Result<DeletedService, ApiError> {
        self.client.get(&id.id(), API_MANAGEMENT_API_VERSION).await
    }

    pub async fn purge_deleted_service(
        &self,
        ctx: &Context,
        id: &DeletedServiceId,
    ) -> Result<(), ApiError> {
        tracing::info!("Purging soft-deleted API Management service {}", id);
        self.client
            .delete(ctx, &id.id(), API_MANAGEMENT_API_VERSION)
            .await
    }

    pub async fn list_apis(&self, service: &ApiManagementId) -> Result<Vec<NamedResource>, ApiError> {
        self.client
            .list(&format!("{}/apis", service.id()), API_MANAGEMENT_API_VERSION)
            .await
    }

    pub async fn get_api(&self, id: &ApiId) -> Result<Api, ApiError> {
        self.client.get(&id.id(), API_MANAGEMENT_API_VERSION).await
    }

    pub async fn create_or_update_api(&self, ctx: &Context, id: &ApiId, api: &Api) -> Result<Api, ApiError> {
        self.client
            .put(ctx, &id.id(), API_MANAGEMENT_API_VERSION, api)
            .await
    }

    /// Delete an API, optionally with all of its revisions
    pub async fn delete_api(&self, ctx: &Context, id: &ApiId, delete_revisions: bool) -> Result<(), ApiError> {
        let mut options = RequestOptions::if_match_any();
        if delete_revisions {
            options = options.with_query("deleteRevisions", "true");
        }
        self.client
            .delete_with(ctx, &id.id(), API_MANAGEMENT_API_VERSION, &options)
            .await
    }

    pub async fn get_api_version_set(&self, id: &ApiVersionSetId) -> Result<ApiVersionSet, ApiError> {
        self.client.get(&id.id(), API_MANAGEMENT_API_VERSION).await
    }

    pub async fn create_or_update_api_version_set(
        &self,
        ctx: &Context,
        id: &ApiVersionSetId,
        version_set: &ApiVersionSet,
    ) -> Result<ApiVersionSet, ApiError> {
        self.client
            .put(ctx, &id.id(), API_MANAGEMENT_API_VERSION, version_set)
            .await
    }

    pub async fn delete_api_version_set(&self, ctx: &Context, id: &ApiVersionSetId) -> Result<(), ApiError> {
        self.client
            .delete_with(
                ctx,
                &id.id(),
                API_MANAGEMENT_API_VERSION,
                &RequestOptions::if_match_any(),
            )
            .await
    }

    pub async fn get_named_value(&self, id: &NamedValueId) -> Result<NamedValue, ApiError> {
        self.client.get(&id.id(), API_MANAGEMENT_API_VERSION).await
    }

    pub async fn create_or_update_named_value(
        &self,
        ctx: &Context,
        id: &NamedValueId,
        named_value: &NamedValue,
    ) -> Result<NamedValue, ApiError> {
        self.client
            .put(ctx, &id.id(), API_MANAGEMENT_API_VERSION, named_value)
            .await
    }

    pub async fn delete_named_value(&self, ctx: &Context, id: &NamedValueId) -> Result<(), ApiError> {
        self.client
            .delete_with(
                ctx,
                &id.id(),
                API_MANAGEMENT_API_VERSION,
                &RequestOptions::if_match_any(),
            )
            .await
    }

    pub async fn get_backend(&self, id: &BackendId) -> Result<Backend, ApiError> {
        self.client.get(&id.id(), API_MANAGEMENT_API_VERSION).await
    }

    pub async fn create_or_update_backend(
        &self,
        ctx: &Context,
        id: &BackendId,
        backend: &Backend,
    ) -> Result<Backend, ApiError> {
        self.client
            .put(ctx, &id.id(), API_MANAGEMENT_API_VERSION, backend)
            .await
    }

    pub async fn delete_backend(&self, ctx: &Context, id: &BackendId) -> Result<(), ApiError> {
        self.client
            .delete_with(
                ctx,
                &id.id(),
                API_MANAGEMENT_API_VERSION,
                &RequestOptions::if_match_any(),
            )
            .await
    }

    pub async fn list_products(&self, service: &ApiManagementId) -> Result<Vec<NamedResource>, ApiError> {
        self.client
            .list(&format!("{}/products", service.id()), API_MANAGEMENT_API_VERSION)
            .await
    }

    pub async fn get_product(&self, id: &ProductId) -> Result<Product, ApiError> {
        self.client.get(&id.id(), API_MANAGEMENT_API_VERSION).await
    }

    pub async fn create_or_update_product(
        &self,
        ctx: &Context,
        id: &ProductId,
        product: &Product,
    ) -> Result<Product, ApiError> {
        self.client
            .put(ctx, &id.id(), API_MANAGEMENT_API_VERSION, product)
            .await
    }

    /// Delete a product along with any subscriptions to it
    pub async fn delete_product(&self, ctx: &Context, id: &ProductId) -> Result<(), ApiError> {
        let options = RequestOptions::if_match_any().with_query("deleteSubscriptions", "true");
        self.client
            .delete_with(ctx, &id.id(), API_MANAGEMENT_API_VERSION, &options)
            .await
    }
}

fn portal_settings(id: &ApiManagementId, name: &str) -> String {
    format!("{}/portalsettings/{}", id.id(), name)
}

fn service_policy(id: &ApiManagementId) -> String {
    format!("{}/policies/policy", id.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, mock_token, TEST_SUBSCRIPTION};
    use mockito::{Matcher, Server};

    fn service_id() -> ApiManagementId {
        ApiManagementId::new(TEST_SUBSCRIPTION, "rg", "apim1")
    }

    #[tokio::test]
    async fn get_service_decodes_urls_and_addresses() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _mock = server
            .mock("GET", service_id().id().as_str())
            .match_query(Matcher::UrlEncoded(
                "api-version".into(),
                API_MANAGEMENT_API_VERSION.into(),
            ))
            .with_body(
                r#"{"location":"westeurope","sku":{"name":"Developer","capacity":1},
                   "properties":{"publisherName":"Contoso","publisherEmail":"admin@contoso.com",
                   "gatewayUrl":"https://apim1.azure-api.net","publicIPAddresses":["20.1.2.3"],
                   "virtualNetworkType":"None"}}"#,
            )
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let service = client.api_management().get_service(&service_id()).await.unwrap();

        assert_eq!(service.sku.name, "Developer");
        assert_eq!(service.properties.publisher_name, "Contoso");
        assert_eq!(
            service.properties.gateway_url.as_deref(),
            Some("https://apim1.azure-api.net")
        );
        assert_eq!(service.properties.public_ip_addresses, vec!["20.1.2.3"]);
        assert!(service.properties.private_ip_addresses.is_empty());
    }

    #[tokio::test]
    async fn delete_api_sends_if_match_and_revisions_flag() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let api = ApiId::new(TEST_SUBSCRIPTION, "rg", "apim1", "echo-api");
        let mock = server
            .mock("DELETE", api.id().as_str())
            .match_header("if-match", "*")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("api-version".into(), API_MANAGEMENT_API_VERSION.into()),
                Matcher::UrlEncoded("deleteRevisions".into(), "true".into()),
            ]))
            .with_status(200)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        client
            .api_management()
            .delete_api(&Context::new(), &api, true)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn list_apis_follows_next_link() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let path = format!("{}/apis", service_id().id());
        let next = format!("{}{}?api-version={}&$skip=1", server.url(), path, API_MANAGEMENT_API_VERSION);
        let _first = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Exact(format!("api-version={}", API_MANAGEMENT_API_VERSION)))
            .with_body(
                serde_json::json!({"value":[{"name":"echo-api"}],"nextLink":next}).to_string(),
            )
            .create_async()
            .await;
        let _second = server
            .mock("GET", path.as_str())
            .match_query(Matcher::UrlEncoded("$skip".into(), "1".into()))
            .with_body(r#"{"value":[{"name":"conference-api"}]}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let apis = client.api_management().list_apis(&service_id()).await.unwrap();

        let names: Vec<_> = apis.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["echo-api", "conference-api"]);
    }

    #[test]
    fn service_serialization_skips_read_only_fields() {
        let service = ApiManagementService {
            location: Some("westeurope".to_string()),
            sku: ServiceSku {
                name: "Consumption".to_string(),
                capacity: 0,
            },
            properties: ServiceProperties {
                publisher_name: "Contoso".to_string(),
                publisher_email: "admin@contoso.com".to_string(),
                gateway_url: Some("https://ignored".to_string()),
                public_ip_addresses: vec!["1.2.3.4".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };

        let json = serde_json::to_value(&service).unwrap();
        assert_eq!(json["properties"]["publisherName"], "Contoso");
        assert!(json["properties"].get("gatewayUrl").is_none());
        assert!(json["properties"].get("publicIPAddresses").is_none());
        assert!(json.get("zones").is_none());
    }

    #[test]
    fn service_settings_serialize_with_arm_names() {
        let service = ApiManagementService {
            identity: Some(ServiceIdentity {
                identity_type: "UserAssigned".to_string(),
                principal_id: Some("ignored".to_string()),
                user_assigned_identities: Some(HashMap::from([(
                    "/identities/ops".to_string(),
                    UserAssignedIdentity::default(),
                )])),
                ..Default::default()
            }),
            properties: ServiceProperties {
                hostname_configurations: Some(vec![HostnameConfiguration {
                    hostname_type: "Proxy".to_string(),
                    host_name: "api.contoso.com".to_string(),
                    default_ssl_binding: Some(true),
                    certificate_source: Some("Custom".to_string()),
                    ..Default::default()
                }]),
                certificates: Some(vec![CertificateConfiguration {
                    store_name: "Root".to_string(),
                    encoded_certificate: Some("MIIB".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            ..Default::default()
        };

        let json = serde_json::to_value(&service).unwrap();
        assert_eq!(json["identity"]["type"], "UserAssigned");
        assert!(json["identity"].get("principalId").is_none());
        assert_eq!(
            json["identity"]["userAssignedIdentities"]["/identities/ops"],
            serde_json::json!({})
        );
        let hostname = &json["properties"]["hostnameConfigurations"][0];
        assert_eq!(hostname["type"], "Proxy");
        assert_eq!(hostname["hostName"], "api.contoso.com");
        assert_eq!(hostname["defaultSslBinding"], true);
        assert!(hostname.get("certificateSource").is_none());
        assert_eq!(json["properties"]["certificates"][0]["storeName"], "Root");
    }

    #[tokio::test]
    async fn missing_service_policy_reads_as_none() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let path = format!("{}/policies/policy", service_id().id());
        let _mock = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound","message":"Policy not found"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let policy = client
            .api_management()
            .get_service_policy(&service_id())
            .await
            .unwrap();
        assert!(policy.is_none());
    }

    #[test]
    fn api_type_uses_type_key() {
        let api: Api = serde_json::from_str(
            r#"{"properties":{"type":"soap","apiRevision":"2","isCurrent":true}}"#,
        )
        .unwrap();
        assert_eq!(api.properties.api_type.as_deref(), Some("soap"));
        assert_eq!(api.properties.api_revision.as_deref(), Some("2"));
        assert_eq!(api.properties.is_current, Some(true));
    }
}
