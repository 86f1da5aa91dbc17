//! Optional settings blocks of an API Management service
//!
//! Each block has a schema, an `expand_*` turning configuration into the ARM
//! model and a `flatten_*` turning the ARM model back into state. Secrets the
//! service never returns are carried over from the prior state.

use std::collections::HashMap;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, NestingMode};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOfValidator;

use crate::api::apimanagement::{
    AdditionalLocation, CertificateConfiguration, HostnameConfiguration, Policy, PolicyProperties,
    PortalSigninProperties, PortalSigninSettings, PortalSignupProperties, PortalSignupSettings,
    ServiceIdentity, ServiceSku, TermsOfService, UserAssignedIdentity, VirtualNetworkConfiguration,
};
use crate::parse::SubnetId;
use crate::resources::common::{attr, block_fields, id_for_state, location_for_state, normalize_location};

const IDENTITY_NONE: &str = "None";
const IDENTITY_TYPES: [&str; 3] = ["SystemAssigned", "UserAssigned", "SystemAssigned, UserAssigned"];

/// Block name and ARM `type` of each custom hostname kind
const HOSTNAME_KINDS: [(&str, &str); 5] = [
    ("management", "Management"),
    ("portal", "Portal"),
    ("developer_portal", "DeveloperPortal"),
    ("proxy", "Proxy"),
    ("scm", "Scm"),
];

const CERTIFICATE_STORES: [&str; 2] = ["CertificateAuthority", "Root"];

const SECURITY_PREFIX: &str = "Microsoft.WindowsAzure.ApiManagement.Gateway.Security.";
const HTTP2_PROPERTY: &str = "Microsoft.WindowsAzure.ApiManagement.Gateway.Protocols.Server.Http2";

/// `security` attributes and the custom property suffix each one toggles
const SECURITY_TOGGLES: [(&str, &str); 17] = [
    ("backend_ssl30_enabled", "Backend.Protocols.Ssl30"),
    ("backend_tls10_enabled", "Backend.Protocols.Tls10"),
    ("backend_tls11_enabled", "Backend.Protocols.Tls11"),
    ("frontend_tls10_enabled", "Protocols.Tls10"),
    ("frontend_tls11_enabled", "Protocols.Tls11"),
    ("frontend_ssl30_enabled", "Protocols.Ssl30"),
    ("triple_des_ciphers_enabled", "Ciphers.TripleDes168"),
    ("tls_ecdhe_ecdsa_with_aes256_cbc_sha_ciphers_enabled", "Ciphers.TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA"),
    ("tls_ecdhe_ecdsa_with_aes128_cbc_sha_ciphers_enabled", "Ciphers.TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA"),
    ("tls_ecdhe_rsa_with_aes256_cbc_sha_ciphers_enabled", "Ciphers.TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA"),
    ("tls_ecdhe_rsa_with_aes128_cbc_sha_ciphers_enabled", "Ciphers.TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA"),
    ("tls_rsa_with_aes128_gcm_sha256_ciphers_enabled", "Ciphers.TLS_RSA_WITH_AES_128_GCM_SHA256"),
    ("tls_rsa_with_aes256_gcm_sha384_ciphers_enabled", "Ciphers.TLS_RSA_WITH_AES_256_GCM_SHA384"),
    ("tls_rsa_with_aes256_cbc_sha256_ciphers_enabled", "Ciphers.TLS_RSA_WITH_AES_256_CBC_SHA256"),
    ("tls_rsa_with_aes128_cbc_sha256_ciphers_enabled", "Ciphers.TLS_RSA_WITH_AES_128_CBC_SHA256"),
    ("tls_rsa_with_aes256_cbc_sha_ciphers_enabled", "Ciphers.TLS_RSA_WITH_AES_256_CBC_SHA"),
    ("tls_rsa_with_aes128_cbc_sha_ciphers_enabled", "Ciphers.TLS_RSA_WITH_AES_128_CBC_SHA"),
];

/// The leading toggles are the only ones a Consumption service accepts
const CONSUMPTION_TOGGLES: usize = 5;

const POLICY_XML: &str = "xml";
const POLICY_XML_LINK: &str = "xml-link";

pub(crate) fn blocks() -> Vec<NestedBlock> {
    vec![
        identity_block(),
        hostname_block(),
        additional_location_block(),
        certificate_block(),
        security_block(),
        NestedBlockBuilder::single_list("protocols")
            .attribute(flag("http2_enabled"))
            .max_items(1)
            .build(),
        NestedBlockBuilder::single_list("sign_in")
            .description("Developer portal sign-in; not available on Consumption")
            .attribute(AttributeBuilder::new("enabled", AttributeType::Bool).required().build())
            .max_items(1)
            .build(),
        sign_up_block(),
        NestedBlockBuilder::single_list("policy")
            .description("Service-wide policy, inline or fetched from a link")
            .attribute(
                AttributeBuilder::new("xml_content", AttributeType::String)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("xml_link", AttributeType::String)
                    .optional()
                    .build(),
            )
            .max_items(1)
            .build(),
    ]
}

fn flag(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Bool)
        .optional()
        .default(StaticDefault::bool(false))
        .build()
}

fn computed_string(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .computed()
        .build()
}

fn secret(name: &str) -> AttributeBuilder {
    AttributeBuilder::new(name, AttributeType::String).sensitive()
}

fn identity_block() -> NestedBlock {
    NestedBlockBuilder::single_list("identity")
        .attribute(
            AttributeBuilder::new("type", AttributeType::String)
                .required()
                .validator(StringOneOfValidator::create(&IDENTITY_TYPES))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("identity_ids", AttributeType::set_of(AttributeType::String))
                .description("User-assigned identities; required when `type` includes UserAssigned")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("principal_id", AttributeType::String)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("tenant_id", AttributeType::String)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
        )
        .max_items(1)
        .build()
}

fn hostname_block() -> NestedBlock {
    let mut builder = NestedBlockBuilder::single_list("hostname_configuration")
        .description("Custom domains, grouped by endpoint")
        .max_items(1);
    for (name, _) in HOSTNAME_KINDS {
        let mut kind = NestedBlockBuilder::new(name, NestingMode::List)
            .attribute(
                AttributeBuilder::new("host_name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("key_vault_id", AttributeType::String)
                    .description("Key Vault secret holding the certificate")
                    .optional()
                    .build(),
            )
            .attribute(secret("certificate").optional().build())
            .attribute(secret("certificate_password").optional().build())
            .attribute(flag("negotiate_client_certificate"))
            .attribute(
                AttributeBuilder::new("ssl_keyvault_identity_client_id", AttributeType::String)
                    .optional()
                    .build(),
            );
        if name == "proxy" {
            kind = kind.attribute(
                AttributeBuilder::new("default_ssl_binding", AttributeType::Bool)
                    .optional()
                    .computed()
                    .build(),
            );
        }
        builder = builder.block(kind.build());
    }
    builder.build()
}

fn additional_location_block() -> NestedBlock {
    NestedBlockBuilder::new("additional_location", NestingMode::List)
        .description("Extra regions the gateway is deployed to; Premium only")
        .attribute(
            AttributeBuilder::new("location", AttributeType::String)
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("capacity", AttributeType::Number)
                .description("Scale units in this region, defaults to the service capacity")
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("zones", AttributeType::set_of(AttributeType::String))
                .optional()
                .build(),
        )
        .attribute(flag("gateway_disabled"))
        .attribute(computed_string("gateway_regional_url"))
        .attribute(
            AttributeBuilder::new("public_ip_addresses", AttributeType::list_of(AttributeType::String))
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("private_ip_addresses", AttributeType::list_of(AttributeType::String))
                .computed()
                .build(),
        )
        .block(
            NestedBlockBuilder::single_list("virtual_network_configuration")
                .attribute(
                    AttributeBuilder::new("subnet_id", AttributeType::String)
                        .required()
                        .build(),
                )
                .max_items(1)
                .build(),
        )
        .build()
}

fn certificate_block() -> NestedBlock {
    NestedBlockBuilder::new("certificate", NestingMode::List)
        .attribute(secret("encoded_certificate").required().build())
        .attribute(secret("certificate_password").optional().build())
        .attribute(
            AttributeBuilder::new("store_name", AttributeType::String)
                .required()
                .validator(StringOneOfValidator::create(&CERTIFICATE_STORES))
                .build(),
        )
        .attribute(computed_string("expiry"))
        .attribute(computed_string("subject"))
        .attribute(computed_string("thumbprint"))
        .max_items(10)
        .build()
}

fn security_block() -> NestedBlock {
    let mut builder = NestedBlockBuilder::single_list("security")
        .description("Gateway protocol and cipher toggles")
        .max_items(1);
    for (name, _) in SECURITY_TOGGLES {
        builder = builder.attribute(flag(name));
    }
    builder.build()
}

fn sign_up_block() -> NestedBlock {
    NestedBlockBuilder::single_list("sign_up")
        .description("Developer portal sign-up; not available on Consumption")
        .attribute(AttributeBuilder::new("enabled", AttributeType::Bool).required().build())
        .block(
            NestedBlockBuilder::single_list("terms_of_service")
                .attribute(AttributeBuilder::new("enabled", AttributeType::Bool).required().build())
                .attribute(
                    AttributeBuilder::new("consent_required", AttributeType::Bool)
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("text", AttributeType::String)
                        .optional()
                        .build(),
                )
                .min_items(1)
                .max_items(1)
                .build(),
        )
        .max_items(1)
        .build()
}

/// Cross-field checks of the settings blocks against the SKU tier
pub(crate) fn validate_settings(config: &DynamicValue, tier: Option<&str>) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];

    if let Some(identity) = config.get_block(&attr("identity")) {
        if let Some(kind) = identity.get_optional_string(&attr("type")) {
            let ids = identity.get(&attr("identity_ids"));
            let has_ids = ids.as_list().is_some_and(|ids| !ids.is_empty());
            let user_assigned = kind.contains("UserAssigned");
            if user_assigned && !has_ids && !ids.is_unknown() {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing identity_ids",
                        format!("`identity_ids` is required when `type` is `{}`", kind),
                    )
                    .with_attribute(attr("identity")),
                );
            }
            if !user_assigned && has_ids {
                diagnostics.push(
                    Diagnostic::error(
                        "Unexpected identity_ids",
                        format!("`identity_ids` can only be specified when `type` includes `UserAssigned`, got `{}`", kind),
                    )
                    .with_attribute(attr("identity")),
                );
            }
        }
    }

    if let Some(policy) = config.get_block(&attr("policy")) {
        let content = policy.get(&attr("xml_content"));
        let link = policy.get(&attr("xml_link"));
        if content.is_null() && link.is_null() {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid policy",
                    "Either `xml_content` or `xml_link` should be set if the `policy` block is defined.",
                )
                .with_attribute(attr("policy")),
            );
        } else if !content.is_null() && !link.is_null() {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid policy",
                    "Only one of `xml_content` or `xml_link` can be set in the `policy` block.",
                )
                .with_attribute(attr("policy")),
            );
        }
    }

    let top_level_vnet = config
        .get(&attr("virtual_network_configuration"))
        .as_list()
        .is_some_and(|b| !b.is_empty());
    for location in config.get_blocks(&attr("additional_location")) {
        let vnet = location.get(&attr("virtual_network_configuration"));
        if vnet.is_unknown() {
            continue;
        }
        let has_vnet = vnet.as_list().is_some_and(|b| !b.is_empty());
        let message = match (top_level_vnet, has_vnet) {
            (true, false) => "`virtual_network_configuration` must be specified in any `additional_location` block when top-level `virtual_network_configuration` is supplied",
            (false, true) => "`virtual_network_configuration` must be empty in all `additional_location` blocks when top-level `virtual_network_configuration` is not supplied",
            _ => continue,
        };
        diagnostics.push(
            Diagnostic::error("Invalid additional_location", message)
                .with_attribute(attr("additional_location")),
        );
    }
    for location in config.get_blocks(&attr("additional_location")) {
        if let Some(subnet) = location
            .get_block(&attr("virtual_network_configuration"))
            .and_then(|b| b.get_optional_string(&attr("subnet_id")))
        {
            if let Err(e) = SubnetId::parse(&subnet) {
                diagnostics.push(
                    Diagnostic::error("Invalid subnet_id", e.to_string())
                        .with_attribute(attr("additional_location")),
                );
            }
        }
    }

    if tier == Some("Consumption") {
        if let Some(security) = config.get_block(&attr("security")) {
            for (name, _) in &SECURITY_TOGGLES[CONSUMPTION_TOGGLES..] {
                if security.get_optional_bool(&attr(name)) == Some(true) {
                    diagnostics.push(
                        Diagnostic::error(
                            "Invalid security",
                            format!("`{}` is not supported for Sku Tier `Consumption`", name),
                        )
                        .with_attribute(attr("security")),
                    );
                }
            }
        }
        for block in ["sign_in", "sign_up"] {
            if config.get(&attr(block)).as_list().is_some_and(|b| !b.is_empty()) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid {}", block),
                        format!("`{}` is not supported for sku tier `Consumption`", block),
                    )
                    .with_attribute(attr(block)),
                );
            }
        }
    }

    diagnostics
}

/// No block means no managed identity
pub(crate) fn expand_identity(config: &DynamicValue) -> ServiceIdentity {
    let Some(identity) = config.get_block(&attr("identity")) else {
        return ServiceIdentity {
            identity_type: IDENTITY_NONE.to_string(),
            ..Default::default()
        };
    };

    let ids = identity.get_string_list(&attr("identity_ids"));
    ServiceIdentity {
        identity_type: identity
            .get_optional_string(&attr("type"))
            .unwrap_or_else(|| IDENTITY_NONE.to_string()),
        user_assigned_identities: (!ids.is_empty()).then(|| {
            ids.into_iter()
                .map(|id| (id, UserAssignedIdentity::default()))
                .collect()
        }),
        ..Default::default()
    }
}

pub(crate) fn flatten_identity(identity: Option<&ServiceIdentity>) -> Option<HashMap<String, Dynamic>> {
    let identity = identity.filter(|i| !i.identity_type.eq_ignore_ascii_case(IDENTITY_NONE))?;

    let mut ids: Vec<&String> = identity
        .user_assigned_identities
        .iter()
        .flat_map(HashMap::keys)
        .collect();
    ids.sort();
    let identity_ids = if ids.is_empty() {
        Dynamic::Null
    } else {
        Dynamic::List(ids.into_iter().map(|id| Dynamic::String(id.clone())).collect())
    };

    Some(block_fields([
        ("type", identity.identity_type.clone().into()),
        ("identity_ids", identity_ids),
        ("principal_id", identity.principal_id.clone().into()),
        ("tenant_id", identity.tenant_id.clone().into()),
    ]))
}

/// The full set of protocol, cipher and HTTP/2 custom properties
///
/// Consumption services only accept the leading protocol toggles. HTTP/2 is
/// only sent when the `protocols` block is present.
pub(crate) fn expand_custom_properties(config: &DynamicValue, consumption: bool) -> HashMap<String, String> {
    let security = config.get_block(&attr("security"));
    let toggles = if consumption {
        &SECURITY_TOGGLES[..CONSUMPTION_TOGGLES]
    } else {
        &SECURITY_TOGGLES[..]
    };

    let mut properties: HashMap<String, String> = toggles
        .iter()
        .map(|(name, suffix)| {
            let enabled = security
                .as_ref()
                .and_then(|s| s.get_optional_bool(&attr(name)))
                .unwrap_or(false);
            (format!("{}{}", SECURITY_PREFIX, suffix), enabled.to_string())
        })
        .collect();

    if let Some(protocols) = config.get_block(&attr("protocols")) {
        let http2 = protocols
            .get_optional_bool(&attr("http2_enabled"))
            .unwrap_or(false);
        properties.insert(HTTP2_PROPERTY.to_string(), http2.to_string());
    }

    properties
}

/// Missing or unparseable values read as disabled
fn property_enabled(properties: &HashMap<String, String>, key: &str) -> bool {
    properties
        .get(key)
        .and_then(|v| v.to_ascii_lowercase().parse::<bool>().ok())
        .unwrap_or(false)
}

pub(crate) fn flatten_security(properties: &HashMap<String, String>) -> HashMap<String, Dynamic> {
    SECURITY_TOGGLES
        .iter()
        .map(|(name, suffix)| {
            let key = format!("{}{}", SECURITY_PREFIX, suffix);
            (name.to_string(), Dynamic::Bool(property_enabled(properties, &key)))
        })
        .collect()
}

pub(crate) fn flatten_protocols(properties: &HashMap<String, String>) -> HashMap<String, Dynamic> {
    block_fields([(
        "http2_enabled",
        property_enabled(properties, HTTP2_PROPERTY).into(),
    )])
}

pub(crate) fn expand_hostnames(config: &DynamicValue) -> Vec<HostnameConfiguration> {
    let Some(hostnames) = config.get_block(&attr("hostname_configuration")) else {
        return vec![];
    };

    let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
    let mut expanded = vec![];
    for (name, kind) in HOSTNAME_KINDS {
        for entry in hostnames.get_blocks(&attr(name)) {
            expanded.push(HostnameConfiguration {
                hostname_type: kind.to_string(),
                host_name: entry
                    .get_optional_string(&attr("host_name"))
                    .unwrap_or_default(),
                key_vault_id: non_empty(entry.get_optional_string(&attr("key_vault_id"))),
                encoded_certificate: non_empty(entry.get_optional_string(&attr("certificate"))),
                certificate_password: non_empty(
                    entry.get_optional_string(&attr("certificate_password")),
                ),
                negotiate_client_certificate: entry
                    .get_optional_bool(&attr("negotiate_client_certificate")),
                default_ssl_binding: if name == "proxy" {
                    entry.get_optional_bool(&attr("default_ssl_binding"))
                } else {
                    None
                },
                identity_client_id: non_empty(
                    entry.get_optional_string(&attr("ssl_keyvault_identity_client_id")),
                ),
                certificate_source: None,
            });
        }
    }
    expanded
}

/// Custom hostnames grouped by kind; the built-in `*.azure-api.net` names are skipped
pub(crate) fn flatten_hostnames(
    remote: &[HostnameConfiguration],
    prior: Option<&DynamicValue>,
) -> Option<HashMap<String, Dynamic>> {
    let custom: Vec<&HostnameConfiguration> = remote
        .iter()
        .filter(|h| {
            !h.certificate_source
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case("BuiltIn"))
        })
        .collect();
    if custom.is_empty() {
        return None;
    }

    let mut grouped = HashMap::new();
    for (name, kind) in HOSTNAME_KINDS {
        let prior_entries = prior
            .map(|p| p.get_blocks(&attr(name)))
            .unwrap_or_default();
        let entries = custom
            .iter()
            .filter(|h| h.hostname_type.eq_ignore_ascii_case(kind))
            .map(|h| {
                let prior_entry = prior_entries.iter().find(|p| {
                    p.get_optional_string(&attr("host_name"))
                        .is_some_and(|host| host.eq_ignore_ascii_case(&h.host_name))
                });
                let kept = |field: &str| -> Dynamic {
                    prior_entry
                        .and_then(|p| p.get_optional_string(&attr(field)))
                        .into()
                };
                let mut fields = block_fields([
                    ("host_name", h.host_name.clone().into()),
                    ("key_vault_id", h.key_vault_id.clone().into()),
                    ("certificate", kept("certificate")),
                    ("certificate_password", kept("certificate_password")),
                    (
                        "negotiate_client_certificate",
                        h.negotiate_client_certificate.unwrap_or(false).into(),
                    ),
                    (
                        "ssl_keyvault_identity_client_id",
                        h.identity_client_id.clone().into(),
                    ),
                ]);
                if name == "proxy" {
                    fields.insert(
                        "default_ssl_binding".to_string(),
                        h.default_ssl_binding.unwrap_or(false).into(),
                    );
                }
                Dynamic::Map(fields)
            })
            .collect();
        grouped.insert(name.to_string(), Dynamic::List(entries));
    }
    Some(grouped)
}

/// Regions beyond the primary one, scaled like the primary unless overridden
pub(crate) fn expand_additional_locations(config: &DynamicValue, sku: &ServiceSku) -> Vec<AdditionalLocation> {
    config
        .get_blocks(&attr("additional_location"))
        .into_iter()
        .map(|location| {
            let zones = location.get_string_list(&attr("zones"));
            let capacity = location
                .get_optional_i64(&attr("capacity"))
                .filter(|c| *c > 0)
                .unwrap_or(sku.capacity);
            AdditionalLocation {
                location: location
                    .get_optional_string(&attr("location"))
                    .map(|l| normalize_location(&l))
                    .unwrap_or_default(),
                sku: ServiceSku {
                    name: sku.name.clone(),
                    capacity,
                },
                zones: (!zones.is_empty()).then_some(zones),
                virtual_network_configuration: location
                    .get_block(&attr("virtual_network_configuration"))
                    .and_then(|b| b.get_optional_string(&attr("subnet_id")))
                    .map(|subnet_resource_id| VirtualNetworkConfiguration { subnet_resource_id }),
                disable_gateway: location.get_optional_bool(&attr("gateway_disabled")),
                ..Default::default()
            }
        })
        .collect()
}

pub(crate) fn flatten_additional_locations(
    remote: &[AdditionalLocation],
    prior: &[DynamicValue],
) -> Vec<HashMap<String, Dynamic>> {
    remote
        .iter()
        .enumerate()
        .map(|(i, location)| {
            let prior = prior.get(i);
            let prior_location = prior.and_then(|p| p.get_optional_string(&attr("location")));
            let prior_subnet = prior
                .and_then(|p| p.get_block(&attr("virtual_network_configuration")))
                .and_then(|b| b.get_optional_string(&attr("subnet_id")));
            let vnet: Vec<Dynamic> = location
                .virtual_network_configuration
                .as_ref()
                .and_then(|v| id_for_state(prior_subnet, Some(v.subnet_resource_id.clone())))
                .map(|subnet| Dynamic::Map(block_fields([("subnet_id", subnet.into())])))
                .into_iter()
                .collect();
            let strings = |values: &[String]| -> Dynamic {
                Dynamic::List(values.iter().cloned().map(Dynamic::String).collect())
            };

            block_fields([
                (
                    "location",
                    location_for_state(prior_location, Some(location.location.clone())).into(),
                ),
                ("capacity", location.sku.capacity.into()),
                (
                    "zones",
                    location
                        .zones
                        .as_deref()
                        .filter(|z| !z.is_empty())
                        .map(strings)
                        .unwrap_or(Dynamic::Null),
                ),
                (
                    "gateway_disabled",
                    location.disable_gateway.unwrap_or(false).into(),
                ),
                ("gateway_regional_url", location.gateway_regional_url.clone().into()),
                ("public_ip_addresses", strings(&location.public_ip_addresses)),
                ("private_ip_addresses", strings(&location.private_ip_addresses)),
                ("virtual_network_configuration", Dynamic::List(vnet)),
            ])
        })
        .collect()
}

pub(crate) fn expand_certificates(config: &DynamicValue) -> Vec<CertificateConfiguration> {
    config
        .get_blocks(&attr("certificate"))
        .into_iter()
        .map(|certificate| CertificateConfiguration {
            encoded_certificate: certificate.get_optional_string(&attr("encoded_certificate")),
            certificate_password: certificate
                .get_optional_string(&attr("certificate_password"))
                .filter(|p| !p.is_empty()),
            store_name: certificate
                .get_optional_string(&attr("store_name"))
                .unwrap_or_default(),
            certificate: None,
        })
        .collect()
}

/// The service never returns the uploaded certificate, so it comes from the prior state
pub(crate) fn flatten_certificates(
    remote: &[CertificateConfiguration],
    prior: &[DynamicValue],
) -> Vec<HashMap<String, Dynamic>> {
    remote
        .iter()
        .enumerate()
        .map(|(i, certificate)| {
            let kept = |field: &str| -> Dynamic {
                prior
                    .get(i)
                    .and_then(|p| p.get_optional_string(&attr(field)))
                    .into()
            };
            let info = certificate.certificate.as_ref();
            block_fields([
                ("encoded_certificate", kept("encoded_certificate")),
                ("certificate_password", kept("certificate_password")),
                ("store_name", certificate.store_name.clone().into()),
                ("expiry", info.map(|c| c.expiry.clone()).into()),
                ("subject", info.map(|c| c.subject.clone()).into()),
                ("thumbprint", info.map(|c| c.thumbprint.clone()).into()),
            ])
        })
        .collect()
}

/// Without a block sign-in is disabled
pub(crate) fn expand_sign_in(config: &DynamicValue) -> PortalSigninSettings {
    PortalSigninSettings {
        properties: PortalSigninProperties {
            enabled: config
                .get_block(&attr("sign_in"))
                .and_then(|b| b.get_optional_bool(&attr("enabled")))
                .unwrap_or(false),
        },
    }
}

pub(crate) fn flatten_sign_in(settings: &PortalSigninSettings) -> HashMap<String, Dynamic> {
    block_fields([("enabled", settings.properties.enabled.into())])
}

pub(crate) fn expand_sign_up(config: &DynamicValue) -> PortalSignupSettings {
    let Some(sign_up) = config.get_block(&attr("sign_up")) else {
        return PortalSignupSettings::default();
    };
    let terms = sign_up.get_block(&attr("terms_of_service"));
    let terms_flag = |name: &str| {
        terms
            .as_ref()
            .and_then(|t| t.get_optional_bool(&attr(name)))
            .unwrap_or(false)
    };

    PortalSignupSettings {
        properties: PortalSignupProperties {
            enabled: sign_up.get_optional_bool(&attr("enabled")).unwrap_or(false),
            terms_of_service: TermsOfService {
                enabled: terms_flag("enabled"),
                consent_required: terms_flag("consent_required"),
                text: terms
                    .as_ref()
                    .and_then(|t| t.get_optional_string(&attr("text")))
                    .filter(|t| !t.is_empty()),
            },
        },
    }
}

pub(crate) fn flatten_sign_up(settings: &PortalSignupSettings) -> HashMap<String, Dynamic> {
    let terms = &settings.properties.terms_of_service;
    block_fields([
        ("enabled", settings.properties.enabled.into()),
        (
            "terms_of_service",
            Dynamic::List(vec![Dynamic::Map(block_fields([
                ("enabled", terms.enabled.into()),
                ("consent_required", terms.consent_required.into()),
                ("text", terms.text.clone().into()),
            ]))]),
        ),
    ])
}

/// Sign-in and sign-up blocks only matter once configured or enabled remotely
pub(crate) fn all_disabled(fields: &HashMap<String, Dynamic>) -> bool {
    fields.values().all(|value| match value {
        Dynamic::Bool(enabled) => !enabled,
        Dynamic::Null => true,
        Dynamic::List(items) => items.iter().all(|item| match item {
            Dynamic::Map(inner) => all_disabled(inner),
            _ => false,
        }),
        _ => false,
    })
}

/// A link wins over inline content, matching how the state keeps both
pub(crate) fn expand_policy(value: &DynamicValue) -> Option<Policy> {
    let policy = value.get_block(&attr("policy"))?;
    let non_empty = |name: &str| {
        policy
            .get_optional_string(&attr(name))
            .filter(|v| !v.is_empty())
    };

    let (format, value) = match (non_empty("xml_link"), non_empty("xml_content")) {
        (Some(link), _) => (POLICY_XML_LINK, link),
        (None, Some(content)) => (POLICY_XML, content),
        (None, None) => return None,
    };
    Some(Policy {
        properties: PolicyProperties {
            format: format.to_string(),
            value,
        },
    })
}

/// The service always answers with the resolved XML; the link is kept from state
pub(crate) fn flatten_policy(
    remote: Option<&Policy>,
    prior: Option<&DynamicValue>,
) -> Option<HashMap<String, Dynamic>> {
    let remote = remote.filter(|p| !p.properties.value.is_empty())?;
    let prior_content = prior.and_then(|p| p.get_optional_string(&attr("xml_content")));
    let content = match prior_content {
        Some(prior) if same_xml(&prior, &remote.properties.value) => prior,
        _ => remote.properties.value.clone(),
    };

    Some(block_fields([
        ("xml_content", content.into()),
        (
            "xml_link",
            prior
                .and_then(|p| p.get_optional_string(&attr("xml_link")))
                .into(),
        ),
    ]))
}

/// The service re-indents stored XML
fn same_xml(a: &str, b: &str) -> bool {
    let compact = |s: &str| s.split_whitespace().collect::<String>();
    compact(a) == compact(b)
}
