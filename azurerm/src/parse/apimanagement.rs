//! API Management resource IDs

use super::{resource_id_conversions, ParseError, ResourceId, ResourceIdParser};

const PROVIDER: &str = "Microsoft.ApiManagement";
const REVISION_SEPARATOR: &str = ";rev=";

fn parse_service_prefix(parser: &mut ResourceIdParser<'_>) -> Result<ApiManagementId, ParseError> {
    let subscription_id = parser.value("subscriptions")?;
    let resource_group = parser.value("resourceGroups")?;
    parser.provider(PROVIDER)?;
    let name = parser.value("service")?;
    Ok(ApiManagementId {
        subscription_id,
        resource_group,
        name,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiManagementId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl ApiManagementId {
    pub fn new(subscription_id: &str, resource_group: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let id = parse_service_prefix(&mut parser)?;
        parser.finish()?;
        Ok(id)
    }
}

impl ResourceId for ApiManagementId {
    fn id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/service/{}",
            self.subscription_id, self.resource_group, PROVIDER, self.name
        )
    }
}

/// A soft-deleted service, addressed by location rather than resource group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedServiceId {
    pub subscription_id: String,
    pub location: String,
    pub name: String,
}

impl DeletedServiceId {
    pub fn new(subscription_id: &str, location: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            location: location.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let subscription_id = parser.value("subscriptions")?;
        parser.provider(PROVIDER)?;
        let location = parser.value("locations")?;
        let name = parser.value("deletedservices")?;
        parser.finish()?;
        Ok(Self {
            subscription_id,
            location,
            name,
        })
    }
}

impl ResourceId for DeletedServiceId {
    fn id(&self) -> String {
        format!(
            "/subscriptions/{}/providers/{}/locations/{}/deletedservices/{}",
            self.subscription_id, PROVIDER, self.location, self.name
        )
    }
}

/// An API within a service; `name` may carry a `;rev=N` suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiId {
    pub subscription_id: String,
    pub resource_group: String,
    pub service_name: String,
    pub name: String,
}

impl ApiId {
    pub fn new(subscription_id: &str, resource_group: &str, service_name: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            service_name: service_name.to_string(),
            name: name.to_string(),
        }
    }

    /// ID of a specific revision, `name;rev=revision`
    pub fn with_revision(
        subscription_id: &str,
        resource_group: &str,
        service_name: &str,
        api_name: &str,
        revision: &str,
    ) -> Self {
        Self::new(
            subscription_id,
            resource_group,
            service_name,
            &format!("{}{}{}", api_name, REVISION_SEPARATOR, revision),
        )
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let service = parse_service_prefix(&mut parser)?;
        let name = parser.value("apis")?;
        parser.finish()?;
        Ok(Self {
            subscription_id: service.subscription_id,
            resource_group: service.resource_group,
            service_name: service.name,
            name,
        })
    }

    /// API name without any revision suffix
    pub fn api_name(&self) -> &str {
        match self.name.split_once(REVISION_SEPARATOR) {
            Some((name, _)) => name,
            None => &self.name,
        }
    }

    pub fn revision(&self) -> Option<&str> {
        self.name
            .split_once(REVISION_SEPARATOR)
            .map(|(_, rev)| rev)
            .filter(|rev| !rev.is_empty())
    }

    pub fn service_id(&self) -> ApiManagementId {
        ApiManagementId::new(&self.subscription_id, &self.resource_group, &self.service_name)
    }
}

impl ResourceId for ApiId {
    fn id(&self) -> String {
        format!("{}/apis/{}", self.service_id().id(), self.name)
    }
}

macro_rules! service_child_id {
    ($(#[$meta:meta])* $ty:ident, $segment:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $ty {
            pub subscription_id: String,
            pub resource_group: String,
            pub service_name: String,
            pub name: String,
        }

        impl $ty {
            pub fn new(subscription_id: &str, resource_group: &str, service_name: &str, name: &str) -> Self {
                Self {
                    subscription_id: subscription_id.to_string(),
                    resource_group: resource_group.to_string(),
                    service_name: service_name.to_string(),
                    name: name.to_string(),
                }
            }

            pub fn parse(input: &str) -> Result<Self, ParseError> {
                let mut parser = ResourceIdParser::new(input)?;
                let service = parse_service_prefix(&mut parser)?;
                let name = parser.value($segment)?;
                parser.finish()?;
                Ok(Self {
                    subscription_id: service.subscription_id,
                    resource_group: service.resource_group,
                    service_name: service.name,
                    name,
                })
            }

            pub fn service_id(&self) -> ApiManagementId {
                ApiManagementId::new(&self.subscription_id, &self.resource_group, &self.service_name)
            }
        }

        impl ResourceId for $ty {
            fn id(&self) -> String {
                format!("{}/{}/{}", self.service_id().id(), $segment, self.name)
            }
        }
    };
}

service_child_id!(ApiVersionSetId, "apiVersionSets");
service_child_id!(NamedValueId, "namedValues");
service_child_id!(BackendId, "backends");
service_child_id!(ProductId, "products");

resource_id_conversions!(
    ApiManagementId,
    DeletedServiceId,
    ApiId,
    ApiVersionSetId,
    NamedValueId,
    BackendId,
    ProductId,
);

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE: &str =
        "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.ApiManagement/service/service1";

    #[test]
    fn service_id_round_trips() {
        let id = ApiManagementId::parse(SERVICE).unwrap();
        assert_eq!(id.name, "service1");
        assert_eq!(id.id(), SERVICE);
    }

    #[test]
    fn service_id_rejects_bad_input() {
        let cases = [
            "",
            "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.ApiManagement/",
            "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.ApiManagement/service/",
            "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.ApiManagement/Service/service1",
            "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.ApiManagement/service/service1/apis/api1",
        ];
        for case in cases {
            assert!(ApiManagementId::parse(case).is_err(), "expected error for {:?}", case);
        }
    }

    #[test]
    fn deleted_service_id_round_trips() {
        let input = "/subscriptions/sub/providers/Microsoft.ApiManagement/locations/westeurope/deletedservices/service1";
        let id = DeletedServiceId::parse(input).unwrap();
        assert_eq!(id, DeletedServiceId::new("sub", "westeurope", "service1"));
        assert_eq!(id.id(), input);
    }

    #[test]
    fn api_id_exposes_name_and_revision() {
        let id = ApiId::with_revision("sub", "rg", "service1", "echo", "3");
        assert_eq!(id.name, "echo;rev=3");
        assert_eq!(id.api_name(), "echo");
        assert_eq!(id.revision(), Some("3"));

        let parsed = ApiId::parse(&id.id()).unwrap();
        assert_eq!(parsed, id);

        let bare = ApiId::new("sub", "rg", "service1", "echo");
        assert_eq!(bare.api_name(), "echo");
        assert_eq!(bare.revision(), None);
    }

    #[test]
    fn child_ids_use_camel_case_segments() {
        let id = ApiVersionSetId::parse(&format!("{}/apiVersionSets/set1", SERVICE)).unwrap();
        assert_eq!(id.name, "set1");
        assert!(ApiVersionSetId::parse(&format!("{}/api-version-set/set1", SERVICE)).is_err());

        let id = NamedValueId::parse(&format!("{}/namedValues/nv1", SERVICE)).unwrap();
        assert_eq!(id.to_string(), format!("{}/namedValues/nv1", SERVICE));
        assert!(NamedValueId::parse(&format!("{}/properties/nv1", SERVICE)).is_err());

        let id: BackendId = format!("{}/backends/b1", SERVICE).parse().unwrap();
        assert_eq!(id.service_id().id(), SERVICE);

        let id = ProductId::new("12345678-1234-9876-4563-123456789012", "resGroup1", "service1", "starter");
        assert_eq!(id.id(), format!("{}/products/starter", SERVICE));
    }

    #[test]
    fn product_id_round_trips() {
        let input = format!("{}/products/starter", SERVICE);
        let id = ProductId::parse(&input).unwrap();
        assert_eq!(id.service_name, "service1");
        assert_eq!(id.name, "starter");
        assert_eq!(id.to_string(), input);
        assert_eq!(ProductId::parse(&id.id()).unwrap(), id);

        assert_eq!(
            ProductId::parse(&format!("{}/products/", SERVICE)),
            Err(ParseError::EmptySegment("products".to_string()))
        );
        assert_eq!(
            ProductId::parse(&format!("{}/Products/starter", SERVICE)),
            Err(ParseError::MissingSegment("products".to_string()))
        );
        assert!(ProductId::parse(&format!("{}/products/starter/apis/echo", SERVICE)).is_err());
    }
}
