use super::{resource_id_conversions, ParseError, ResourceId, ResourceIdParser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetId {
    pub subscription_id: String,
    pub resource_group: String,
    pub virtual_network_name: String,
    pub name: String,
}

impl SubnetId {
    pub fn new(
        subscription_id: &str,
        resource_group: &str,
        virtual_network_name: &str,
        name: &str,
    ) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            virtual_network_name: virtual_network_name.to_string(),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parser = ResourceIdParser::new(input)?;
        let subscription_id = parser.value("subscriptions")?;
        let resource_group = parser.value("resourceGroups")?;
        parser.provider("Microsoft.Network")?;
        let virtual_network_name = parser.value("virtualNetworks")?;
        let name = parser.value("subnets")?;
        parser.finish()?;
        Ok(Self {
            subscription_id,
            resource_group,
            virtual_network_name,
            name,
        })
    }
}

impl ResourceId for SubnetId {
    fn id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/virtualNetworks/{}/subnets/{}",
            self.subscription_id, self.resource_group, self.virtual_network_name, self.name
        )
    }
}

resource_id_conversions!(SubnetId);
