//! Azure Resource Manager resource ID parsing
//!
//! IDs are slash-delimited paths of alternating segment names and values,
//! e.g. `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.ServiceBus/namespaces/{ns}`.
//! Parsing is strict: segment names must match exactly (case-sensitive), every
//! value must be non-empty and nothing may follow the last expected segment.

pub mod apimanagement;
pub mod network;
pub mod servicebus;

pub use apimanagement::{
    ApiId, ApiManagementId, ApiVersionSetId, BackendId, DeletedServiceId, NamedValueId, ProductId,
};
pub use network::SubnetId;
pub use servicebus::{
    NamespaceAuthorizationRuleId, NamespaceDisasterRecoveryConfigId, NamespaceId,
    NamespaceNetworkRuleSetId, QueueAuthorizationRuleId, QueueId, SubscriptionId,
    SubscriptionRuleId, TopicAuthorizationRuleId, TopicId,
};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("ID was empty")]
    Empty,

    #[error("ID {0:?} must start with a slash")]
    MissingLeadingSlash(String),

    #[error("ID {0:?} has an odd number of segments")]
    OddSegments(String),

    #[error("ID was missing the `{0}` element")]
    MissingSegment(String),

    #[error("ID has an empty value for `{0}`")]
    EmptySegment(String),

    #[error("ID has unexpected trailing segment `{0}`")]
    UnexpectedSegment(String),

    #[error("ID was for provider {actual:?}, expected {expected:?}")]
    WrongProvider { expected: String, actual: String },
}

/// Common behaviour of every typed resource ID
pub trait ResourceId {
    /// Canonical ARM path
    fn id(&self) -> String;
}

/// Walks the key/value pairs of an ARM ID in order
pub struct ResourceIdParser<'a> {
    pairs: Vec<(&'a str, &'a str)>,
    position: usize,
}

impl<'a> ResourceIdParser<'a> {
    pub fn new(input: &'a str) -> Result<Self, ParseError> {
        if input.is_empty() {
            return Err(ParseError::Empty);
        }
        let Some(trimmed) = input.strip_prefix('/') else {
            return Err(ParseError::MissingLeadingSlash(input.to_string()));
        };

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.len() % 2 != 0 {
            return Err(ParseError::OddSegments(input.to_string()));
        }

        let pairs = segments
            .chunks(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();

        Ok(Self { pairs, position: 0 })
    }

    /// Consume the next pair, which must be named `key` and carry a value
    pub fn value(&mut self, key: &str) -> Result<String, ParseError> {
        match self.pairs.get(self.position) {
            Some((k, v)) if *k == key => {
                self.position += 1;
                if v.is_empty() {
                    Err(ParseError::EmptySegment(key.to_string()))
                } else {
                    Ok((*v).to_string())
                }
            }
            _ => Err(ParseError::MissingSegment(key.to_string())),
        }
    }

    /// Consume `providers/{namespace}`
    pub fn provider(&mut self, namespace: &str) -> Result<(), ParseError> {
        let actual = self.value("providers")?;
        if actual != namespace {
            return Err(ParseError::WrongProvider {
                expected: namespace.to_string(),
                actual,
            });
        }
        Ok(())
    }

    /// Consume a pair whose value is fixed, such as `networkRuleSets/default`
    pub fn literal(&mut self, key: &str, value: &str) -> Result<(), ParseError> {
        let actual = self.value(key)?;
        if actual != value {
            return Err(ParseError::UnexpectedSegment(format!("{}/{}", key, actual)));
        }
        Ok(())
    }

    /// Fail if any segments remain
    pub fn finish(self) -> Result<(), ParseError> {
        match self.pairs.get(self.position) {
            Some((k, v)) => Err(ParseError::UnexpectedSegment(format!("{}/{}", k, v))),
            None => Ok(()),
        }
    }
}

/// Implements `Display` and `FromStr` in terms of `ResourceId::id` and `parse`
macro_rules! resource_id_conversions {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&$crate::parse::ResourceId::id(self))
                }
            }

            impl std::str::FromStr for $ty {
                type Err = $crate::parse::ParseError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    <$ty>::parse(s)
                }
            }
        )+
    };
}

pub(crate) use resource_id_conversions;
