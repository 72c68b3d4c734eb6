//! Opaque resource identifiers.
//!
//! Identifiers are validated on construction so that a malformed id coming
//! from an event payload or a config file is rejected at the edge instead of
//! reaching a network call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{NetError, NetResult};

fn valid_suffix(suffix: &str) -> bool {
    !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_alphanumeric())
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Parse and validate an identifier.
            pub fn parse(value: impl Into<String>) -> NetResult<Self> {
                let value = value.into();
                match value.strip_prefix($prefix) {
                    Some(suffix) if valid_suffix(suffix) => Ok(Self(value)),
                    _ => Err(NetError::InvalidIdentifier {
                        kind: $kind,
                        value,
                    }),
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = NetError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = NetError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

prefixed_id!(
    /// Transit gateway VPC attachment id (`tgw-attach-…`).
    AttachmentId,
    "tgw-attach-",
    "attachment id"
);

prefixed_id!(
    /// Transit gateway route table id (`tgw-rtb-…`).
    RouteTableId,
    "tgw-rtb-",
    "route table id"
);

prefixed_id!(
    /// Transit gateway id (`tgw-…`).
    TransitGatewayId,
    "tgw-",
    "transit gateway id"
);

prefixed_id!(VpcId, "vpc-", "VPC id");

prefixed_id!(SubnetId, "subnet-", "subnet id");

/// Twelve-digit cloud account id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn parse(value: impl Into<String>) -> NetResult<Self> {
        let value = value.into();
        if value.len() == 12 && value.chars().all(|c| c.is_ascii_digit()) {
            Ok(Self(value))
        } else {
            Err(NetError::InvalidIdentifier {
                kind: "account id",
                value,
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = NetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}
