//! Trust boundary for inbound events.
//!
//! Only accounts that belong to a trusted organization, or sit under a
//! trusted organizational unit, may trigger route table changes. Membership
//! comes from a static directory in the configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use fabric_net::AccountId;

use crate::error::{CoreError, CoreResult};

const ORGANIZATION_PATTERN: &str = r"^o-[a-z0-9]{10,32}$";
const UNIT_PATTERN: &str = r"^ou-[a-z0-9]{4,32}-[a-z0-9]{8,32}$";

fn matches(pattern: &str, value: &str) -> CoreResult<bool> {
    let re = Regex::new(pattern).map_err(|e| CoreError::InvalidPrincipal(e.to_string()))?;
    Ok(re.is_match(value))
}

/// An organization or organizational unit allowed to trigger the fabric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TrustedPrincipal {
    Organization(String),
    OrganizationalUnit(String),
}

impl TrustedPrincipal {
    pub fn parse(value: &str) -> CoreResult<Self> {
        let value = value.trim();
        if matches(ORGANIZATION_PATTERN, value)? {
            Ok(Self::Organization(value.to_string()))
        } else if matches(UNIT_PATTERN, value)? {
            Ok(Self::OrganizationalUnit(value.to_string()))
        } else {
            Err(CoreError::InvalidPrincipal(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Organization(id) | Self::OrganizationalUnit(id) => id,
        }
    }
}

impl fmt::Display for TrustedPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustedPrincipal {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TrustedPrincipal {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TrustedPrincipal> for String {
    fn from(principal: TrustedPrincipal) -> Self {
        match principal {
            TrustedPrincipal::Organization(id) | TrustedPrincipal::OrganizationalUnit(id) => id,
        }
    }
}

/// Where an account sits in the organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMembership {
    pub organization: String,
    /// Every unit on the path from the root down to the account.
    #[serde(default)]
    pub units: Vec<String>,
}

impl AccountMembership {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            units: Vec::new(),
        }
    }

    pub fn in_unit(mut self, unit: impl Into<String>) -> Self {
        self.units.push(unit.into());
        self
    }
}

/// Trusted principals plus the account membership directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustPolicy {
    #[serde(default)]
    pub principals: Vec<TrustedPrincipal>,
    #[serde(default)]
    pub accounts: BTreeMap<AccountId, AccountMembership>,
}

impl TrustPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trust(mut self, principal: TrustedPrincipal) -> Self {
        self.principals.push(principal);
        self
    }

    pub fn with_account(mut self, account: AccountId, membership: AccountMembership) -> Self {
        self.accounts.insert(account, membership);
        self
    }

    /// The principal that vouches for `account`, if any.
    ///
    /// Accounts missing from the directory are never trusted.
    pub fn trusting_principal(&self, account: &AccountId) -> Option<&TrustedPrincipal> {
        let membership = self.accounts.get(account)?;
        self.principals.iter().find(|principal| match principal {
            TrustedPrincipal::Organization(id) => *id == membership.organization,
            TrustedPrincipal::OrganizationalUnit(id) => membership.units.contains(id),
        })
    }

    pub fn is_trusted(&self, account: &AccountId) -> bool {
        self.trusting_principal(account).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORG: &str = "o-a1b2c3d4e5";
    const UNIT: &str = "ou-ab12-cd34ef56";

    fn account(id: &str) -> AccountId {
        AccountId::parse(id).unwrap()
    }

    #[test]
    fn test_parse_principals() {
        assert_eq!(
            TrustedPrincipal::parse(ORG).unwrap(),
            TrustedPrincipal::Organization(ORG.to_string())
        );
        assert_eq!(
            TrustedPrincipal::parse(UNIT).unwrap(),
            TrustedPrincipal::OrganizationalUnit(UNIT.to_string())
        );
        assert!(TrustedPrincipal::parse("o-short").is_err());
        assert!(TrustedPrincipal::parse("O-A1B2C3D4E5").is_err());
        assert!(TrustedPrincipal::parse("ou-ab12").is_err());
        assert!(TrustedPrincipal::parse("").is_err());
    }

    #[test]
    fn test_organization_trust() {
        let policy = TrustPolicy::new()
            .trust(TrustedPrincipal::parse(ORG).unwrap())
            .with_account(account("111111111111"), AccountMembership::new(ORG))
            .with_account(account("222222222222"), AccountMembership::new("o-zzzzzzzzzz"));

        assert!(policy.is_trusted(&account("111111111111")));
        assert!(!policy.is_trusted(&account("222222222222")));
        assert!(!policy.is_trusted(&account("333333333333")));
    }

    #[test]
    fn test_unit_trust_covers_nested_accounts() {
        let policy = TrustPolicy::new()
            .trust(TrustedPrincipal::parse(UNIT).unwrap())
            .with_account(
                account("111111111111"),
                AccountMembership::new("o-zzzzzzzzzz")
                    .in_unit(UNIT)
                    .in_unit("ou-ab12-nested01"),
            )
            .with_account(
                account("222222222222"),
                AccountMembership::new("o-zzzzzzzzzz").in_unit("ou-ab12-elsewhere"),
            );

        assert_eq!(
            policy.trusting_principal(&account("111111111111")).map(|p| p.as_str()),
            Some(UNIT)
        );
        assert!(!policy.is_trusted(&account("222222222222")));
    }

    #[test]
    fn test_policy_from_yaml() {
        let yaml = r#"
principals: [o-a1b2c3d4e5]
accounts:
  "111111111111":
    organization: o-a1b2c3d4e5
"#;
        let policy: TrustPolicy = serde_yaml::from_str(yaml).unwrap();
        assert!(policy.is_trusted(&account("111111111111")));

        let invalid = "principals: [not-a-principal]";
        assert!(serde_yaml::from_str::<TrustPolicy>(invalid).is_err());
    }
}
