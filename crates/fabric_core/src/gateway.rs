//! Event gateway: the trust boundary in front of the orchestrator.
//!
//! Every inbound event is filtered, checked against the trust policy and
//! normalized here. Anything that gets past [`EventGateway::accept`] carries
//! validated identifiers and a resolved gateway role.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use fabric_net::{
    AccountId, AttachmentId, GatewayRole, GatewayTopology, SubnetId, TransitGatewayId, VpcId,
};

use crate::config::{EventConfig, FabricConfig};
use crate::trust::TrustPolicy;

const ATTACHMENT_PATH: [&str; 3] = [
    "responseElements",
    "CreateTransitGatewayVpcAttachmentResponse",
    "transitGatewayVpcAttachment",
];

/// Why an event was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Not an event this fabric acts on.
    NotRelevant,
    /// Raised by an account outside every trusted principal.
    NotTrusted,
    /// Required fields are missing or malformed.
    SchemaError,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NotRelevant => "not_relevant",
            RejectReason::NotTrusted => "not_trusted",
            RejectReason::SchemaError => "schema_error",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: RejectReason,
    pub detail: String,
}

impl Rejection {
    fn new(reason: RejectReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    fn schema(detail: impl Into<String>) -> Self {
        Self::new(RejectReason::SchemaError, detail)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.detail)
    }
}

/// A validated request to wire one attachment into its gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTrigger {
    pub attachment_id: AttachmentId,
    pub vpc_id: VpcId,
    pub transit_gateway_id: TransitGatewayId,
    pub target: GatewayRole,
    pub subnet_ids: Vec<SubnetId>,
    pub account_id: AccountId,
    pub received_at: DateTime<Utc>,
}

/// Filters, authenticates and normalizes inbound events.
#[derive(Debug, Clone)]
pub struct EventGateway {
    events: EventConfig,
    trust: TrustPolicy,
    topology: GatewayTopology,
}

impl EventGateway {
    pub fn new(events: EventConfig, trust: TrustPolicy, topology: GatewayTopology) -> Self {
        Self {
            events,
            trust,
            topology,
        }
    }

    pub fn from_config(config: &FabricConfig) -> Self {
        Self::new(
            config.events.clone(),
            config.trust.clone(),
            config.topology.clone(),
        )
    }

    /// Parse raw event text and run it through [`accept`](Self::accept).
    pub fn accept_str(&self, raw: &str) -> Result<NormalizedTrigger, Rejection> {
        let event: Value = serde_json::from_str(raw)
            .map_err(|e| Rejection::schema(format!("event is not valid JSON: {}", e)))?;
        self.accept(&event)
    }

    pub fn accept(&self, event: &Value) -> Result<NormalizedTrigger, Rejection> {
        let result = self.evaluate(event);
        match &result {
            Ok(trigger) => info!(
                "Accepted attachment {} on {} gateway from account {}",
                trigger.attachment_id, trigger.target, trigger.account_id
            ),
            Err(rejection) => match rejection.reason {
                RejectReason::NotRelevant => debug!("Filtered event: {}", rejection.detail),
                RejectReason::NotTrusted => {
                    warn!(target: "security", "Rejected untrusted event: {}", rejection.detail)
                }
                RejectReason::SchemaError => warn!("Malformed event: {}", rejection.detail),
            },
        }
        result
    }

    fn evaluate(&self, event: &Value) -> Result<NormalizedTrigger, Rejection> {
        let source = required_str(event, "source")?;
        let detail = event
            .get("detail")
            .filter(|d| d.is_object())
            .ok_or_else(|| Rejection::schema("missing detail object"))?;
        let event_name = required_str(detail, "eventName")?;
        let detail_type = event
            .get("detail-type")
            .and_then(Value::as_str)
            .unwrap_or("");

        if source != self.events.source
            || detail_type != self.events.detail_type
            || event_name != self.events.event_name
        {
            return Err(Rejection::new(
                RejectReason::NotRelevant,
                format!("{} / {} / {}", source, detail_type, event_name),
            ));
        }
        if let Some(code) = detail.get("errorCode").and_then(Value::as_str) {
            return Err(Rejection::new(
                RejectReason::NotRelevant,
                format!("API call failed with {}", code),
            ));
        }

        let account = AccountId::parse(required_str(event, "account")?)
            .map_err(|e| Rejection::schema(e.to_string()))?;
        if !self.trust.is_trusted(&account) {
            return Err(Rejection::new(
                RejectReason::NotTrusted,
                format!("account {} is not in a trusted principal", account),
            ));
        }

        let attachment = ATTACHMENT_PATH
            .iter()
            .try_fold(detail, |value, key| value.get(*key))
            .ok_or_else(|| Rejection::schema("missing transitGatewayVpcAttachment"))?;

        let attachment_id = parse_field(attachment, "transitGatewayAttachmentId", AttachmentId::parse)?;
        let vpc_id = parse_field(attachment, "vpcId", VpcId::parse)?;
        let transit_gateway_id =
            parse_field(attachment, "transitGatewayId", TransitGatewayId::parse)?;
        let subnet_ids = subnet_ids(attachment)?;

        let target = self.topology.role_of(&transit_gateway_id).ok_or_else(|| {
            Rejection::new(
                RejectReason::NotRelevant,
                format!("gateway {} is not part of this fabric", transit_gateway_id),
            )
        })?;

        Ok(NormalizedTrigger {
            attachment_id,
            vpc_id,
            transit_gateway_id,
            target,
            subnet_ids,
            account_id: account,
            received_at: Utc::now(),
        })
    }
}

fn required_str<'a>(value: &'a Value, key: &str) -> Result<&'a str, Rejection> {
    value
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Rejection::schema(format!("{} must be a string", key)))
}

fn parse_field<T, E: fmt::Display>(
    value: &Value,
    key: &str,
    parse: impl FnOnce(String) -> Result<T, E>,
) -> Result<T, Rejection> {
    let raw = required_str(value, key)?;
    parse(raw.to_string()).map_err(|e| Rejection::schema(format!("{}: {}", key, e)))
}

/// Subnet ids arrive either as a plain list or wrapped in an `item` field.
fn subnet_ids(attachment: &Value) -> Result<Vec<SubnetId>, Rejection> {
    let raw = match attachment.get("subnetIds") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(wrapper)) => wrapper.get("item").cloned().unwrap_or(Value::Null),
        Some(other) => other.clone(),
    };

    let items = match raw {
        Value::Array(items) => items,
        Value::String(_) => vec![raw],
        Value::Null => Vec::new(),
        _ => return Err(Rejection::schema("subnetIds must be a list of strings")),
    };

    items
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| Rejection::schema("subnetIds must be a list of strings"))
                .and_then(|s| SubnetId::parse(s).map_err(|e| Rejection::schema(e.to_string())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::{AccountMembership, TrustedPrincipal};
    use fabric_net::TransitGateway;
    use serde_json::json;

    fn gateway() -> EventGateway {
        let trust = TrustPolicy::new()
            .trust(TrustedPrincipal::parse("o-a1b2c3d4e5").unwrap())
            .with_account(
                AccountId::parse("111111111111").unwrap(),
                AccountMembership::new("o-a1b2c3d4e5"),
            );
        let topology = GatewayTopology::new()
            .with_main(TransitGateway::new(TransitGatewayId::parse("tgw-0main").unwrap()))
            .with_migrate(TransitGateway::new(TransitGatewayId::parse("tgw-0migrate").unwrap()));
        EventGateway::new(EventConfig::default(), trust, topology)
    }

    fn event(account: &str, tgw: &str) -> Value {
        json!({
            "source": "aws.ec2",
            "detail-type": "AWS API Call via CloudTrail",
            "account": account,
            "detail": {
                "eventName": "CreateTransitGatewayVpcAttachment",
                "responseElements": {
                    "CreateTransitGatewayVpcAttachmentResponse": {
                        "transitGatewayVpcAttachment": {
                            "transitGatewayAttachmentId": "tgw-attach-0abc",
                            "vpcId": "vpc-0app",
                            "transitGatewayId": tgw,
                            "subnetIds": { "item": ["subnet-0a", "subnet-0b"] }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_accepts_trusted_event() {
        let trigger = gateway().accept(&event("111111111111", "tgw-0migrate")).unwrap();
        assert_eq!(trigger.attachment_id.as_str(), "tgw-attach-0abc");
        assert_eq!(trigger.vpc_id.as_str(), "vpc-0app");
        assert_eq!(trigger.target, GatewayRole::Migrate);
        assert_eq!(trigger.subnet_ids.len(), 2);
    }

    #[test]
    fn test_filters_other_events() {
        let mut other = event("111111111111", "tgw-0main");
        other["detail"]["eventName"] = json!("DeleteTransitGatewayVpcAttachment");
        let rejection = gateway().accept(&other).unwrap_err();
        assert_eq!(rejection.reason, RejectReason::NotRelevant);

        let mut wrong_case = event("111111111111", "tgw-0main");
        wrong_case["source"] = json!("AWS.EC2");
        assert_eq!(
            gateway().accept(&wrong_case).unwrap_err().reason,
            RejectReason::NotRelevant
        );
    }

    #[test]
    fn test_requires_cloudtrail_detail_type() {
        let mut console = event("111111111111", "tgw-0main");
        console["detail-type"] = json!("AWS Console Action via CloudTrail");
        assert_eq!(
            gateway().accept(&console).unwrap_err().reason,
            RejectReason::NotRelevant
        );

        let mut untyped = event("111111111111", "tgw-0main");
        untyped.as_object_mut().unwrap().remove("detail-type");
        assert_eq!(
            gateway().accept(&untyped).unwrap_err().reason,
            RejectReason::NotRelevant
        );
    }

    #[test]
    fn test_failed_api_call_is_not_relevant() {
        let mut failed = event("111111111111", "tgw-0main");
        failed["detail"]["errorCode"] = json!("Client.UnauthorizedOperation");
        assert_eq!(
            gateway().accept(&failed).unwrap_err().reason,
            RejectReason::NotRelevant
        );
    }

    #[test]
    fn test_rejects_untrusted_account() {
        let rejection = gateway().accept(&event("999999999999", "tgw-0main")).unwrap_err();
        assert_eq!(rejection.reason, RejectReason::NotTrusted);
    }

    #[test]
    fn test_schema_errors() {
        let mut no_name = event("111111111111", "tgw-0main");
        no_name["detail"]["eventName"] = json!(42);
        assert_eq!(gateway().accept(&no_name).unwrap_err().reason, RejectReason::SchemaError);

        let mut bad_vpc = event("111111111111", "tgw-0main");
        bad_vpc["detail"]["responseElements"]["CreateTransitGatewayVpcAttachmentResponse"]
            ["transitGatewayVpcAttachment"]["vpcId"] = json!("subnet-0x");
        assert_eq!(gateway().accept(&bad_vpc).unwrap_err().reason, RejectReason::SchemaError);

        let mut no_payload = event("111111111111", "tgw-0main");
        no_payload["detail"]["responseElements"] = json!({});
        assert_eq!(
            gateway().accept(&no_payload).unwrap_err().reason,
            RejectReason::SchemaError
        );

        assert_eq!(
            gateway().accept_str("{not json").unwrap_err().reason,
            RejectReason::SchemaError
        );
    }

    #[test]
    fn test_unknown_gateway_is_not_relevant() {
        let rejection = gateway().accept(&event("111111111111", "tgw-0elsewhere")).unwrap_err();
        assert_eq!(rejection.reason, RejectReason::NotRelevant);
    }
}
