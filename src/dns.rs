//! DNS record update for peer discovery

use tracing::info;

use crate::BootstrapError;
use crate::cloud::{DnsApi, RecordChange};

/// Comment attached to every change batch
pub const CHANGE_COMMENT: &str = "updating etcd record for a new node";

/// Point `domain` at `target` in hosted zone `zone_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecordRequest {
    pub domain: String,
    pub zone_id: String,
    pub target: String,
    pub ttl: i64,
}

impl DnsRecordRequest {
    /// The single UPSERT of an A record this request translates to
    pub fn to_change(&self) -> RecordChange {
        RecordChange {
            zone_id: self.zone_id.clone(),
            name: self.domain.clone(),
            record_type: "A".to_string(),
            value: self.target.clone(),
            ttl: self.ttl,
            comment: CHANGE_COMMENT.to_string(),
        }
    }
}

/// Upsert the A record described by `request`
///
/// Incomplete requests fail before anything reaches the DNS API. Acceptance of
/// the change is success; propagation is not awaited.
pub async fn ensure_dns_record(
    api: &dyn DnsApi,
    request: &DnsRecordRequest,
) -> Result<(), BootstrapError> {
    info!(
        "Updating DNS record {} to point to {} (zone: {})",
        request.domain, request.target, request.zone_id
    );

    if request.domain.is_empty() || request.target.is_empty() || request.zone_id.is_empty() {
        return Err(BootstrapError::DnsIncompleteArguments {
            domain: request.domain.clone(),
            target: request.target.clone(),
            zone_id: request.zone_id.clone(),
        });
    }

    api.submit_change(&request.to_change()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::mock::MockDns;

    fn request(target: &str) -> DnsRecordRequest {
        DnsRecordRequest {
            domain: "node1.etcd.example.com".to_string(),
            zone_id: "Z123".to_string(),
            target: target.to_string(),
            ttl: 60,
        }
    }

    #[tokio::test]
    async fn test_upsert_a_record() {
        let api = MockDns::new();
        ensure_dns_record(&api, &request("10.0.1.5")).await.unwrap();

        let changes = api.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0],
            RecordChange {
                zone_id: "Z123".to_string(),
                name: "node1.etcd.example.com".to_string(),
                record_type: "A".to_string(),
                value: "10.0.1.5".to_string(),
                ttl: 60,
                comment: CHANGE_COMMENT.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_second_update_is_another_upsert() {
        let api = MockDns::new();
        ensure_dns_record(&api, &request("10.0.1.5")).await.unwrap();
        ensure_dns_record(&api, &request("10.0.2.7")).await.unwrap();

        let changes = api.changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].name, changes[1].name);
        assert_eq!(changes[1].value, "10.0.2.7");
    }

    #[tokio::test]
    async fn test_incomplete_arguments_skip_api() {
        let api = MockDns::new();

        let cases = [
            DnsRecordRequest {
                domain: String::new(),
                ..request("10.0.1.5")
            },
            DnsRecordRequest {
                zone_id: String::new(),
                ..request("10.0.1.5")
            },
            request(""),
        ];

        for case in &cases {
            let result = ensure_dns_record(&api, case).await;
            assert!(matches!(result, Err(BootstrapError::DnsIncompleteArguments { .. })));
        }
        assert!(api.changes().is_empty());
    }

    #[tokio::test]
    async fn test_api_failure_is_reported() {
        let api = MockDns::new().with_error("InvalidChangeBatch");
        let result = ensure_dns_record(&api, &request("10.0.1.5")).await;
        assert!(matches!(result, Err(BootstrapError::Dns(_))));
    }
}
