use std::sync::Arc;

use bastion_pdp::{
    EnvironmentData, EvaluationRequest, InMemoryPolicyStore, PdpConfig, Policy,
    PolicyDecisionPoint, StaticAttributeResolver, UnknownOperatorBehavior,
};
use serde_json::json;
use time::macros::datetime;

fn engine(policies: serde_json::Value, attributes: serde_json::Value) -> PolicyDecisionPoint {
    let policies = Policy::list_from_json(&policies.to_string()).unwrap();
    let resolver = StaticAttributeResolver::from_json(&attributes.to_string()).unwrap();
    PolicyDecisionPoint::with_defaults(
        Arc::new(InMemoryPolicyStore::with_policies(policies)),
        Arc::new(resolver),
    )
}

fn guarded(operator: &str, payload: serde_json::Value) -> serde_json::Value {
    json!({
        "Id": format!("{operator}-policy"),
        "Statement": {
            "Sid": "guarded",
            "Effect": "Allow",
            "Action": "*",
            "Resource": "*",
            "Condition": { operator: payload }
        }
    })
}

fn request_at(timestamp: time::OffsetDateTime) -> EvaluationRequest {
    EvaluationRequest::new("user-123", "api:documents:42", "document-service:file:read")
        .with_timestamp(timestamp)
}

#[tokio::test]
async fn document_with_attributes_end_to_end() {
    let policies = json!([
        {
            "Id": "engineering-docs",
            "Name": "Engineers read documents in business hours",
            "Version": "2024-01-01",
            "Statement": [
                {
                    "Sid": "read-docs",
                    "Effect": "Allow",
                    "Action": ["document-service:file:read", "document-service:file:list"],
                    "Resource": "api:documents:*",
                    "Condition": {
                        "StringEquals": { "user:Department": "engineering" },
                        "IsBusinessHours": { "request:Time": true },
                        "ArrayContains": { "user:Roles": "reader" }
                    }
                },
                {
                    "Sid": "no-external",
                    "Effect": "Deny",
                    "Action": "*",
                    "Resource": "*",
                    "Condition": {
                        "IsInternalIp": { "environment:client_ip": false }
                    }
                }
            ]
        }
    ]);
    let attributes = json!({
        "subjects": {
            "user-123": { "Department": "engineering", "Roles": ["reader", "writer"] },
            "user-456": { "Department": "sales", "Roles": ["reader"] }
        }
    });
    let pdp = engine(policies, attributes);
    let tuesday_afternoon = datetime!(2024-03-12 14:00 UTC);

    // 1. Internal engineer during business hours
    let request = request_at(tuesday_afternoon)
        .with_environment(EnvironmentData::default().with_client_ip("10.1.2.3"));
    let decision = pdp.evaluate(&request).await.unwrap();
    assert!(decision.is_permit(), "{}", decision.reason);
    assert_eq!(decision.matched_policies, vec!["engineering-docs"]);
    assert_eq!(decision.matched_statements[0].statement_id, "read-docs");

    // 2. Same request from outside
    let request = request_at(tuesday_afternoon)
        .with_environment(EnvironmentData::default().with_client_ip("203.0.113.9"));
    let decision = pdp.evaluate(&request).await.unwrap();
    assert!(decision.is_deny());
    assert!(decision.reason.contains("no-external"), "{}", decision.reason);

    // 3. Wrong department
    let request = EvaluationRequest::new("user-456", "api:documents:42", "document-service:file:read")
        .with_timestamp(tuesday_afternoon);
    assert!(pdp.evaluate(&request).await.unwrap().is_deny());

    // 4. After hours
    let request = request_at(datetime!(2024-03-12 20:00 UTC));
    assert!(pdp.evaluate(&request).await.unwrap().is_deny());
}

#[tokio::test]
async fn string_like_and_numeric_between() {
    let pdp = engine(
        json!([
            guarded("StringLike", json!({ "user:Email": "%@company.com" })),
        ]),
        json!({
            "subjects": {
                "user-123": { "Email": "alice@company.com" },
                "user-456": { "Email": "bob@company.com.evil.org" }
            }
        }),
    );
    let at = datetime!(2024-03-12 14:00 UTC);

    let ok = request_at(at);
    assert!(pdp.evaluate(&ok).await.unwrap().is_permit());

    let spoofed = EvaluationRequest::new("user-456", "r", "a").with_timestamp(at);
    assert!(pdp.evaluate(&spoofed).await.unwrap().is_deny());

    let pdp = engine(
        json!([guarded("NumericBetween", json!({ "amount": [10, 20] }))]),
        json!({}),
    );
    for (amount, permitted) in [(9.99, false), (10.0, true), (15.0, true), (20.0, true), (20.01, false)] {
        let request = request_at(at).with_context("amount", amount);
        assert_eq!(
            pdp.evaluate(&request).await.unwrap().is_permit(),
            permitted,
            "amount {amount}"
        );
    }
}

#[tokio::test]
async fn date_between_is_inclusive() {
    let pdp = engine(
        json!([guarded(
            "DateBetween",
            json!({ "request:Time": ["2024-03-01T00:00:00Z", "2024-03-31T23:59:59Z"] })
        )]),
        json!({}),
    );

    for (timestamp, permitted) in [
        (datetime!(2024-03-01 00:00 UTC), true),
        (datetime!(2024-03-31 23:59:59 UTC), true),
        (datetime!(2024-04-01 00:00 UTC), false),
        (datetime!(2024-02-29 23:59:59 UTC), false),
    ] {
        let decision = pdp.evaluate(&request_at(timestamp)).await.unwrap();
        assert_eq!(decision.is_permit(), permitted, "{timestamp}");
    }
}

#[tokio::test]
async fn array_size_operator_map() {
    let pdp = engine(
        json!([guarded("ArraySize", json!({ "tags": { "gt": 5 } }))]),
        json!({}),
    );
    let at = datetime!(2024-03-12 14:00 UTC);

    let six = request_at(at).with_context("tags", json!(["a", "b", "c", "d", "e", "f"]));
    assert!(pdp.evaluate(&six).await.unwrap().is_permit());

    let five = request_at(at).with_context("tags", json!(["a", "b", "c", "d", "e"]));
    assert!(pdp.evaluate(&five).await.unwrap().is_deny());
}

#[tokio::test]
async fn logical_composition_in_documents() {
    let pdp = engine(
        json!([guarded(
            "Or",
            json!([
                { "StringEquals": { "user:Role": "admin" } },
                {
                    "And": [
                        { "StringEquals": { "user:Role": "editor" } },
                        { "Not": { "Bool": { "resource:locked": true } } }
                    ]
                }
            ])
        )]),
        json!({
            "subjects": {
                "admin-1": { "Role": "admin" },
                "editor-1": { "Role": "editor" }
            },
            "resources": {
                "doc-open": { "locked": false },
                "doc-locked": { "locked": true }
            }
        }),
    );

    for (subject, resource, permitted) in [
        ("admin-1", "doc-locked", true),
        ("editor-1", "doc-open", true),
        ("editor-1", "doc-locked", false),
        ("viewer-1", "doc-open", false),
    ] {
        let request = EvaluationRequest::new(subject, resource, "doc:edit");
        assert_eq!(
            pdp.evaluate(&request).await.unwrap().is_permit(),
            permitted,
            "{subject} on {resource}"
        );
    }
}

#[tokio::test]
async fn disabled_policy_is_skipped() {
    let pdp = engine(
        json!([
            {
                "Id": "retired-deny",
                "Enabled": false,
                "Statement": { "Effect": "Deny", "Action": "*", "Resource": "*" }
            },
            {
                "Id": "open",
                "Statement": { "Effect": "Allow", "Action": "*", "Resource": "*" }
            }
        ]),
        json!({}),
    );
    let decision = pdp
        .evaluate(&EvaluationRequest::new("u", "r", "a"))
        .await
        .unwrap();
    assert!(decision.is_permit());
    assert_eq!(decision.matched_policies, vec!["open"]);
}

#[tokio::test]
async fn unknown_operator_follows_config() {
    let policies = Policy::list_from_json(
        &json!([guarded("StringSoundsLike", json!({ "user:Name": "alice" }))]).to_string(),
    )
    .unwrap();
    let request = EvaluationRequest::new("u", "r", "a");

    // 1. Default config fails closed
    let pdp = PolicyDecisionPoint::with_defaults(
        Arc::new(InMemoryPolicyStore::with_policies(policies.clone())),
        Arc::new(StaticAttributeResolver::new()),
    );
    assert!(pdp.evaluate(&request).await.unwrap().is_deny());

    // 2. Opt-in fail open
    let config = PdpConfig {
        unknown_operator: UnknownOperatorBehavior::Allow,
        ..PdpConfig::default()
    };
    let pdp = PolicyDecisionPoint::new(
        Arc::new(InMemoryPolicyStore::with_policies(policies)),
        Arc::new(StaticAttributeResolver::new()),
        config,
    )
    .unwrap();
    assert!(pdp.evaluate(&request).await.unwrap().is_permit());
}

#[tokio::test]
async fn config_file_drives_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bastion.toml");

    // 1. Night shift business hours and a custom internal network
    std::fs::write(
        &path,
        r#"
max_evaluation_time = "250ms"
internal_networks = ["198.51.100.0/24"]

[business_hours]
start_hour = 20
end_hour = 23
days = ["Saturday", "Sunday"]
"#,
    )
    .unwrap();

    // 2. Load and build
    let config = PdpConfig::from_file(&path).unwrap();
    assert_eq!(config.max_evaluation_time.as_millis(), 250);

    let policies = Policy::list_from_json(
        &json!([{
            "Id": "night-shift",
            "Statement": {
                "Effect": "Allow",
                "Action": "*",
                "Resource": "*",
                "Condition": {
                    "IsBusinessHours": { "request:Time": true },
                    "Bool": { "environment:is_internal_ip": true }
                }
            }
        }])
        .to_string(),
    )
    .unwrap();
    let pdp = PolicyDecisionPoint::new(
        Arc::new(InMemoryPolicyStore::with_policies(policies)),
        Arc::new(StaticAttributeResolver::new()),
        config,
    )
    .unwrap();

    // 3. Saturday 21:00 from the configured network
    let env = EnvironmentData::default().with_client_ip("198.51.100.7");
    let request = EvaluationRequest::new("u", "r", "a")
        .with_timestamp(datetime!(2024-03-16 21:00 UTC))
        .with_environment(env.clone());
    assert!(pdp.evaluate(&request).await.unwrap().is_permit());

    // 4. Tuesday afternoon is outside these hours
    let request = EvaluationRequest::new("u", "r", "a")
        .with_timestamp(datetime!(2024-03-12 14:00 UTC))
        .with_environment(env);
    assert!(pdp.evaluate(&request).await.unwrap().is_deny());

    // 5. RFC1918 is no longer internal
    let request = EvaluationRequest::new("u", "r", "a")
        .with_timestamp(datetime!(2024-03-16 21:00 UTC))
        .with_environment(EnvironmentData::default().with_client_ip("10.0.0.1"));
    assert!(pdp.evaluate(&request).await.unwrap().is_deny());
}

#[tokio::test]
async fn invalid_request_is_a_validation_error() {
    let pdp = engine(json!([]), json!({}));
    let err = pdp
        .evaluate(&EvaluationRequest::new("  ", "r", "a"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
