// Test code is allowed to panic on failure
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

//! Unit tests for admission-gate.
//!
//! These tests run without a cluster or a TLS listener and exercise the
//! public API of individual components in isolation.

mod config_tests {
    use admission_gate::config::{DEFAULT_EXEMPT_ANNOTATION, NAME_LABEL, PROJECT_LABEL};
    use admission_gate::{Config, KindPolicy, PolicyConfig};
    use clap::Parser;

    #[test]
    fn test_default_policy() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.exempt_annotation, DEFAULT_EXEMPT_ANNOTATION);
        assert!(policy.required_labels.contains(PROJECT_LABEL));
        assert!(policy.required_labels.contains(NAME_LABEL));
        assert!(policy.ignored_namespaces.is_empty());
        assert_eq!(policy.unsupported_kinds, KindPolicy::Allow);
    }

    #[test]
    fn test_flags_build_policy() {
        let config = Config::try_parse_from([
            "admission-gate",
            "--exempt-annotation",
            "example.com/enforce",
            "--ignored-namespace",
            "kube-system,kube-public",
            "--unsupported-kinds",
            "deny",
        ])
        .unwrap();

        let policy = config.policy().unwrap();
        assert_eq!(policy.exempt_annotation, "example.com/enforce");
        assert!(policy.is_ignored_namespace(Some("kube-public")));
        assert_eq!(policy.unsupported_kinds, KindPolicy::Deny);
    }

    #[test]
    fn test_kind_policy_display() {
        assert_eq!(KindPolicy::Allow.to_string(), "allow");
        assert_eq!(KindPolicy::Deny.to_string(), "deny");
    }
}

mod policy_tests {
    use std::collections::BTreeMap;

    use admission_gate::PolicyConfig;
    use admission_gate::webhooks::policies::{ValidationContext, exemption, validate_all};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn meta(labels: &[&str], annotation: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            labels: Some(
                labels
                    .iter()
                    .map(|k| (k.to_string(), "v".to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            annotations: annotation.map(|value| {
                BTreeMap::from([(
                    "admission-policy/validate".to_string(),
                    value.to_string(),
                )])
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_exempt_bypasses_labels() {
        let config = PolicyConfig::default();
        let meta = meta(&[], Some("False"));
        let ctx = ValidationContext::new(&meta, &config);
        assert!(exemption::is_exempt(&ctx));
        assert!(validate_all(&ctx).allowed);
    }

    #[test]
    fn test_empty_annotation_value_enforces() {
        let config = PolicyConfig::default();
        let meta = meta(&["project-label"], Some(""));
        assert!(!validate_all(&ValidationContext::new(&meta, &config)).allowed);
    }

    #[test]
    fn test_labels_decide_when_not_exempt() {
        let config = PolicyConfig::default();
        let meta = meta(&["project-label", "name-label"], None);
        assert!(validate_all(&ValidationContext::new(&meta, &config)).allowed);
    }
}

mod router_tests {
    use admission_gate::Endpoint;
    use admission_gate::webhooks::router::{MUTATE_PATH, VALIDATE_PATH};

    #[test]
    fn test_known_paths() {
        assert_eq!(Endpoint::from_path(MUTATE_PATH), Endpoint::Mutate);
        assert_eq!(Endpoint::from_path(VALIDATE_PATH), Endpoint::Validate);
    }

    #[test]
    fn test_paths_are_exact() {
        assert!(matches!(Endpoint::from_path("/validate/"), Endpoint::Unknown(_)));
        assert!(matches!(Endpoint::from_path("/VALIDATE"), Endpoint::Unknown(_)));
        assert_eq!(Endpoint::Validate.to_string(), "validate");
    }
}

mod error_tests {
    use admission_gate::ReviewError;
    use axum::http::StatusCode;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ReviewError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ReviewError::Encode("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
