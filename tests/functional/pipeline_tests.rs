//! Transport and envelope behaviour of the review pipeline.

use std::sync::Arc;

use admission_gate::{ReviewRouter, WebhookState};
use axum::body::Body;
use axum::http::{Request, StatusCode, header};

use crate::common::fixtures::{ReviewBuilder, labelled_pod_review};
use crate::{
    RecordingCodec, app_with_state, body_text, default_app, json_request, send, send_review,
};

#[tokio::test]
async fn test_empty_body_is_400() {
    let response = send(default_app(), json_request("/validate", Vec::new())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "empty body");
}

#[tokio::test]
async fn test_empty_body_without_headers_is_400() {
    let request = Request::post("/validate").body(Body::empty()).unwrap();
    let response = send(default_app(), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_content_type_never_decodes() {
    let codec = Arc::new(RecordingCodec::default());
    let app = app_with_state(WebhookState::new(ReviewRouter::default()).with_codec(codec.clone()));

    for content_type in [
        "text/plain",
        "application/yaml",
        "application/json; charset=utf-8",
    ] {
        let request = Request::post("/validate")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(labelled_pod_review("web").body()))
            .unwrap();
        let response = send(app.clone(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{content_type}");
        assert!(body_text(response).await.contains("expect application/json"));
    }

    // No Content-Type header at all
    let request = Request::post("/validate")
        .body(Body::from(labelled_pod_review("web").body()))
        .unwrap();
    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(codec.decode_calls(), 0);
    assert_eq!(codec.encode_calls(), 0);
}

#[tokio::test]
async fn test_decodes_the_body_that_was_read() {
    let codec = Arc::new(RecordingCodec::default());
    let state = WebhookState::new(ReviewRouter::default()).with_codec(codec.clone());
    let body = labelled_pod_review("web").uid("read-back").body();

    let review = send_review(app_with_state(state), json_request("/validate", body.clone())).await;

    assert_eq!(codec.decoded(), vec![body]);
    assert_eq!(codec.encode_calls(), 1);
    assert_eq!(review["response"]["uid"], "read-back");
}

#[tokio::test]
async fn test_malformed_review_answers_200_with_message() {
    let review = send_review(
        default_app(),
        json_request("/validate", b"{\"request\": [1, 2".to_vec()),
    )
    .await;

    let response = &review["response"];
    assert_eq!(response["allowed"], false);
    assert_eq!(response["uid"], "");
    assert!(!response["status"]["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_pod_answers_with_message_and_uid() {
    let body = ReviewBuilder::pod("broken")
        .uid("malformed-pod")
        .raw_object(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "broken"},
            "spec": {"containers": {"name": "not-a-list"}}
        }))
        .body();

    let review = send_review(default_app(), json_request("/validate", body)).await;
    let response = &review["response"];
    assert_eq!(response["uid"], "malformed-pod");
    assert_eq!(response["allowed"], false);
    assert!(!response["status"]["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_pod_metadata_keeps_uid() {
    let objects = [
        serde_json::json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "p", "labels": 5}}),
        serde_json::json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "p", "labels": {"k": 1}}}),
        serde_json::json!("str"),
    ];

    for (i, object) in objects.into_iter().enumerate() {
        let uid = format!("bad-metadata-{i}");
        let body = ReviewBuilder::pod("p").uid(&uid).raw_object(object).body();

        let review = send_review(default_app(), json_request("/validate", body)).await;
        let response = &review["response"];
        assert_eq!(response["uid"], uid.as_str());
        assert_eq!(response["allowed"], false);
        assert_eq!(response["status"]["reason"], "DeserializationError");
        assert!(
            response["status"]["message"]
                .as_str()
                .unwrap()
                .starts_with("invalid type")
        );
        assert_eq!(review["apiVersion"], "admission.k8s.io/v1");
    }
}

#[tokio::test]
async fn test_review_without_request_has_no_uid() {
    let body = serde_json::to_vec(&serde_json::json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview"
    }))
    .unwrap();

    let review = send_review(default_app(), json_request("/validate", body)).await;
    assert_eq!(review["response"]["uid"], "");
    assert_eq!(review["response"]["allowed"], false);
}

#[tokio::test]
async fn test_uid_round_trips_on_every_endpoint() {
    for (path, uid) in [
        ("/validate", "uid-validate"),
        ("/mutate", "uid-mutate"),
        ("/other", "uid-other"),
    ] {
        let body = ReviewBuilder::pod("web").uid(uid).body();
        let review = send_review(default_app(), json_request(path, body)).await;
        assert_eq!(review["response"]["uid"], uid, "{path}");
    }
}

#[tokio::test]
async fn test_response_envelope_shape() {
    let review = send_review(
        default_app(),
        json_request("/validate", labelled_pod_review("web").body()),
    )
    .await;

    assert_eq!(review["apiVersion"], "admission.k8s.io/v1");
    assert_eq!(review["kind"], "AdmissionReview");
    assert!(review.get("request").is_none());
    assert_eq!(review["response"]["allowed"], true);
    assert!(review["response"]["status"].get("message").is_none());
}

#[tokio::test]
async fn test_mutate_admits_without_patch() {
    let review = send_review(
        default_app(),
        json_request("/mutate", ReviewBuilder::pod("web").body()),
    )
    .await;

    assert_eq!(review["response"]["allowed"], true);
    assert!(review["response"].get("patch").is_none());
}

#[tokio::test]
async fn test_unknown_endpoint_denied() {
    let review = send_review(
        default_app(),
        json_request("/admit", labelled_pod_review("web").body()),
    )
    .await;

    assert_eq!(review["response"]["allowed"], false);
    assert_eq!(
        review["response"]["status"]["message"],
        "unknown endpoint: /admit"
    );
}

#[tokio::test]
async fn test_get_on_validate_not_allowed() {
    let request = Request::get("/validate").body(Body::empty()).unwrap();
    let response = send(default_app(), request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
