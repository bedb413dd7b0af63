//! AdmissionReview wire codec.
//!
//! [`ReviewCodec`] is the injected serialization capability; [`JsonCodec`] is the
//! production implementation. [`decode_review`] enforces the transport
//! preconditions before the codec ever sees the body.
//!
//! A review whose envelope is valid but whose `object`/`oldObject` is not is
//! reported as [`ReviewError::Object`], so the answer can still carry the UID.

use kube::core::DynamicObject;
use kube::core::admission::AdmissionReview;

use crate::error::ReviewError;

/// The only content type the API server sends reviews with
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Review envelope exchanged with the API server
pub type Review = AdmissionReview<DynamicObject>;

/// Converts review envelopes to and from wire bytes
pub trait ReviewCodec: Send + Sync {
    /// Decode a request body
    fn decode(&self, body: &[u8]) -> Result<Review, ReviewError>;

    /// Encode a response envelope
    fn encode(&self, review: &Review) -> Result<Vec<u8>, ReviewError>;
}

/// JSON codec backed by serde_json
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl ReviewCodec for JsonCodec {
    fn decode(&self, body: &[u8]) -> Result<Review, ReviewError> {
        serde_json::from_slice(body).map_err(|e| {
            let message = e.to_string();
            undecodable_object(body, &message)
                .unwrap_or(ReviewError::Deserialization(message))
        })
    }

    fn encode(&self, review: &Review) -> Result<Vec<u8>, ReviewError> {
        serde_json::to_vec(review).map_err(|e| ReviewError::Encode(e.to_string()))
    }
}

/// Retry a failed decode with the embedded objects removed.
///
/// Returns [`ReviewError::Object`] when the rest of the envelope decodes, and
/// `None` when the envelope itself is broken.
fn undecodable_object(body: &[u8], message: &str) -> Option<ReviewError> {
    let mut value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let request = value.get_mut("request")?.as_object_mut()?;

    let mut stripped = false;
    for field in ["object", "oldObject"] {
        if let Some(object) = request.get_mut(field) {
            if !object.is_null() {
                *object = serde_json::Value::Null;
                stripped = true;
            }
        }
    }
    if !stripped {
        return None;
    }

    let review: Review = serde_json::from_value(value).ok()?;
    let request = review.request?;
    Some(ReviewError::Object {
        uid: request.uid,
        api_version: review.types.api_version,
        message: message.to_string(),
    })
}

/// Check transport preconditions, then decode exactly the bytes that were read.
///
/// An empty body or a content type other than `application/json` is a
/// [`ReviewError::BadRequest`] and the codec is not invoked.
pub fn decode_review(
    codec: &dyn ReviewCodec,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Review, ReviewError> {
    if body.is_empty() {
        return Err(ReviewError::BadRequest("empty body".to_string()));
    }

    match content_type {
        Some(JSON_CONTENT_TYPE) => {}
        other => {
            return Err(ReviewError::BadRequest(format!(
                "invalid Content-Type={}, expect {}",
                other.unwrap_or("<none>"),
                JSON_CONTENT_TYPE
            )));
        }
    }

    codec.decode(body)
}
