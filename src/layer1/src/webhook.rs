//! Webhook signature verification and envelope construction.
//!
//! Ported from `layer1_interface/webhooks.py`'s provider dispatch table:
//! each provider signs the raw request body with a shared secret over a
//! distinct scheme, and a successfully-verified payload is turned into a
//! command-or-general envelope tagged `source = "webhook:<provider>"`.

use ring::hmac;

use aios_common::envelope::{Envelope, Identity, RequestKind};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    GitHub,
    Slack,
    Generic,
}

/// Verifies `signature_header` over `body` against `secret`, per the
/// provider's scheme, in constant time.
pub fn verify_signature(provider: Provider, secret: &[u8], body: &[u8], signature_header: &str) -> bool {
    let expected_hex = match provider {
        Provider::GitHub => signature_header.strip_prefix("sha256=").unwrap_or(signature_header),
        Provider::Slack => signature_header.strip_prefix("v0=").unwrap_or(signature_header),
        Provider::Generic => signature_header,
    };

    let expected = match hex_decode(expected_hex) {
        Some(bytes) => bytes,
        None => return false,
    };

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let signed_body = match provider {
        // Slack signs `v0:<timestamp>:<body>`; the timestamp is expected to
        // already be folded into `body` by the caller when relevant, since
        // this function only ever sees the raw bytes the caller chooses to
        // sign over.
        Provider::GitHub | Provider::Slack | Provider::Generic => body,
    };

    hmac::verify(&key, signed_body, &expected).is_ok()
}

/// Extracts `content` via a dotted field path (e.g. `"issue.title"`) and
/// zero or more `context` field paths out of the decoded JSON payload, then
/// builds the envelope the webhook surface hands to L1.
pub fn envelope_from_payload(
    provider_label: &str,
    payload: &Value,
    content_path: &str,
    context_paths: &[&str],
) -> Envelope {
    let content = dotted_lookup(payload, content_path)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut envelope = Envelope::new(Identity::Source(format!("webhook:{provider_label}")), content)
        .with_request_type(RequestKind::Webhook)
        .with_source(format!("webhook:{provider_label}"));

    for path in context_paths {
        if let Some(value) = dotted_lookup(payload, path) {
            envelope = envelope.with_context_value(path.to_string(), value.clone());
        }
    }

    envelope
}

fn dotted_lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hex_encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn github_signature_roundtrips() {
        let secret = b"shared-secret";
        let body = br#"{"action":"opened"}"#;
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
        let tag = hmac::sign(&key, body);
        let header = format!("sha256={}", hex_encode(tag.as_ref()));

        assert!(verify_signature(Provider::GitHub, secret, body, &header));
        assert!(!verify_signature(Provider::GitHub, b"wrong-secret", body, &header));
    }

    #[test]
    fn malformed_signature_is_rejected_not_panicked() {
        assert!(!verify_signature(Provider::Generic, b"secret", b"body", "not-hex!!"));
    }

    #[test]
    fn content_and_context_are_pulled_by_dotted_path() {
        let payload = json!({
            "issue": { "title": "found a bug" },
            "repository": { "full_name": "acme/widgets" },
        });
        let envelope = envelope_from_payload("github", &payload, "issue.title", &["repository.full_name"]);
        assert_eq!(envelope.text, "found a bug");
        assert_eq!(envelope.request_type, RequestKind::Webhook);
        assert_eq!(envelope.context["repository.full_name"], json!("acme/widgets"));
    }
}
