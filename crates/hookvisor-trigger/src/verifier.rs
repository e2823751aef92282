//! Webhook authentication and filtering.
//!
//! Checks run cheapest-first: the event header, then the HMAC over the raw
//! body, and only then JSON parsing. An unauthenticated body is never parsed.

use crate::payload::PushEvent;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub const EVENT_HEADER: &str = "x-github-event";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Webhook secret must not be empty")]
    EmptySecret,

    #[error("Missing X-Hub-Signature-256 header")]
    MissingSignature,

    #[error("Signature is not valid hex: {0}")]
    MalformedSignature(#[from] hex::FromHexError),

    #[error("Signature does not match payload")]
    SignatureMismatch,

    #[error("Malformed push payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Shared secret keying HMAC-SHA256.
///
/// Holds the keyed MAC state rather than the raw secret; `Debug` never shows
/// either.
#[derive(Clone)]
pub struct WebhookSecret {
    mac: HmacSha256,
}

impl WebhookSecret {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, VerifyError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(VerifyError::EmptySecret);
        }
        // HMAC accepts keys of any length.
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| VerifyError::EmptySecret)?;
        Ok(Self { mac })
    }

    /// `sha256=<hex>` header value for `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(body);
        format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time check of `signature` (with or without the `sha256=`
    /// prefix) against the MAC of `body`.
    pub fn verify_signature(&self, body: &[u8], signature: &str) -> Result<(), VerifyError> {
        let hex_digest = signature
            .trim()
            .strip_prefix(SIGNATURE_PREFIX)
            .unwrap_or(signature.trim());
        let expected = hex::decode(hex_digest)?;

        let mut mac = self.mac.clone();
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| VerifyError::SignatureMismatch)
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(<redacted>)")
    }
}

/// One inbound delivery, borrowed from the request.
#[derive(Debug, Clone, Copy)]
pub struct IncomingTrigger<'a> {
    pub event: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    EventMismatch { received: Option<String> },
    RefMismatch { received: String },
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::EventMismatch { received: Some(event) } => {
                write!(f, "event type '{event}' not watched")
            }
            IgnoreReason::EventMismatch { received: None } => write!(f, "no event type header"),
            IgnoreReason::RefMismatch { received } => write!(f, "ref '{received}' not watched"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Authentic push to the watched ref: restart.
    Trigger(PushEvent),
    /// Irrelevant delivery, dropped without error.
    Ignored(IgnoreReason),
}

/// Stateless verifier over the process-wide secret.
#[derive(Debug, Clone)]
pub struct Verifier {
    secret: WebhookSecret,
    event: String,
    git_ref: String,
}

impl Verifier {
    pub fn new(secret: WebhookSecret, event: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            secret,
            event: event.into(),
            git_ref: git_ref.into(),
        }
    }

    pub fn expected_event(&self) -> &str {
        &self.event
    }

    pub fn expected_ref(&self) -> &str {
        &self.git_ref
    }

    pub fn verify(&self, incoming: &IncomingTrigger<'_>) -> Result<Verdict, VerifyError> {
        if incoming.event != Some(self.event.as_str()) {
            return Ok(Verdict::Ignored(IgnoreReason::EventMismatch {
                received: incoming.event.map(str::to_owned),
            }));
        }

        let signature = incoming.signature.ok_or(VerifyError::MissingSignature)?;
        self.secret.verify_signature(incoming.body, signature)?;

        let push: PushEvent = serde_json::from_slice(incoming.body)?;
        if push.git_ref != self.git_ref {
            return Ok(Verdict::Ignored(IgnoreReason::RefMismatch {
                received: push.git_ref,
            }));
        }

        debug!(
            git_ref = %push.git_ref,
            commit = %push.short_commit(),
            repository = %push.repository_name(),
            "Push authenticated"
        );
        Ok(Verdict::Trigger(push))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: &str = "refs/heads/main";

    fn verifier() -> Verifier {
        Verifier::new(WebhookSecret::new("It's a Secret to Everybody").unwrap(), "push", MAIN)
    }

    fn push_body(git_ref: &str) -> Vec<u8> {
        format!(r#"{{"ref":"{git_ref}","after":"abc123def456"}}"#).into_bytes()
    }

    #[test]
    fn test_known_github_signature() {
        // Sample delivery from GitHub's webhook validation docs.
        let secret = WebhookSecret::new("It's a Secret to Everybody").unwrap();
        assert_eq!(
            secret.sign(b"Hello, World!"),
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );
    }

    #[test]
    fn test_sign_then_verify() {
        let secret = WebhookSecret::new("s3cret").unwrap();
        let bodies: [&[u8]; 3] = [b"", b"{}", b"\x00\xffbinary"];
        for body in bodies {
            let signature = secret.sign(body);
            assert!(secret.verify_signature(body, &signature).is_ok());
            // The prefix is optional.
            let bare = signature.strip_prefix("sha256=").unwrap();
            assert!(secret.verify_signature(body, bare).is_ok());
        }

        let other = WebhookSecret::new("other").unwrap();
        let signature = other.sign(b"{}");
        assert!(matches!(
            secret.verify_signature(b"{}", &signature),
            Err(VerifyError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_push_to_watched_ref_triggers() {
        let verifier = verifier();
        let body = push_body(MAIN);
        let signature = verifier.secret.sign(&body);

        let verdict = verifier
            .verify(&IncomingTrigger {
                event: Some("push"),
                signature: Some(&signature),
                body: &body,
            })
            .unwrap();

        match verdict {
            Verdict::Trigger(push) => {
                assert_eq!(push.git_ref, MAIN);
                assert_eq!(push.short_commit(), "abc123d");
            }
            other => panic!("expected trigger, got {other:?}"),
        }
    }

    #[test]
    fn test_other_event_ignored_before_signature_check() {
        let verifier = verifier();
        let body = push_body(MAIN);

        // No signature at all: the event filter must win.
        let verdict = verifier
            .verify(&IncomingTrigger {
                event: Some("pull_request"),
                signature: None,
                body: &body,
            })
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Ignored(IgnoreReason::EventMismatch {
                received: Some("pull_request".into())
            })
        );

        let verdict = verifier
            .verify(&IncomingTrigger {
                event: None,
                signature: None,
                body: &body,
            })
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Ignored(IgnoreReason::EventMismatch { received: None })
        );
    }

    #[test]
    fn test_other_ref_ignored() {
        let verifier = verifier();
        let body = push_body("refs/heads/dev");
        let signature = verifier.secret.sign(&body);

        let verdict = verifier
            .verify(&IncomingTrigger {
                event: Some("push"),
                signature: Some(&signature),
                body: &body,
            })
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Ignored(IgnoreReason::RefMismatch {
                received: "refs/heads/dev".into()
            })
        );
    }

    #[test]
    fn test_bad_signatures_rejected() {
        let verifier = verifier();
        let body = push_body(MAIN);

        let missing = verifier.verify(&IncomingTrigger {
            event: Some("push"),
            signature: None,
            body: &body,
        });
        assert!(matches!(missing, Err(VerifyError::MissingSignature)));

        let not_hex = verifier.verify(&IncomingTrigger {
            event: Some("push"),
            signature: Some("sha256=zz"),
            body: &body,
        });
        assert!(matches!(not_hex, Err(VerifyError::MalformedSignature(_))));

        let mut tampered = body.clone();
        tampered.extend_from_slice(b" ");
        let signature = verifier.secret.sign(&body);
        let mismatch = verifier.verify(&IncomingTrigger {
            event: Some("push"),
            signature: Some(&signature),
            body: &tampered,
        });
        assert!(matches!(mismatch, Err(VerifyError::SignatureMismatch)));

        // Truncated digest is a mismatch, not a panic.
        let truncated = &signature[.."sha256=".len() + 20];
        let short = verifier.verify(&IncomingTrigger {
            event: Some("push"),
            signature: Some(truncated),
            body: &body,
        });
        assert!(matches!(short, Err(VerifyError::SignatureMismatch)));
    }

    #[test]
    fn test_malformed_body_with_valid_signature() {
        let verifier = verifier();
        let body = b"{not json".to_vec();
        let signature = verifier.secret.sign(&body);

        let result = verifier.verify(&IncomingTrigger {
            event: Some("push"),
            signature: Some(&signature),
            body: &body,
        });
        assert!(matches!(result, Err(VerifyError::MalformedPayload(_))));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(WebhookSecret::new(""), Err(VerifyError::EmptySecret)));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = WebhookSecret::new("hunter2").unwrap();
        let rendered = format!("{:?}", verifier());
        assert!(!rendered.contains("Secret to Everybody"));
        assert_eq!(format!("{secret:?}"), "WebhookSecret(<redacted>)");
    }
}
