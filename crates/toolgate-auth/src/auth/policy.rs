//! Claim validation gates applied after the signature check

use super::claims::{AccessToken, Claims, OneOrMany};
use super::verifier::{RejectReason, Rejection, VerificationOutcome};

/// Issuer and audience expectations captured from the verifier config.
///
/// Empty expectations behave exactly like absent ones: the gate is skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimPolicy {
    issuer: Option<String>,
    audience: Option<OneOrMany>,
}

impl ClaimPolicy {
    #[must_use]
    pub fn new(issuer: Option<String>, audience: Option<OneOrMany>) -> Self {
        Self {
            issuer: issuer.filter(|iss| !iss.is_empty()),
            audience: audience.filter(|aud| !aud.is_empty()),
        }
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub const fn audience(&self) -> Option<&OneOrMany> {
        self.audience.as_ref()
    }

    /// Run the expiry, issuer, audience and scope gates in order.
    ///
    /// `now` is the current unix time in seconds.
    pub fn evaluate(&self, token: &str, claims: &Claims, now: f64) -> VerificationOutcome {
        let client_id = claims.client_identity();
        let reject = |reason: RejectReason, detail: String| {
            VerificationOutcome::Rejected(Rejection::new(reason, Some(client_id.clone()), detail))
        };

        let Some(exp) = claims.exp else {
            return reject(RejectReason::MissingExp, "token has no exp claim".into());
        };
        if exp < now {
            return reject(
                RejectReason::Expired,
                format!("token expired at {exp}, now {now}"),
            );
        }

        if let Some(expected) = &self.issuer
            && claims.iss.as_deref() != Some(expected.as_str())
        {
            return reject(
                RejectReason::IssuerMismatch,
                format!(
                    "expected issuer {expected}, got {}",
                    claims.iss.as_deref().unwrap_or("<none>")
                ),
            );
        }

        if let Some(expected) = &self.audience {
            let matched = claims
                .aud
                .as_ref()
                .is_some_and(|aud| audience_matches(expected, aud));
            if !matched {
                return reject(
                    RejectReason::AudienceMismatch,
                    format!(
                        "expected audience {expected}, got {}",
                        claims
                            .aud
                            .as_ref()
                            .map_or_else(|| "<none>".to_string(), ToString::to_string)
                    ),
                );
            }
        }

        VerificationOutcome::Accepted(AccessToken {
            token: token.to_string(),
            client_id,
            scopes: claims.scopes(),
            expires_at: Some(exp as i64),
        })
    }
}

/// Generous audience match: any shared value between expected and actual
pub fn audience_matches(expected: &OneOrMany, actual: &OneOrMany) -> bool {
    match (expected, actual) {
        (OneOrMany::One(e), OneOrMany::One(a)) => e == a,
        (OneOrMany::One(e), OneOrMany::Many(a)) => a.contains(e),
        (OneOrMany::Many(e), OneOrMany::One(a)) => e.contains(a),
        (OneOrMany::Many(e), OneOrMany::Many(a)) => e.iter().any(|item| a.contains(item)),
    }
}
