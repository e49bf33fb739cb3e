//! Handshake admission: credential extraction and token verification

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

const BEARER_PREFIX: &str = "Bearer ";

/// Verified token payload attached to an admitted connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// The `sub` claim, when it is a string
    pub fn subject(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Why a handshake was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Neither the auth payload nor the authorization header carried a token
    NoTokenProvided,

    /// Bad signature, malformed token, or expired
    InvalidToken,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::NoTokenProvided => "NO_TOKEN_PROVIDED",
            RejectReason::InvalidToken => "INVALID_TOKEN",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of a handshake
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admitted { claims: Claims },
    Rejected { reason: RejectReason },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Handshake-time auth payload, carried as query parameters on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeAuth {
    pub token: Option<String>,
}

/// HMAC (HS256/384/512) verifier bound to the configured secret
#[derive(Clone)]
pub struct TokenVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            key: Some(DecodingKey::from_secret(secret)),
            validation: validation(),
        }
    }

    /// Verifier without a secret. Every token is refused.
    pub fn reject_all() -> Self {
        Self {
            key: None,
            validation: validation(),
        }
    }

    /// Decide admission from the two possible credential carriers.
    ///
    /// The auth payload wins over the header; empty values count as absent.
    pub fn admit(&self, auth_token: Option<&str>, authorization: Option<&str>) -> Admission {
        let raw = auth_token
            .filter(|token| !token.is_empty())
            .or_else(|| authorization.filter(|header| !header.is_empty()));

        let Some(raw) = raw else {
            return Admission::Rejected {
                reason: RejectReason::NoTokenProvided,
            };
        };

        let token = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw);

        match self.verify(token) {
            Ok(claims) => Admission::Admitted { claims },
            Err(reason) => Admission::Rejected { reason },
        }
    }

    /// Check signature and, when present, `exp` and `nbf`
    pub fn verify(&self, token: &str) -> Result<Claims, RejectReason> {
        let key = self.key.as_ref().ok_or(RejectReason::InvalidToken)?;

        decode::<Claims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token verification failed");
                RejectReason::InvalidToken
            })
    }
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("configured", &self.key.is_some())
            .finish()
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    // exp is optional, but enforced without slack when present
    validation.required_spec_claims.clear();
    validation.leeway = 0;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"test-access-secret";

    fn now() -> u64 {
        chrono::Utc::now().timestamp() as u64
    }

    fn sign(payload: &Value, secret: &[u8]) -> String {
        encode(&Header::default(), payload, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::from_secret(SECRET)
    }

    #[test]
    fn test_no_credential_is_rejected() {
        assert_eq!(
            verifier().admit(None, None),
            Admission::Rejected {
                reason: RejectReason::NoTokenProvided
            }
        );
        assert_eq!(
            verifier().admit(Some(""), Some("")),
            Admission::Rejected {
                reason: RejectReason::NoTokenProvided
            }
        );
    }

    #[test]
    fn test_bearer_header_is_admitted_with_claims() {
        let payload = json!({ "sub": "user-7", "role": "technician", "exp": now() + 600 });
        let token = sign(&payload, SECRET);

        let admission = verifier().admit(None, Some(format!("Bearer {}", token).as_str()));

        match admission {
            Admission::Admitted { claims } => {
                assert_eq!(Value::Object(claims.as_map().clone()), payload);
                assert_eq!(claims.subject(), Some("user-7"));
                assert_eq!(claims.get("role"), Some(&json!("technician")));
            }
            other => panic!("expected admission, got {:?}", other),
        }
    }

    #[test]
    fn test_auth_payload_without_prefix_is_admitted() {
        let token = sign(&json!({ "sub": "user-1" }), SECRET);
        assert!(verifier().admit(Some(token.as_str()), None).is_admitted());
    }

    #[test]
    fn test_auth_payload_takes_precedence_over_header() {
        let good = sign(&json!({ "sub": "payload" }), SECRET);
        let admission = verifier().admit(Some(good.as_str()), Some("Bearer garbage"));
        match admission {
            Admission::Admitted { claims } => assert_eq!(claims.subject(), Some("payload")),
            other => panic!("expected admission, got {:?}", other),
        }
    }

    #[test]
    fn test_hs384_and_hs512_tokens_are_admitted() {
        for algorithm in [Algorithm::HS384, Algorithm::HS512] {
            let token = encode(
                &Header::new(algorithm),
                &json!({ "sub": "user-1", "exp": now() + 600 }),
                &EncodingKey::from_secret(SECRET),
            )
            .unwrap();
            assert!(
                verifier().admit(Some(token.as_str()), None).is_admitted(),
                "{:?} token refused",
                algorithm
            );
        }
    }

    #[test]
    fn test_wrong_signature_is_invalid() {
        let token = sign(&json!({ "sub": "user-1", "exp": now() + 600 }), b"other-secret");
        assert_eq!(
            verifier().admit(None, Some(format!("Bearer {}", token).as_str())),
            Admission::Rejected {
                reason: RejectReason::InvalidToken
            }
        );
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let token = sign(&json!({ "sub": "user-1", "exp": now() - 10 }), SECRET);
        assert_eq!(
            verifier().admit(Some(token.as_str()), None),
            Admission::Rejected {
                reason: RejectReason::InvalidToken
            }
        );
    }

    #[test]
    fn test_malformed_token_is_invalid() {
        assert_eq!(
            verifier().admit(None, Some("Bearer not.a.jwt")),
            Admission::Rejected {
                reason: RejectReason::InvalidToken
            }
        );
    }

    #[test]
    fn test_verifier_without_secret_rejects_everything() {
        let token = sign(&json!({ "sub": "user-1" }), SECRET);
        assert_eq!(
            TokenVerifier::reject_all().admit(Some(token.as_str()), None),
            Admission::Rejected {
                reason: RejectReason::InvalidToken
            }
        );
    }

    #[test]
    fn test_reject_reason_codes() {
        assert_eq!(RejectReason::NoTokenProvided.to_string(), "NO_TOKEN_PROVIDED");
        assert_eq!(RejectReason::InvalidToken.to_string(), "INVALID_TOKEN");
    }
}
