//! Compact JWS encoding and verified decoding of claim sets.
//!
//! The codec only deals with structure and signatures. It never looks at the
//! clock or at any claim; expiration and type rules live in the token layer.

use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use tessera_core::config::SigningConfig;

use crate::claims::ClaimSet;
use crate::error::{AuthError, Result};

/// Signs and verifies tokens with one immutable key pair.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Codec for an HMAC algorithm with a shared secret.
    pub fn hmac(algorithm: Algorithm, secret: &[u8]) -> tessera_core::Result<Self> {
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(tessera_core::Error::Config(format!(
                "{algorithm:?} is not an HMAC algorithm"
            )));
        }
        if secret.is_empty() {
            return Err(tessera_core::Error::Config(
                "HMAC secret must not be empty".into(),
            ));
        }
        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    /// Build a codec from the signing section of the configuration.
    pub fn from_config(signing: &SigningConfig) -> tessera_core::Result<Self> {
        let algorithm = Algorithm::from_str(&signing.algorithm).map_err(|e| {
            tessera_core::Error::Config(format!(
                "Unsupported signing algorithm {}: {e}",
                signing.algorithm
            ))
        })?;

        if signing.is_hmac() {
            return Self::hmac(algorithm, signing.signing_key.as_bytes());
        }

        let private_pem = signing.signing_key.as_bytes();
        let public_pem = signing
            .verifying_key
            .as_deref()
            .ok_or_else(|| {
                tessera_core::Error::Config(format!(
                    "verifying_key is required for {}",
                    signing.algorithm
                ))
            })?
            .as_bytes();

        let key_error = |what: &str, e: jsonwebtoken::errors::Error| {
            tessera_core::Error::Config(format!("Invalid {what} for {algorithm:?}: {e}"))
        };

        let (encoding_key, decoding_key) = match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => (
                EncodingKey::from_rsa_pem(private_pem).map_err(|e| key_error("signing_key", e))?,
                DecodingKey::from_rsa_pem(public_pem).map_err(|e| key_error("verifying_key", e))?,
            ),
            Algorithm::ES256 | Algorithm::ES384 => (
                EncodingKey::from_ec_pem(private_pem).map_err(|e| key_error("signing_key", e))?,
                DecodingKey::from_ec_pem(public_pem).map_err(|e| key_error("verifying_key", e))?,
            ),
            Algorithm::EdDSA => (
                EncodingKey::from_ed_pem(private_pem).map_err(|e| key_error("signing_key", e))?,
                DecodingKey::from_ed_pem(public_pem).map_err(|e| key_error("verifying_key", e))?,
            ),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                return Self::hmac(algorithm, private_pem);
            }
        };

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign `claims` into a three-segment wire string.
    pub fn encode(&self, claims: &ClaimSet) -> Result<String> {
        let header = Header::new(self.algorithm);
        jsonwebtoken::encode(&header, claims, &self.encoding_key)
            .map_err(|e| AuthError::Encode(e.to_string()))
    }

    /// Verify the signature over the exact header and payload bytes, then
    /// parse the payload.
    pub fn decode(&self, token: &str) -> Result<ClaimSet> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        jsonwebtoken::decode::<ClaimSet>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| classify(&e))
    }

    /// Parse a wire string without checking its signature.
    ///
    /// For diagnostics only. Claims returned here are untrusted.
    pub fn decode_unverified(token: &str) -> Result<ClaimSet> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::MalformedToken(
                "expected three dot-separated segments".into(),
            ));
        };

        let header = URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|e| AuthError::MalformedToken(format!("header: {e}")))?;
        serde_json::from_slice::<serde_json::Value>(&header)
            .map_err(|e| AuthError::MalformedToken(format!("header: {e}")))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| AuthError::MalformedToken(format!("payload: {e}")))?;
        serde_json::from_slice(&payload)
            .map_err(|e| AuthError::MalformedToken(format!("payload: {e}")))
    }
}

fn classify(err: &jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        JwtErrorKind::InvalidToken
        | JwtErrorKind::Base64(_)
        | JwtErrorKind::Json(_)
        | JwtErrorKind::Utf8(_) => AuthError::MalformedToken(err.to_string()),
        _ => AuthError::InvalidSignature(err.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn codec() -> TokenCodec {
        TokenCodec::hmac(Algorithm::HS256, b"test-secret-key-for-testing").unwrap()
    }

    fn sample_claims() -> ClaimSet {
        [
            ("token_type", json!("access")),
            ("exp", json!(4_102_444_800_i64)),
            ("user_id", json!(42)),
            ("profile", json!({"name": "alice", "roles": ["admin", "ops"]})),
            ("staff", json!(false)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn decode_returns_what_was_encoded() {
        let codec = codec();
        let claims = sample_claims();
        let token = codec.encode(&claims).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(codec.decode(&token).unwrap(), claims);
    }

    #[test]
    fn header_declares_algorithm_and_type() {
        let token = codec().encode(&sample_claims()).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn codec_ignores_expired_claims() {
        let codec = codec();
        let claims: ClaimSet = [("exp", json!(1))].into_iter().collect();
        let token = codec.encode(&claims).unwrap();
        assert_eq!(codec.decode(&token).unwrap(), claims);
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        let err = codec().decode("not-a-valid-token").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedToken);

        let err = codec().decode("a.b.c.d").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedToken);
    }

    #[test]
    fn garbage_payload_is_malformed() {
        let token = codec().encode(&sample_claims()).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = "!!!not-base64!!!";
        let err = codec().decode(&parts.join(".")).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::MalformedToken | ErrorKind::InvalidSignature
        ));
    }

    #[test]
    fn tampered_payload_fails_signature() {
        let codec = codec();
        let token = codec.encode(&sample_claims()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let mut forged = sample_claims();
        forged.insert("user_id", 1);
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        let err = codec.decode(&tampered).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSignature);
    }

    #[test]
    fn wrong_secret_fails_signature() {
        let token = codec().encode(&sample_claims()).unwrap();
        let other = TokenCodec::hmac(Algorithm::HS256, b"different-secret").unwrap();
        let err = other.decode(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSignature);
    }

    #[test]
    fn algorithm_mismatch_fails_signature() {
        let token = codec().encode(&sample_claims()).unwrap();
        let other = TokenCodec::hmac(Algorithm::HS512, b"test-secret-key-for-testing").unwrap();
        let err = other.decode(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSignature);
    }

    #[test]
    fn unverified_decode_skips_signature() {
        let token = codec().encode(&sample_claims()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let unsigned = format!("{}.{}.", parts[0], parts[1]);

        let claims = TokenCodec::decode_unverified(&unsigned).unwrap();
        assert_eq!(claims, sample_claims());

        let err = TokenCodec::decode_unverified("only.two").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedToken);
    }

    #[test]
    fn from_config_rejects_bad_material() {
        let signing = SigningConfig {
            algorithm: "RS256".into(),
            signing_key: "not a pem".into(),
            verifying_key: Some("not a pem either".into()),
        };
        assert!(TokenCodec::from_config(&signing).is_err());

        let signing = SigningConfig {
            algorithm: "HS999".into(),
            ..SigningConfig::default()
        };
        assert!(TokenCodec::from_config(&signing).is_err());

        let signing = SigningConfig {
            signing_key: String::new(),
            ..SigningConfig::default()
        };
        assert!(TokenCodec::from_config(&signing).is_err());
    }

    #[test]
    fn from_config_default_is_hs256() {
        let codec = TokenCodec::from_config(&SigningConfig::default()).unwrap();
        assert_eq!(codec.algorithm(), Algorithm::HS256);
    }
}
