#![allow(clippy::unwrap_used, clippy::panic)] // Integration tests use unwrap for brevity

//! End-to-end token lifecycle tests.
//!
//! Covers the full flow: credentials -> obtain -> verify -> refresh, driven by
//! a fixed clock so every timestamp is exact.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use tessera_auth::{
    AuthError, AuthService, ClaimSet, InMemoryCredentialStore, JwtManager, ObtainedTokens,
    TokenCodec, TokenKind,
};
use tessera_core::config::load_config_with_env;
use tessera_core::{Clock, Config, FixedClock};

const NOW: u64 = 1_700_000_000;
const ACCESS_LIFETIME: i64 = 300;
const SLIDING_LIFETIME: i64 = 300;

/// Helper to build a manager on a fixed clock.
fn manager(config: &Config) -> (JwtManager, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::at_unix(NOW));
    let jwt = JwtManager::builder(config)
        .unwrap()
        .clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .build()
        .unwrap();
    (jwt, clock)
}

fn service(jwt: JwtManager) -> AuthService {
    let mut store = InMemoryCredentialStore::new();
    store
        .add_user("1", "test_user", "test_password", true)
        .unwrap();
    AuthService::new(jwt, Arc::new(store))
}

#[test]
fn obtain_then_verify_each_family() {
    let (jwt, _clock) = manager(&Config::default());
    let service = service(jwt.clone());

    match service.obtain_pair("test_user", "test_password").unwrap() {
        ObtainedTokens::Pair { access, refresh } => {
            jwt.verify(&access, TokenKind::Access).unwrap();
            jwt.verify(&refresh, TokenKind::Refresh).unwrap();
        }
        ObtainedTokens::Sliding { .. } => panic!("expected a pair"),
    }

    match service.obtain_sliding("test_user", "test_password").unwrap() {
        ObtainedTokens::Sliding { token } => {
            jwt.verify(&token, TokenKind::Sliding).unwrap();
        }
        ObtainedTokens::Pair { .. } => panic!("expected a sliding token"),
    }
}

#[test]
fn verification_rejects_missing_past_and_retyped_tokens() {
    let (jwt, _clock) = manager(&Config::default());

    let mut token = jwt.issue(TokenKind::Access);
    token.remove("exp");
    let err = jwt
        .verify(&token.render().unwrap(), TokenKind::Access)
        .unwrap_err();
    assert_eq!(err, AuthError::ClaimMissing("exp".into()));

    let mut token = jwt.issue(TokenKind::Access);
    token.set_exp_for("exp", token.current_time(), -1);
    let err = jwt
        .verify(&token.render().unwrap(), TokenKind::Access)
        .unwrap_err();
    assert_eq!(err, AuthError::ClaimExpired("exp".into()));

    let mut token = jwt.issue(TokenKind::Access);
    token.set("token_type", "wrong_type");
    let err = jwt
        .verify(&token.render().unwrap(), TokenKind::Access)
        .unwrap_err();
    assert_eq!(
        err,
        AuthError::TokenTypeMismatch {
            expected: "access".into(),
            actual: "wrong_type".into(),
        }
    );
}

#[test]
fn codec_preserves_claims_exactly() {
    let codec = TokenCodec::hmac(jsonwebtoken::Algorithm::HS256, b"integration-secret").unwrap();
    let claims: ClaimSet = [
        ("zeta", json!(1)),
        ("alpha", json!("two")),
        ("nested", json!({"b": [1, 2, 3], "a": null})),
        ("flag", json!(true)),
    ]
    .into_iter()
    .collect();

    let decoded = codec.decode(&codec.encode(&claims).unwrap()).unwrap();
    assert_eq!(decoded, claims);
    let order: Vec<_> = decoded.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(order, ["zeta", "alpha", "nested", "flag"]);
}

#[test]
fn sliding_refresh_advances_nearly_full_token() {
    let (jwt, clock) = manager(&Config::default());
    let mut token = jwt.issue(TokenKind::Sliding);
    token.set_exp_for("exp", clock.now(), SLIDING_LIFETIME - 1);
    let old_exp = token.exp().unwrap();

    let refreshed = jwt.refresh_sliding(&token.render().unwrap()).unwrap();
    let new = jwt.verify(&refreshed.token, TokenKind::Sliding).unwrap();
    assert!(new.exp().unwrap() > old_exp);
    assert_eq!(new.exp(), Some(NOW as i64 + SLIDING_LIFETIME));
}

#[test]
fn pair_refresh_at_simulated_time() {
    let (jwt, clock) = manager(&Config::default());
    let mut refresh = jwt.issue(TokenKind::Refresh);
    refresh.set("test_claim", "arst");
    let wire = refresh.render().unwrap();

    let t = NOW - (ACCESS_LIFETIME as u64) / 2;
    clock.set(std::time::UNIX_EPOCH + Duration::from_secs(t));

    let pair = jwt.refresh_pair(&wire).unwrap();
    let access = jwt.verify(&pair.access, TokenKind::Access).unwrap();
    assert_eq!(access.exp(), Some(t as i64 + ACCESS_LIFETIME));
    assert_eq!(access.get("test_claim"), Some(&json!("arst")));
}

#[test]
fn obtain_and_refresh_twice() {
    let (jwt, clock) = manager(&Config::default());
    let service = service(jwt.clone());

    let ObtainedTokens::Pair { access, refresh } =
        service.obtain_pair("test_user", "test_password").unwrap()
    else {
        panic!("expected a pair");
    };
    let first = jwt.verify(&access, TokenKind::Access).unwrap();

    clock.advance(Duration::from_secs(100));
    let second = jwt
        .verify(&jwt.refresh_pair(&refresh).unwrap().access, TokenKind::Access)
        .unwrap();

    clock.advance(Duration::from_secs(100));
    let third = jwt
        .verify(&jwt.refresh_pair(&refresh).unwrap().access, TokenKind::Access)
        .unwrap();

    let reserved = jwt.claim_names().reserved();
    let custom = |t: &tessera_auth::VerifiedToken| -> Vec<(String, serde_json::Value)> {
        t.claims()
            .without(&reserved)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    };
    assert_eq!(custom(&first), custom(&second));
    assert_eq!(custom(&second), custom(&third));
    assert_eq!(custom(&first), vec![("user_id".to_string(), json!("1"))]);

    assert!(first.exp() <= second.exp());
    assert!(second.exp() <= third.exp());
}

#[test]
fn sliding_token_outlives_its_refresh_window() {
    let mut config = Config::default();
    config.lifetimes.sliding_token_secs = 10 * 86_400;
    let (jwt, clock) = manager(&config);
    let service = service(jwt.clone());
    let ObtainedTokens::Sliding { token } =
        service.obtain_sliding("test_user", "test_password").unwrap()
    else {
        panic!("expected a sliding token");
    };

    clock.advance(Duration::from_secs(200));
    let token = jwt.refresh_sliding(&token).unwrap().token;

    // Still valid for access, but the absolute window has closed.
    clock.advance(Duration::from_secs(86_400));
    jwt.verify(&token, TokenKind::Sliding).unwrap();
    assert_eq!(
        jwt.refresh_sliding(&token).unwrap_err(),
        AuthError::RefreshPeriodExpired {
            claim: "refresh_exp".into()
        }
    );
}

#[test]
fn config_file_drives_manager() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        [signing]
        algorithm = "HS512"
        signing_key = "file-secret"

        [lifetimes]
        access_token_secs = 60

        [claims]
        user_id = "sub"
        "#,
    )
    .unwrap();

    let config = load_config_with_env(Some(&path), |_| None).unwrap();
    let (jwt, _clock) = manager(&config);
    assert_eq!(jwt.codec().algorithm(), jsonwebtoken::Algorithm::HS512);

    let refresh = jwt.issue_for(TokenKind::Refresh, "42").render().unwrap();
    let access = jwt
        .verify(&jwt.refresh_pair(&refresh).unwrap().access, TokenKind::Access)
        .unwrap();
    assert_eq!(access.get("sub"), Some(&json!("42")));
    assert_eq!(access.exp(), Some(NOW as i64 + 60));

    let (other, _clock) = manager(&Config::default());
    assert!(other.verify(&refresh, TokenKind::Refresh).is_err());
}
