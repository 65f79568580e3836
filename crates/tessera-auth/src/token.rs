//! Tokens: a claim set plus the lifecycle rules of its variant.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tessera_core::config::LifetimeConfig;
use tessera_core::unix_secs;

use crate::claims::{ClaimNames, ClaimSet, EXP, IAT};
use crate::error::{AuthError, Result};
use crate::jwt::JwtManager;

/// The three token variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived credential presented on every request.
    Access,
    /// Longer-lived credential that mints access tokens.
    Refresh,
    /// Single credential that is both presented and extended.
    Sliding,
}

impl TokenKind {
    pub const ALL: [Self; 3] = [Self::Access, Self::Refresh, Self::Sliding];

    /// Value of the token-type claim for this variant.
    pub const fn type_tag(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::Sliding => "sliding",
        }
    }

    /// Default `exp` lifetime in seconds.
    pub const fn lifetime(self, lifetimes: &LifetimeConfig) -> i64 {
        match self {
            Self::Access => lifetimes.access_token_secs,
            Self::Refresh => lifetimes.refresh_token_secs,
            Self::Sliding => lifetimes.sliding_token_secs,
        }
    }

    /// Claims that must be present before any other check runs, in the
    /// order they are checked.
    pub fn mandatory_claims(self, names: &ClaimNames) -> Vec<&str> {
        let mut claims = base_mandatory_claims(names).to_vec();
        if self == Self::Sliding {
            claims.push(names.refresh_exp.as_str());
        }
        claims
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_tag() == tag)
    }
}

/// Claims every variant requires, in the order they are checked.
pub(crate) fn base_mandatory_claims(names: &ClaimNames) -> [&str; 4] {
    [EXP, names.token_type.as_str(), IAT, names.jti.as_str()]
}

/// Printable form of a type claim for mismatch errors.
pub(crate) fn describe_tag(value: Option<&Value>) -> String {
    value.map_or_else(String::new, |v| {
        v.as_str().map_or_else(|| v.to_string(), str::to_string)
    })
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

impl FromStr for TokenKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s).ok_or_else(|| AuthError::TokenTypeMismatch {
            expected: "access|refresh|sliding".into(),
            actual: s.to_string(),
        })
    }
}

/// A token that is either freshly minted or decoded from the wire.
///
/// Claims may be assigned freely until [`Token::render`] is called; after
/// that the wire string is the authoritative form and any further change
/// needs a new render.
#[derive(Clone)]
pub struct Token {
    kind: TokenKind,
    claims: ClaimSet,
    current_time: SystemTime,
    jwt: JwtManager,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("kind", &self.kind)
            .field("claims", &self.claims)
            .field("current_time", &unix_secs(self.current_time))
            .finish_non_exhaustive()
    }
}

impl Token {
    /// Mint a new token with type, `exp`, `iat` and `jti` populated.
    pub(crate) fn fresh(jwt: &JwtManager, kind: TokenKind) -> Self {
        let current_time = jwt.clock().now();
        let names = jwt.claim_names();

        let mut token = Self {
            kind,
            claims: ClaimSet::new(),
            current_time,
            jwt: jwt.clone(),
        };
        token
            .claims
            .insert(names.token_type.clone(), kind.type_tag());
        token.set_exp();
        token.set_iat(current_time);
        token.set_jti();
        if kind == TokenKind::Sliding {
            token.set_exp_for(
                &names.refresh_exp,
                current_time,
                jwt.lifetimes().sliding_refresh_secs,
            );
        }
        token
    }

    /// Wrap claims that came off the wire. Nothing is checked here.
    pub(crate) fn decoded(jwt: &JwtManager, kind: TokenKind, claims: ClaimSet) -> Self {
        Self {
            kind,
            claims,
            current_time: jwt.clock().now(),
            jwt: jwt.clone(),
        }
    }

    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    pub const fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// Instant this token was minted or decoded at. All default time
    /// arithmetic on the token is relative to it.
    pub const fn current_time(&self) -> SystemTime {
        self.current_time
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Assign a claim.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.claims.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.claims.remove(name)
    }

    pub fn jti(&self) -> Option<&str> {
        self.claims.get_str(&self.jwt.claim_names().jti)
    }

    pub fn exp(&self) -> Option<i64> {
        self.claims.get_epoch(EXP)
    }

    pub fn token_type(&self) -> Option<&str> {
        self.claims.get_str(&self.jwt.claim_names().token_type)
    }

    /// Set `exp` from the token's own time and its variant lifetime.
    pub fn set_exp(&mut self) {
        let lifetime = self.kind.lifetime(self.jwt.lifetimes());
        self.set_exp_for(EXP, self.current_time, lifetime);
    }

    /// Set `claim` to `epoch(from) + lifetime_secs`. Negative lifetimes are
    /// allowed and produce an instant in the past.
    pub fn set_exp_for(&mut self, claim: &str, from: SystemTime, lifetime_secs: i64) {
        self.claims
            .insert(claim, unix_secs(from).saturating_add(lifetime_secs));
    }

    pub fn set_iat(&mut self, at: SystemTime) {
        self.claims.insert(IAT, unix_secs(at));
    }

    /// Replace the token id with a newly generated one.
    pub fn set_jti(&mut self) {
        let jti = uuid::Uuid::new_v4().simple().to_string();
        let name = self.jwt.claim_names().jti.clone();
        self.claims.insert(name, jti);
    }

    /// Check `exp` against the token's own time.
    pub fn check_exp(&self) -> Result<()> {
        self.check_exp_at(EXP, self.current_time)
    }

    /// Fail unless `claim` holds a timestamp strictly greater than `now`.
    /// Fractional seconds are truncated.
    pub fn check_exp_at(&self, claim: &str, now: SystemTime) -> Result<()> {
        if !self.claims.contains(claim) {
            return Err(AuthError::ClaimMissing(claim.to_string()));
        }
        let value = self.claims.get_epoch(claim).ok_or_else(|| {
            AuthError::MalformedToken(format!("claim '{claim}' is not a numeric timestamp"))
        })?;
        if unix_secs(now) >= value {
            return Err(AuthError::ClaimExpired(claim.to_string()));
        }
        Ok(())
    }

    /// Fail with the first of `claims` that is absent.
    pub(crate) fn check_present(&self, claims: &[&str]) -> Result<()> {
        match claims.iter().find(|claim| !self.claims.contains(claim)) {
            Some(claim) => Err(AuthError::ClaimMissing((*claim).to_string())),
            None => Ok(()),
        }
    }

    /// Run every claim-level check, stopping at the first failure:
    /// mandatory claims, `exp`, token type, then the blacklist if enabled.
    pub fn verify(&self) -> Result<()> {
        let names = self.jwt.claim_names();
        self.check_present(&self.kind.mandatory_claims(names))?;
        self.check_exp()?;

        let expected = self.kind.type_tag();
        match self.claims.get(&names.token_type) {
            Some(Value::String(actual)) if actual == expected => {}
            other => {
                return Err(AuthError::TokenTypeMismatch {
                    expected: expected.to_string(),
                    actual: describe_tag(other),
                });
            }
        }

        let jti = self
            .jti()
            .ok_or_else(|| AuthError::ClaimMissing(names.jti.clone()))?;
        self.jwt.check_blacklist(jti)
    }

    /// Sign the claim set into its wire form.
    pub fn render(&self) -> Result<String> {
        self.jwt.codec().encode(&self.claims)
    }

    /// Mint an access token from a refresh token, copying every
    /// non-reserved claim. Its `exp` is measured from this token's time.
    pub fn access_token(&self) -> Result<Self> {
        if self.kind != TokenKind::Refresh {
            return Err(AuthError::TokenTypeMismatch {
                expected: TokenKind::Refresh.type_tag().into(),
                actual: self.kind.type_tag().into(),
            });
        }

        let mut access = Self::fresh(&self.jwt, TokenKind::Access);
        access.set_exp_for(
            EXP,
            self.current_time,
            TokenKind::Access.lifetime(self.jwt.lifetimes()),
        );

        let names = self.jwt.claim_names();
        let reserved = names.reserved();
        for (name, value) in self.claims.without(&reserved) {
            access.claims.insert(name.clone(), value.clone());
        }
        Ok(access)
    }
}

/// A token that passed the full verification pipeline.
///
/// Only the pipeline constructs these, so holding one proves the checks ran.
#[derive(Debug, Clone)]
pub struct VerifiedToken(Token);

impl VerifiedToken {
    pub(crate) const fn new(token: Token) -> Self {
        Self(token)
    }

    /// Give up the verified status to mutate the token.
    pub fn into_token(self) -> Token {
        self.0
    }
}

impl Deref for VerifiedToken {
    type Target = Token;

    fn deref(&self) -> &Token {
        &self.0
    }
}
