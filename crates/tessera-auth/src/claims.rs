//! Claim set carried in a token payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tessera_core::config::ClaimNameConfig;

/// Expiration claim. Registered JWT name, not configurable.
pub const EXP: &str = "exp";
/// Issued-at claim. Registered JWT name, not configurable.
pub const IAT: &str = "iat";

/// Ordered mapping from claim name to JSON value.
///
/// Insertion order is kept so that the same sequence of assignments always
/// serializes to the same payload bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Integer value of a claim, if present and integral.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    /// Epoch-seconds value of a time claim. Fractional seconds are
    /// truncated; anything non-numeric is `None`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_epoch(&self, name: &str) -> Option<i64> {
        let value = self.0.get(name)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|secs| secs.trunc() as i64))
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Assign a claim, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Drop a claim. The remaining claims keep their relative order.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Claims whose names are not in `reserved`.
    pub fn without<'a>(
        &'a self,
        reserved: &'a [&'a str],
    ) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        self.0
            .iter()
            .filter(move |(name, _)| !reserved.contains(&name.as_str()))
    }

    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Resolved names of the claims the engine manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimNames {
    pub token_type: String,
    pub jti: String,
    pub refresh_exp: String,
    pub user_id: String,
}

impl ClaimNames {
    pub fn from_config(config: &ClaimNameConfig) -> Self {
        Self {
            token_type: config.token_type.clone(),
            jti: config.jti.clone(),
            refresh_exp: config.sliding_refresh_exp.clone(),
            user_id: config.user_id.clone(),
        }
    }

    /// Claims that are never copied from one token into another.
    pub fn reserved(&self) -> [&str; 5] {
        [
            self.token_type.as_str(),
            EXP,
            IAT,
            self.jti.as_str(),
            self.refresh_exp.as_str(),
        ]
    }
}

impl Default for ClaimNames {
    fn default() -> Self {
        Self::from_config(&ClaimNameConfig::default())
    }
}
