//! Caveats restrict or transform a permitted call.
//!
//! The set of caveat kinds is closed: evaluation dispatches on the variant. Caveats of a
//! permission are applied in stored order and the first rejection short-circuits.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A restriction attached to a [`Permission`](crate::Permission).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Caveat {
    /// Restricts the accounts visible to, and usable by, the origin.
    #[serde(rename = "eth_accounts")]
    EthAccounts(Vec<Address>),
    /// Replaces the call's params.
    #[serde(rename = "forceParams")]
    ForceParams(Value),
    /// Every param key must be present in the value, with an equal value.
    #[serde(rename = "requireParamsIsSubset")]
    RequireParamsIsSubset(Map<String, Value>),
    /// Truncates array responses.
    #[serde(rename = "limitResponseLength")]
    LimitResponseLength(usize),
}

/// Discriminant of a [`Caveat`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaveatType {
    #[serde(rename = "eth_accounts")]
    EthAccounts,
    #[serde(rename = "forceParams")]
    ForceParams,
    #[serde(rename = "requireParamsIsSubset")]
    RequireParamsIsSubset,
    #[serde(rename = "limitResponseLength")]
    LimitResponseLength,
}

impl CaveatType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EthAccounts => "eth_accounts",
            Self::ForceParams => "forceParams",
            Self::RequireParamsIsSubset => "requireParamsIsSubset",
            Self::LimitResponseLength => "limitResponseLength",
        }
    }
}

impl fmt::Display for CaveatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a caveat refused a call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CaveatError {
    #[error("account {0} is not permitted")]
    AccountNotPermitted(Address),
    #[error("param `{0}` is not permitted")]
    ParamNotPermitted(String),
    #[error("expected params to be an object")]
    ParamsNotObject,
}

impl Caveat {
    pub fn kind(&self) -> CaveatType {
        match self {
            Self::EthAccounts(_) => CaveatType::EthAccounts,
            Self::ForceParams(_) => CaveatType::ForceParams,
            Self::RequireParamsIsSubset(_) => CaveatType::RequireParamsIsSubset,
            Self::LimitResponseLength(_) => CaveatType::LimitResponseLength,
        }
    }

    /// Evaluates the caveat against the call's params, returning the effective params.
    pub fn apply_to_params(&self, params: Value) -> Result<Value, CaveatError> {
        match self {
            Self::EthAccounts(accounts) => {
                if let Some(account) =
                    referenced_accounts(&params).find(|account| !accounts.contains(account))
                {
                    return Err(CaveatError::AccountNotPermitted(account));
                }
                Ok(params)
            }
            Self::ForceParams(forced) => Ok(forced.clone()),
            Self::RequireParamsIsSubset(allowed) => {
                let object = match &params {
                    Value::Object(object) => object,
                    Value::Array(values) => match values.first() {
                        Some(Value::Object(object)) => object,
                        _ => return Err(CaveatError::ParamsNotObject),
                    },
                    _ => return Err(CaveatError::ParamsNotObject),
                };
                for (key, value) in object {
                    if allowed.get(key) != Some(value) {
                        return Err(CaveatError::ParamNotPermitted(key.clone()));
                    }
                }
                Ok(params)
            }
            Self::LimitResponseLength(_) => Ok(params),
        }
    }

    /// Applies the caveat to a successful result.
    pub fn apply_to_response(&self, result: Value) -> Value {
        match (self, result) {
            (Self::EthAccounts(accounts), Value::Array(values)) => {
                if values.iter().all(|value| parse_address(value).is_some()) {
                    values
                        .into_iter()
                        .filter(|value| parse_address(value).is_some_and(|a| accounts.contains(&a)))
                        .collect()
                } else {
                    Value::Array(values)
                }
            }
            (Self::LimitResponseLength(limit), Value::Array(mut values)) => {
                values.truncate(*limit);
                Value::Array(values)
            }
            (_, result) => result,
        }
    }
}

/// Applies all caveats to the params, in order.
///
/// Returns the kind of the first caveat that refused the call together with the reason.
pub fn apply_params(caveats: &[Caveat], params: Value) -> Result<Value, (CaveatType, CaveatError)> {
    caveats.iter().try_fold(params, |params, caveat| {
        caveat.apply_to_params(params).map_err(|err| (caveat.kind(), err))
    })
}

/// Applies all caveats to a successful result, in order.
pub fn apply_response(caveats: &[Caveat], result: Value) -> Value {
    caveats.iter().fold(result, |result, caveat| caveat.apply_to_response(result))
}

fn parse_address(value: &Value) -> Option<Address> {
    let s = value.as_str()?;
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    if hex.len() != 40 {
        return None;
    }
    s.parse().ok()
}

/// Addresses named by positional string params or by the `from` field of object params.
fn referenced_accounts(params: &Value) -> impl Iterator<Item = Address> + '_ {
    let values = match params {
        Value::Array(values) => values.as_slice(),
        _ => &[],
    };
    values.iter().filter_map(|value| match value {
        Value::Object(object) => object.get("from").and_then(parse_address),
        other => parse_address(other),
    })
}
