//! Telegram WebApp init data verification.
//!
//! Telegram signs the query string it hands to a WebApp. The signing key is
//! `HMAC_SHA256(key = "WebAppData", msg = bot_token)`; the signature is the
//! hex HMAC of the "data check string": every field except `hash`, decoded,
//! sorted by key and joined as `key=value` lines.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const WEB_APP_KEY: &[u8] = b"WebAppData";

/// Why init data was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitDataError {
    /// No `hash` field.
    #[error("init data is not signed")]
    MissingHash,

    /// The signature does not match.
    #[error("init data signature mismatch")]
    BadSignature,

    /// `auth_date` is older than allowed.
    #[error("init data expired")]
    Expired,

    /// A field could not be read.
    #[error("malformed init data: {0}")]
    Malformed(String),
}

/// The Telegram user embedded in init data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelegramUser {
    /// Telegram user ID.
    pub id: i64,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Username, if the user has one.
    #[serde(default)]
    pub username: Option<String>,
}

/// Verified init data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitData {
    /// The user who opened the WebApp, when present.
    pub user: Option<TelegramUser>,
    /// When Telegram issued the data.
    pub auth_date: Option<DateTime<Utc>>,
    /// Start parameter (deep-link payload), when present.
    pub start_param: Option<String>,
}

/// Compute HMAC-SHA256.
fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, InitDataError> {
    // HMAC accepts keys of any length; the error arm is unreachable in practice.
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| InitDataError::Malformed(format!("hmac key: {e}")))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Compute HMAC-SHA256 and return hex-encoded result.
fn signature_hex(bot_token: &str, data_check_string: &str) -> Result<String, InitDataError> {
    let secret = hmac_sha256(WEB_APP_KEY, bot_token.as_bytes())?;
    Ok(hex::encode(hmac_sha256(&secret, data_check_string.as_bytes())?))
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .filter(|(k, _)| k.as_str() != "hash")
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Verify `init_data` against `bot_token`.
///
/// With `max_age`, data issued longer ago than that (relative to `now`) is
/// rejected.
///
/// # Errors
///
/// Returns an [`InitDataError`] describing the first problem found.
pub fn verify_init_data(
    init_data: &str,
    bot_token: &str,
    max_age: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<InitData, InitDataError> {
    let fields: BTreeMap<String, String> = url::form_urlencoded::parse(init_data.as_bytes())
        .into_owned()
        .collect();

    let hash = fields.get("hash").ok_or(InitDataError::MissingHash)?;
    let expected = signature_hex(bot_token, &data_check_string(&fields))?;
    if !constant_time_eq(&hash.to_ascii_lowercase(), &expected) {
        return Err(InitDataError::BadSignature);
    }

    let auth_date = fields
        .get("auth_date")
        .map(|raw| {
            raw.parse::<i64>()
                .ok()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .ok_or_else(|| InitDataError::Malformed(format!("auth_date '{raw}'")))
        })
        .transpose()?;

    if let Some(max_age) = max_age {
        let issued = auth_date.ok_or_else(|| InitDataError::Malformed("missing auth_date".into()))?;
        let age = (now - issued).to_std().unwrap_or(Duration::ZERO);
        if age > max_age {
            return Err(InitDataError::Expired);
        }
    }

    let user = fields
        .get("user")
        .map(|raw| {
            serde_json::from_str::<TelegramUser>(raw)
                .map_err(|e| InitDataError::Malformed(format!("user: {e}")))
        })
        .transpose()?;

    Ok(InitData {
        user,
        auth_date,
        start_param: fields.get("start_param").cloned(),
    })
}

/// Build a signed init data string, the way Telegram does.
///
/// Used by test clients and local tooling that need to call endpoints
/// guarded by init data.
///
/// # Errors
///
/// Returns an [`InitDataError`] if signing fails.
pub fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> Result<String, InitDataError> {
    let map: BTreeMap<String, String> = fields
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let hash = signature_hex(bot_token, &data_check_string(&map))?;

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in fields {
        serializer.append_pair(k, v);
    }
    serializer.append_pair("hash", &hash);
    Ok(serializer.finish())
}
