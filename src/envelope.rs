//! Typed view of the upstream JSON envelope.
//!
//! Upstream answers every auth call with one loosely-shaped object
//! (`success` plus optional fields). [`UpstreamOutcome`] splits it into a
//! success payload and a [`UpstreamRejection`] whose auxiliary fields are typed.

use axum::http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamEnvelope {
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64", skip_serializing_if = "Option::is_none")]
    pub lock_minutes: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Fields the gateway does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Upstream is loosely typed. A recognized field of an unexpected type reads
// as absent (or is coerced when the meaning is unambiguous) instead of
// failing the whole envelope.

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => Some(b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    // Fractional minutes round up so a lockout is never under-reported.
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.ceil() as u64)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| *f >= 0.0)
            .map(|f| f.ceil() as u64),
        _ => None,
    })
}

/// A non-2xx (or `success: false`) upstream reply.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRejection {
    pub status: StatusCode,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub lock_minutes: Option<u64>,
    pub account_status: Option<String>,
    /// Body exactly as it will be relayed.
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamOutcome {
    Ok(UpstreamEnvelope),
    Err(UpstreamRejection),
}

impl UpstreamOutcome {
    pub fn from_parts(status: StatusCode, body: &[u8]) -> Self {
        let raw: Option<Value> = serde_json::from_slice(body).ok();
        let envelope: UpstreamEnvelope = raw
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        if status.is_success() && envelope.success != Some(false) {
            return UpstreamOutcome::Ok(envelope);
        }

        // A 2xx carrying `success: false` is still a rejection; it goes out as 400.
        let status = if status.is_success() {
            StatusCode::BAD_REQUEST
        } else {
            status
        };

        let body = match raw {
            Some(value @ Value::Object(_)) => value,
            _ => json!({
                "success": false,
                "error": "Upstream request failed",
            }),
        };

        UpstreamOutcome::Err(UpstreamRejection {
            status,
            error: envelope.error,
            error_code: envelope.error_code,
            lock_minutes: envelope.lock_minutes,
            account_status: envelope.status,
            body,
        })
    }
}

impl UpstreamRejection {
    /// A rejection decided by the gateway itself, shaped like an upstream one.
    pub fn local(status: StatusCode, code: &str, message: &str) -> Self {
        Self {
            status,
            error: Some(message.to_string()),
            error_code: Some(code.to_string()),
            lock_minutes: None,
            account_status: None,
            body: json!({
                "success": false,
                "error": message,
                "error_code": code,
            }),
        }
    }

    /// Keep only the recognized error fields in the relayed body.
    ///
    /// Values are copied as upstream sent them; `lock_minutes` and `status`
    /// appear only when present.
    pub fn summarized(mut self) -> Self {
        let raw = self.body.as_object();
        let field = |key: &str| raw.and_then(|o| o.get(key)).filter(|v| !v.is_null()).cloned();

        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(false));
        body.insert(
            "error".into(),
            field("error")
                .or_else(|| self.error.clone().map(Value::String))
                .unwrap_or_else(|| Value::String("Request failed".into())),
        );
        for key in ["error_code", "lock_minutes", "status"] {
            if let Some(value) = field(key) {
                body.insert(key.into(), value);
            }
        }

        self.body = Value::Object(body);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let body = br#"{"success":true,"user":{"id":7},"access_token":"a","refresh_token":"r","expires_in":900,"tier":"gold"}"#;
        match UpstreamOutcome::from_parts(StatusCode::OK, body) {
            UpstreamOutcome::Ok(env) => {
                assert_eq!(env.access_token.as_deref(), Some("a"));
                assert_eq!(env.expires_in, Some(900));
                assert_eq!(env.refresh_expires_in, None);
                assert_eq!(env.extra.get("tier"), Some(&json!("gold")));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_lockout_fields_are_typed() {
        let body = br#"{"success":false,"error":"Account locked","error_code":"ACCOUNT_LOCKED","lock_minutes":15}"#;
        let UpstreamOutcome::Err(rejection) = UpstreamOutcome::from_parts(StatusCode::LOCKED, body)
        else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.status, StatusCode::LOCKED);
        assert_eq!(rejection.lock_minutes, Some(15));
        assert_eq!(rejection.error_code.as_deref(), Some("ACCOUNT_LOCKED"));
    }

    #[test]
    fn test_success_false_on_200_is_rejection() {
        let body = br#"{"success":false,"error":"nope"}"#;
        let outcome = UpstreamOutcome::from_parts(StatusCode::OK, body);
        assert!(matches!(
            outcome,
            UpstreamOutcome::Err(UpstreamRejection { status: StatusCode::BAD_REQUEST, .. })
        ));
    }

    #[test]
    fn test_non_json_failure_gets_generic_body() {
        let outcome = UpstreamOutcome::from_parts(StatusCode::BAD_GATEWAY, b"<html>oops</html>");
        let UpstreamOutcome::Err(rejection) = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.status, StatusCode::BAD_GATEWAY);
        assert_eq!(rejection.body["success"], false);
    }

    #[test]
    fn test_mistyped_auxiliary_fields_keep_the_rest() {
        let body = br#"{"success":false,"error":"Account locked","error_code":"ACCOUNT_LOCKED","lock_minutes":15,"status":423}"#;
        let UpstreamOutcome::Err(rejection) = UpstreamOutcome::from_parts(StatusCode::LOCKED, body)
        else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.error_code.as_deref(), Some("ACCOUNT_LOCKED"));
        assert_eq!(rejection.lock_minutes, Some(15));
        assert_eq!(rejection.account_status.as_deref(), Some("423"));
        assert_eq!(
            rejection.summarized().body,
            json!({
                "success": false,
                "error": "Account locked",
                "error_code": "ACCOUNT_LOCKED",
                "lock_minutes": 15,
                "status": 423,
            })
        );
    }

    #[test]
    fn test_fractional_lock_minutes_round_up() {
        let body = br#"{"success":false,"error":"Account locked","error_code":"ACCOUNT_LOCKED","lock_minutes":14.5}"#;
        let UpstreamOutcome::Err(rejection) = UpstreamOutcome::from_parts(StatusCode::LOCKED, body)
        else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.lock_minutes, Some(15));
        assert_eq!(rejection.error_code.as_deref(), Some("ACCOUNT_LOCKED"));
        assert_eq!(rejection.summarized().body["lock_minutes"], json!(14.5));
    }

    #[test]
    fn test_odd_ttl_types_do_not_lose_tokens() {
        let body = br#"{"success":true,"access_token":"a","refresh_token":"r","expires_in":"900","refresh_expires_in":3600.7}"#;
        let UpstreamOutcome::Ok(env) = UpstreamOutcome::from_parts(StatusCode::OK, body) else {
            panic!("expected success");
        };
        assert_eq!(env.access_token.as_deref(), Some("a"));
        assert_eq!(env.refresh_token.as_deref(), Some("r"));
        assert_eq!(env.expires_in, Some(900));
        assert_eq!(env.refresh_expires_in, Some(3600));
    }

    #[test]
    fn test_unusable_ttl_reads_as_absent() {
        let body = br#"{"success":true,"access_token":"a","refresh_token":"r","expires_in":{"seconds":900}}"#;
        let UpstreamOutcome::Ok(env) = UpstreamOutcome::from_parts(StatusCode::OK, body) else {
            panic!("expected success");
        };
        assert_eq!(env.expires_in, None);
        assert_eq!(env.access_token.as_deref(), Some("a"));
    }

    #[test]
    fn test_summarized_drops_unrecognized_fields() {
        let body = br#"{"success":false,"error":"Disabled","error_code":"ACCOUNT_DISABLED","status":"disabled","trace_id":"abc"}"#;
        let outcome = UpstreamOutcome::from_parts(StatusCode::FORBIDDEN, body);
        let UpstreamOutcome::Err(rejection) = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(
            rejection.summarized().body,
            json!({
                "success": false,
                "error": "Disabled",
                "error_code": "ACCOUNT_DISABLED",
                "status": "disabled",
            })
        );
    }
}
