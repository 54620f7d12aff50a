use crate::ledger::{LastPaymentLookup, LedgerClient, LedgerError, SaveOutcome};
use crate::types::payment::PaymentEvent;
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Ledger service reached over HTTP/JSON
pub struct HttpLedgerClient {
    pub base_url: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

impl HttpLedgerClient {
    pub fn new(base_url: &str, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_ms,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<Response, LedgerError> {
        self.client
            .post(self.url(path))
            .json(body)
            .timeout(Duration::from_millis(self.timeout_ms))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Unavailable(format!("{} timed out after {}ms", path, self.timeout_ms))
                } else {
                    LedgerError::Unavailable(e.to_string())
                }
            })
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn get_last_payment(&self, payer_card: &str) -> Result<LastPaymentLookup, LedgerError> {
        let resp = self
            .post("last-payment", &json!({ "payerCardNumber": payer_card }))
            .await?;

        let status = resp.status();
        if status.is_success() {
            let payment = resp
                .json::<PaymentEvent>()
                .await
                .map_err(|e| LedgerError::Unavailable(format!("malformed last payment: {}", e)))?;
            debug!(payer_card = %payer_card, payment_id = payment.id, "Ledger returned last payment");
            return Ok(LastPaymentLookup::Found(payment));
        }

        let reason = error_reason(resp).await;
        match status {
            StatusCode::NOT_FOUND => {
                debug!(payer_card = %payer_card, reason = %reason, "Ledger has no payment for payer");
                Ok(LastPaymentLookup::NotFound)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                warn!(payer_card = %payer_card, reason = %reason, "Ledger rejected last payment lookup");
                Ok(LastPaymentLookup::Rejected(reason))
            }
            _ => Err(LedgerError::Unavailable(format!(
                "last-payment returned HTTP {}: {}",
                status.as_u16(),
                reason
            ))),
        }
    }

    async fn save_payment(&self, payment: &PaymentEvent) -> Result<SaveOutcome, LedgerError> {
        let body = serde_json::to_value(payment)
            .map_err(|e| LedgerError::Unavailable(format!("unencodable payment: {}", e)))?;
        let resp = self.post("save", &body).await?;

        let status = resp.status();
        if status.is_success() {
            debug!(payment_id = payment.id, "Ledger stored payment");
            return Ok(SaveOutcome::Saved);
        }

        let reason = error_reason(resp).await;
        match status {
            StatusCode::CONFLICT => Ok(SaveOutcome::Conflict(reason)),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Ok(SaveOutcome::InvalidInput(reason))
            }
            _ => Err(LedgerError::Unavailable(format!(
                "save returned HTTP {}: {}",
                status.as_u16(),
                reason
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    violations: Vec<Violation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Violation {
    field_name: String,
    message: String,
}

async fn error_reason(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    describe_error(status, &body)
}

/// Readable reason from a ledger error body: either `{"message"}` or a list
/// of field violations. Falls back to the status text.
fn describe_error(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<ErrorBody>(body).unwrap_or_default();

    if let Some(message) = parsed.message {
        return message;
    }
    if !parsed.violations.is_empty() {
        return parsed
            .violations
            .iter()
            .map(|v| format!("The field: {} has error: {};", v.field_name, v.message))
            .collect();
    }

    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_message_body() {
        let reason = describe_error(
            StatusCode::NOT_FOUND,
            r#"{"message":"payment for card 123456 not found"}"#,
        );
        assert_eq!(reason, "payment for card 123456 not found");
    }

    #[test]
    fn test_describe_violations_body() {
        let body = r#"{"violations":[
            {"fieldName":"payerCardNumber","message":"must not be blank"},
            {"fieldName":"date","message":"must be in the past"}
        ]}"#;

        let reason = describe_error(StatusCode::BAD_REQUEST, body);

        assert_eq!(
            reason,
            "The field: payerCardNumber has error: must not be blank;\
             The field: date has error: must be in the past;"
        );
    }

    #[test]
    fn test_describe_unparseable_body() {
        assert_eq!(describe_error(StatusCode::CONFLICT, "<html>"), "Conflict");
        assert_eq!(describe_error(StatusCode::BAD_REQUEST, ""), "Bad Request");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = HttpLedgerClient::new("http://localhost:8082/payment/", 1000);
        assert_eq!(client.url("save"), "http://localhost:8082/payment/save");
    }
}
