//! Live HTTP gateway adapter backed by reqwest.

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::DarajaConfig;
use crate::gateway::{StkGateway, StkOutcome, StkPush};
use crate::DarajaError;

const TOKEN_PATH: &str = "/oauth/v1/generate?grant_type=client_credentials";
const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// STK Push request body, field names per the Daraja wire contract.
#[derive(Debug, Serialize)]
struct StkPushRequest<'a> {
    #[serde(rename = "BusinessShortCode")]
    business_short_code: &'a str,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "TransactionType")]
    transaction_type: &'static str,
    #[serde(rename = "Amount")]
    amount: i64,
    #[serde(rename = "PartyA")]
    party_a: &'a str,
    #[serde(rename = "PartyB")]
    party_b: &'a str,
    #[serde(rename = "PhoneNumber")]
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    #[serde(rename = "AccountReference", skip_serializing_if = "Option::is_none")]
    account_reference: Option<&'a str>,
    #[serde(rename = "TransactionDesc")]
    transaction_desc: &'a str,
}

/// STK Push response body. `ResponseCode` is a string on the wire.
#[derive(Debug, Deserialize)]
struct StkPushResponse {
    #[serde(rename = "ResponseCode")]
    response_code: String,
    #[serde(rename = "CheckoutRequestID", default)]
    checkout_request_id: Option<String>,
    #[serde(rename = "CustomerMessage", default)]
    customer_message: Option<String>,
    #[serde(rename = "ResponseDescription", default)]
    response_description: Option<String>,
}

/// Production [`StkGateway`] talking to the live Daraja API.
///
/// Stateless per call: every initiation exchanges credentials for a fresh
/// bearer token and makes a single push attempt within the configured
/// timeout. No retries — a duplicate prompt on the payer's phone is worse
/// than a surfaced failure.
#[derive(Debug)]
pub struct HttpStkGateway {
    config: DarajaConfig,
    client: reqwest::Client,
    base_url: String,
}

impl HttpStkGateway {
    /// Build a gateway from configuration.
    pub fn new(config: DarajaConfig) -> Result<Self, DarajaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DarajaError::NotConfigured {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        let base_url = config.base_url().to_string();
        Ok(Self {
            config,
            client,
            base_url,
        })
    }

    /// Override the API host. Test hook for pointing at a local stub.
    #[doc(hidden)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Exchange consumer credentials for a short-lived bearer token.
    ///
    /// Any failure — network, timeout, non-2xx, malformed body — is an
    /// [`DarajaError::AuthFailure`]; there is nothing the caller can do
    /// but surface it.
    pub async fn obtain_access_token(&self) -> Result<String, DarajaError> {
        let credentials = format!(
            "{}:{}",
            self.config.consumer_key, self.config.consumer_secret
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        let url = format!("{}{TOKEN_PATH}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {encoded}"))
            .send()
            .await
            .map_err(|e| DarajaError::AuthFailure {
                reason: format!("token request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DarajaError::AuthFailure {
                reason: format!("token endpoint returned HTTP {status}: {body}"),
            });
        }

        let token: TokenResponse =
            response.json().await.map_err(|e| DarajaError::AuthFailure {
                reason: format!("malformed token response: {e}"),
            })?;
        Ok(token.access_token)
    }

    /// Daraja request password: base64 of `shortcode + passkey + timestamp`.
    fn password(&self, timestamp: &str) -> String {
        let raw = format!("{}{}{timestamp}", self.config.shortcode, self.config.passkey);
        base64::engine::general_purpose::STANDARD.encode(raw)
    }

    /// Request timestamp in Daraja's `YYYYMMDDHHMMSS` format.
    fn timestamp() -> String {
        Utc::now().format("%Y%m%d%H%M%S").to_string()
    }

    fn map_send_error(&self, e: reqwest::Error) -> DarajaError {
        if e.is_timeout() {
            DarajaError::Timeout {
                elapsed_secs: self.config.timeout_secs,
            }
        } else {
            DarajaError::RequestFailure {
                reason: format!("stk push request failed: {e}"),
            }
        }
    }
}

#[async_trait]
impl StkGateway for HttpStkGateway {
    async fn initiate(&self, push: &StkPush) -> Result<StkOutcome, DarajaError> {
        let access_token = self.obtain_access_token().await?;

        let timestamp = Self::timestamp();
        let request = StkPushRequest {
            business_short_code: &self.config.shortcode,
            password: self.password(&timestamp),
            timestamp,
            transaction_type: push.instruction.transaction_type(),
            amount: push.amount,
            party_a: &push.msisdn,
            party_b: &self.config.shortcode,
            phone_number: &push.msisdn,
            callback_url: &self.config.callback_url,
            account_reference: push.instruction.account_reference(),
            transaction_desc: &push.description,
        };

        let url = format!("{}{STK_PUSH_PATH}", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // Daraja signals business rejections inside 4xx bodies too;
            // without a parseable ResponseDescription we can only report
            // the HTTP failure.
            if let Ok(parsed) = serde_json::from_str::<StkPushResponse>(&body) {
                if let Some(description) = parsed.response_description {
                    return Ok(StkOutcome::Rejected {
                        reason: description,
                    });
                }
            }
            return Err(DarajaError::RequestFailure {
                reason: format!("stk push endpoint returned HTTP {status}: {body}"),
            });
        }

        let parsed: StkPushResponse =
            response
                .json()
                .await
                .map_err(|e| DarajaError::RequestFailure {
                    reason: format!("malformed stk push response: {e}"),
                })?;

        if parsed.response_code == "0" {
            let checkout_request_id =
                parsed
                    .checkout_request_id
                    .ok_or_else(|| DarajaError::RequestFailure {
                        reason: "accepted response missing CheckoutRequestID".into(),
                    })?;
            tracing::info!(%checkout_request_id, "stk push accepted");
            Ok(StkOutcome::Accepted {
                checkout_request_id,
                customer_message: parsed
                    .customer_message
                    .unwrap_or_else(|| "Request accepted for processing".into()),
            })
        } else {
            let reason = parsed
                .response_description
                .or(parsed.customer_message)
                .unwrap_or_else(|| format!("response code {}", parsed.response_code));
            tracing::warn!(code = %parsed.response_code, %reason, "stk push rejected");
            Ok(StkOutcome::Rejected { reason })
        }
    }

    fn gateway_name(&self) -> &str {
        "HttpStkGateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DarajaEnvironment;
    use lipabill_core::PaymentInstruction;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> DarajaConfig {
        DarajaConfig {
            consumer_key: "ck".into(),
            consumer_secret: "cs".into(),
            shortcode: "174379".into(),
            passkey: "passkey".into(),
            callback_url: "https://example.com/callback".into(),
            environment: DarajaEnvironment::Sandbox,
            timeout_secs: 5,
        }
    }

    fn paybill_push() -> StkPush {
        StkPush {
            amount: 500,
            msisdn: "254712345678".into(),
            instruction: PaymentInstruction::Paybill {
                paybill_number: "888880".into(),
                account_number: "ACC-9".into(),
            },
            description: "Payment of water bill".into(),
        }
    }

    async fn gateway_against(server: &MockServer) -> HttpStkGateway {
        HttpStkGateway::new(config())
            .expect("client builds")
            .with_base_url(server.uri())
    }

    fn mock_token_ok() -> Mock {
        Mock::given(method("GET"))
            .and(path("/oauth/v1/generate"))
            .and(header("Authorization", "Basic Y2s6Y3M="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "token-123",
                "expires_in": "3599"
            })))
    }

    #[test]
    fn password_is_base64_of_shortcode_passkey_timestamp() {
        let gateway = HttpStkGateway::new(config()).expect("client builds");
        let password = gateway.password("20260823120000");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(password)
            .expect("valid base64");
        assert_eq!(decoded, b"174379passkey20260823120000");
    }

    #[test]
    fn timestamp_is_fourteen_digits() {
        let ts = HttpStkGateway::timestamp();
        assert_eq!(ts.len(), 14);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn accepted_response_yields_checkout_request_id() {
        let server = MockServer::start().await;
        mock_token_ok().mount(&server).await;
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .and(header("Authorization", "Bearer token-123"))
            .and(body_partial_json(serde_json::json!({
                "BusinessShortCode": "174379",
                "TransactionType": "CustomerPayBillOnline",
                "Amount": 500,
                "PhoneNumber": "254712345678",
                "AccountReference": "ACC-9"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResponseCode": "0",
                "ResponseDescription": "Success. Request accepted for processing",
                "CustomerMessage": "Success. Request accepted for processing"
            })))
            .mount(&server)
            .await;

        let gateway = gateway_against(&server).await;
        let outcome = gateway.initiate(&paybill_push()).await.expect("accepted");
        assert_eq!(
            outcome,
            StkOutcome::Accepted {
                checkout_request_id: "ws_CO_191220191020363925".into(),
                customer_message: "Success. Request accepted for processing".into(),
            }
        );
    }

    #[tokio::test]
    async fn till_push_omits_account_reference() {
        let server = MockServer::start().await;
        mock_token_ok().mount(&server).await;
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .and(body_partial_json(serde_json::json!({
                "TransactionType": "CustomerBuyGoodsOnline"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "CheckoutRequestID": "ws_CO_till_1",
                "ResponseCode": "0",
                "CustomerMessage": "ok"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_against(&server).await;
        let push = StkPush {
            instruction: PaymentInstruction::Till {
                till_number: "555111".into(),
            },
            ..paybill_push()
        };
        let outcome = gateway.initiate(&push).await.expect("accepted");
        assert!(matches!(outcome, StkOutcome::Accepted { .. }));

        // The mock's body matcher saw the request; additionally assert the
        // account reference never went over the wire.
        let requests = server.received_requests().await.expect("recorded");
        let stk = requests
            .iter()
            .find(|r| r.url.path() == "/mpesa/stkpush/v1/processrequest")
            .expect("stk request sent");
        let body: serde_json::Value = serde_json::from_slice(&stk.body).expect("json body");
        assert!(body.get("AccountReference").is_none());
    }

    #[tokio::test]
    async fn nonzero_response_code_is_business_rejection() {
        let server = MockServer::start().await;
        mock_token_ok().mount(&server).await;
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ResponseCode": "1",
                "ResponseDescription": "Invalid Amount"
            })))
            .mount(&server)
            .await;

        let gateway = gateway_against(&server).await;
        let outcome = gateway.initiate(&paybill_push()).await.expect("not an error");
        assert_eq!(
            outcome,
            StkOutcome::Rejected {
                reason: "Invalid Amount".into()
            }
        );
    }

    #[tokio::test]
    async fn token_endpoint_failure_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/v1/generate"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let gateway = gateway_against(&server).await;
        let result = gateway.initiate(&paybill_push()).await;
        assert!(matches!(result, Err(DarajaError::AuthFailure { .. })));
    }

    #[tokio::test]
    async fn stk_endpoint_server_error_is_request_failure() {
        let server = MockServer::start().await;
        mock_token_ok().mount(&server).await;
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let gateway = gateway_against(&server).await;
        let result = gateway.initiate(&paybill_push()).await;
        assert!(matches!(result, Err(DarajaError::RequestFailure { .. })));
    }

    #[tokio::test]
    async fn rejection_inside_4xx_body_is_surfaced_as_rejection() {
        let server = MockServer::start().await;
        mock_token_ok().mount(&server).await;
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ResponseCode": "404.001.03",
                "ResponseDescription": "Invalid Access Token"
            })))
            .mount(&server)
            .await;

        let gateway = gateway_against(&server).await;
        let outcome = gateway.initiate(&paybill_push()).await.expect("not an error");
        assert!(matches!(outcome, StkOutcome::Rejected { .. }));
    }
}
