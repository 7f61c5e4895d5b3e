//! MoMo wallet gateway adapter.
//!
//! The raw signature strings below are byte-for-byte per MoMo's v2 API
//! documentation: key=value pairs in alphabetical key order, joined with
//! `&`, HMAC-SHA256 over the UTF-8 bytes, hex-encoded. A single reordered
//! or reformatted field fails verification on the provider side.

use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{config::MomoConfig, errors::ServiceError};

type HmacSha256 = Hmac<Sha256>;

pub const PROVIDER_NAME: &str = "momo";
const REQUEST_TYPE: &str = "captureWallet";
const LANG: &str = "vi";

/// Hex HMAC-SHA256 of `raw` under `secret`.
pub fn sign(secret: &str, raw: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(raw.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time verification of a hex signature over `raw`.
pub fn verify(secret: &str, raw: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(raw.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Asynchronous instant-payment notification delivered by MoMo once the
/// customer finishes (or abandons) the wallet flow. All fields are
/// provider-mandated; a missing field is rejected before signature checking.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpnNotification {
    pub partner_code: String,
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    pub order_info: String,
    pub order_type: String,
    pub trans_id: i64,
    pub result_code: i64,
    pub message: String,
    pub pay_type: String,
    pub response_time: i64,
    pub extra_data: String,
    pub signature: String,
}

impl IpnNotification {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

/// Acknowledgement echoed back to MoMo. Anything other than a 2xx with this
/// shape makes the provider redeliver.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpnAck {
    pub partner_code: String,
    pub order_id: String,
    pub request_id: String,
    pub result_code: i64,
    pub message: String,
}

impl IpnAck {
    pub fn accepted(n: &IpnNotification) -> Self {
        Self {
            partner_code: n.partner_code.clone(),
            order_id: n.order_id.clone(),
            request_id: n.request_id.clone(),
            result_code: 0,
            message: "Confirm Success".to_string(),
        }
    }

    pub fn rejected(n: &IpnNotification, message: &str) -> Self {
        Self {
            partner_code: n.partner_code.clone(),
            order_id: n.order_id.clone(),
            request_id: n.request_id.clone(),
            result_code: 1,
            message: message.to_string(),
        }
    }
}

/// Canonical string for an outbound create request.
pub fn create_raw_signature(
    cfg: &MomoConfig,
    amount: &str,
    order_id: &str,
    order_info: &str,
    request_id: &str,
) -> String {
    format!(
        "accessKey={}&amount={}&extraData=&ipnUrl={}&orderId={}&orderInfo={}&partnerCode={}&redirectUrl={}&requestId={}&requestType={}",
        cfg.access_key,
        amount,
        cfg.ipn_url,
        order_id,
        order_info,
        cfg.partner_code,
        cfg.redirect_url,
        request_id,
        REQUEST_TYPE,
    )
}

/// Canonical string for an inbound IPN. The field set overlaps the outbound
/// one but is not identical: the IPN adds the outcome fields and drops the
/// redirect/IPN URLs.
pub fn ipn_raw_signature(access_key: &str, n: &IpnNotification) -> String {
    format!(
        "accessKey={}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}&orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}&resultCode={}&transId={}",
        access_key,
        n.amount,
        n.extra_data,
        n.message,
        n.order_id,
        n.order_info,
        n.order_type,
        n.partner_code,
        n.pay_type,
        n.request_id,
        n.response_time,
        n.result_code,
        n.trans_id,
    )
}

/// Verifies an IPN's signature against the shared secret.
pub fn verify_ipn(cfg: &MomoConfig, n: &IpnNotification) -> bool {
    let raw = ipn_raw_signature(&cfg.access_key, n);
    verify(&cfg.secret_key, &raw, &n.signature)
}

/// Result of a successful gateway handshake.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub order_id: String,
    pub request_id: String,
    pub pay_url: String,
    pub raw_response: serde_json::Value,
}

/// Synchronous create response from the gateway. Only the fields the core
/// consumes are modeled; the full body is preserved in `extra_data`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    result_code: i64,
    message: Option<String>,
    pay_url: Option<String>,
}

/// HTTP client for MoMo's create API. No internal retries: the caller (or
/// the customer re-initiating payment) owns retry policy.
#[derive(Debug, Clone)]
pub struct MomoClient {
    config: MomoConfig,
    http: Client,
}

impl MomoClient {
    /// Fails when the HTTP client cannot be built; a client without the
    /// configured timeout must not come up at all.
    pub fn new(config: MomoConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::Other(anyhow::anyhow!("failed to build gateway HTTP client: {e}"))
            })?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &MomoConfig {
        &self.config
    }

    /// Requests a wallet payment, returning the redirect URL and the
    /// merchant order id that the IPN will echo back.
    #[instrument(skip(self), fields(order_info = %order_info))]
    pub async fn create_payment(
        &self,
        amount: Decimal,
        order_info: &str,
    ) -> Result<CreateOutcome, ServiceError> {
        // VND carries no minor unit: the gateway wants an integer string.
        let amount_str = amount
            .trunc()
            .to_i64()
            .map(|v| v.to_string())
            .ok_or(ServiceError::InternalServerError)?;

        let order_id = Uuid::new_v4().to_string();
        let request_id = Uuid::new_v4().to_string();
        let raw =
            create_raw_signature(&self.config, &amount_str, &order_id, order_info, &request_id);
        let signature = sign(&self.config.secret_key, &raw);

        let payload = json!({
            "partnerCode": self.config.partner_code,
            "partnerName": self.config.partner_name,
            "storeId": self.config.store_id,
            "requestId": request_id,
            "amount": amount_str,
            "orderId": order_id,
            "orderInfo": order_info,
            "redirectUrl": self.config.redirect_url,
            "ipnUrl": self.config.ipn_url,
            "lang": LANG,
            "extraData": "",
            "requestType": REQUEST_TYPE,
            "signature": signature,
        });

        info!(%order_id, amount = %amount_str, "requesting gateway payment");

        let response = self
            .http
            .post(&self.config.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "gateway unreachable");
                ServiceError::ExternalServiceError(format!("Gateway unavailable: {}", e))
            })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| {
            error!(error = %e, "gateway returned undecodable body");
            ServiceError::ExternalApiError(format!("Malformed gateway response: {}", e))
        })?;

        if !status.is_success() {
            error!(%status, "gateway rejected create request");
            return Err(ServiceError::ExternalApiError(format!(
                "Gateway returned {}",
                status
            )));
        }

        let parsed: CreateResponse = serde_json::from_value(body.clone()).map_err(|e| {
            ServiceError::ExternalApiError(format!("Unexpected gateway response shape: {}", e))
        })?;

        if parsed.result_code != 0 {
            warn!(result_code = parsed.result_code, "gateway declined create request");
            return Err(ServiceError::ExternalApiError(format!(
                "Gateway declined request: {}",
                parsed.message.unwrap_or_else(|| "unknown".to_string())
            )));
        }

        let pay_url = parsed.pay_url.ok_or_else(|| {
            ServiceError::ExternalApiError("Gateway response missing payUrl".to_string())
        })?;

        Ok(CreateOutcome {
            order_id,
            request_id,
            pay_url,
            raw_response: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_config() -> MomoConfig {
        MomoConfig {
            ipn_url: "https://merchant.example/api/v1/payments/momo/ipn".to_string(),
            redirect_url: "https://merchant.example/payments/momo/return".to_string(),
            ..MomoConfig::default()
        }
    }

    fn sample_ipn() -> IpnNotification {
        IpnNotification {
            partner_code: "MOMO".to_string(),
            order_id: "ord-1".to_string(),
            request_id: "req-1".to_string(),
            amount: 2_250_000,
            order_info: "Tour booking".to_string(),
            order_type: "momo_wallet".to_string(),
            trans_id: 4_088_878_653,
            result_code: 0,
            message: "Successful.".to_string(),
            pay_type: "qr".to_string(),
            response_time: 1_700_000_000_000,
            extra_data: String::new(),
            signature: String::new(),
        }
    }

    #[test]
    fn create_signature_matches_known_vector() {
        let cfg = test_config();
        let raw = create_raw_signature(&cfg, "50000", "ord-1", "Tour booking", "req-1");
        assert_eq!(
            sign(&cfg.secret_key, &raw),
            "e3f11eb9ff78a5a77929bc7d9c6e05b6210078dd0d94e0202839a17663e72cf9"
        );
    }

    #[test]
    fn ipn_signature_matches_known_vector() {
        let cfg = test_config();
        let raw = ipn_raw_signature(&cfg.access_key, &sample_ipn());
        assert_eq!(
            sign(&cfg.secret_key, &raw),
            "7efa83a7286356112132045f86df867fa2c5be5f30c8f522ded52344ac2842e1"
        );
    }

    #[test]
    fn verify_ipn_accepts_valid_and_rejects_tampered() {
        let cfg = test_config();
        let mut n = sample_ipn();
        n.signature = sign(&cfg.secret_key, &ipn_raw_signature(&cfg.access_key, &n));
        assert!(verify_ipn(&cfg, &n));

        // One byte changed in amount invalidates the old signature
        n.amount += 1;
        assert!(!verify_ipn(&cfg, &n));
    }

    #[test]
    fn verify_rejects_non_hex_signature() {
        assert!(!verify("secret", "raw", "not-hex!!"));
    }

    #[test]
    fn client_builds_with_configured_timeout() {
        assert!(MomoClient::new(test_config()).is_ok());
    }

    #[test]
    fn amount_truncates_to_integer_string() {
        assert_eq!(dec!(2250000.00).trunc().to_i64(), Some(2_250_000));
        assert_eq!(dec!(99.99).trunc().to_i64(), Some(99));
    }
}
