//! Payment collaborator: Stripe Checkout via REST (no SDK dependency)
//!
//! The engine only needs two things from the provider: a redirect URL for a
//! freshly placed order, and a signed out-of-band outcome later on.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

use crate::orders::PaymentOutcome;

const CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

/// Maximum age of a signed webhook (seconds)
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment provider request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Payment provider rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(&'static str),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// One priced line on the checkout page
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// Everything the provider needs to open a session for one order
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order_id: String,
    pub order_number: u64,
    pub lines: Vec<CheckoutLine>,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
}

impl CheckoutRequest {
    /// Amount the customer is charged: lines + fee - discount
    pub fn total(&self) -> Decimal {
        let lines: Decimal = self
            .lines
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum();
        lines + self.delivery_fee - self.discount
    }
}

/// Creates payment sessions
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the session URL the customer is redirected to
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<String, PaymentError>;
}

/// Stripe Checkout gateway
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    currency: String,
    exchange_rate: Decimal,
    frontend_url: String,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("currency", &self.currency)
            .field("exchange_rate", &self.exchange_rate)
            .field("frontend_url", &self.frontend_url)
            .finish_non_exhaustive()
    }
}

impl StripeGateway {
    pub fn new(
        secret_key: impl Into<String>,
        currency: impl Into<String>,
        exchange_rate: Decimal,
        frontend_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            secret_key: secret_key.into(),
            currency: currency.into(),
            exchange_rate,
            frontend_url: frontend_url.into(),
        })
    }

    /// Form body for `POST /v1/checkout/sessions`
    fn checkout_form(&self, request: &CheckoutRequest) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = Vec::new();
        let mut push_line = |index: usize, name: &str, price: Decimal, quantity: u32| {
            let prefix = format!("line_items[{index}]");
            form.push((format!("{prefix}[price_data][currency]"), self.currency.clone()));
            form.push((format!("{prefix}[price_data][product_data][name]"), name.to_string()));
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                minor_units(price, self.exchange_rate).to_string(),
            ));
            form.push((format!("{prefix}[quantity]"), quantity.to_string()));
        };

        if request.discount > Decimal::ZERO {
            // Discounted orders are charged as one line at the order amount
            let label = format!("Order #{}", request.order_number);
            push_line(0, &label, request.total(), 1);
        } else {
            for (index, line) in request.lines.iter().enumerate() {
                push_line(index, &line.name, line.unit_price, line.quantity);
            }
            if request.delivery_fee > Decimal::ZERO {
                push_line(request.lines.len(), "Delivery Fee", request.delivery_fee, 1);
            }
        }

        let base = self.frontend_url.trim_end_matches('/');
        form.push(("mode".into(), "payment".into()));
        form.push((
            "success_url".into(),
            format!("{base}/verify?success=true&orderId={}", request.order_id),
        ));
        form.push((
            "cancel_url".into(),
            format!("{base}/verify?success=false&orderId={}", request.order_id),
        ));
        form.push(("metadata[order_id]".into(), request.order_id.clone()));
        form
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<String, PaymentError> {
        let resp: serde_json::Value = self
            .client
            .post(CHECKOUT_SESSIONS_URL)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&self.checkout_form(request))
            .send()
            .await?
            .json()
            .await?;

        resp["url"].as_str().map(String::from).ok_or_else(|| {
            let reason = resp["error"]["message"].as_str().unwrap_or("no session url returned");
            PaymentError::Rejected(reason.to_string())
        })
    }
}

/// Local price → provider minor units (`round(price × rate × 100)`, half away from zero)
pub fn minor_units(price: Decimal, exchange_rate: Decimal) -> i64 {
    (price * exchange_rate * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// Verify a Stripe webhook signature (HMAC-SHA256 over `{t}.{payload}`)
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
) -> Result<(), PaymentError> {
    verify_webhook_signature_at(payload, sig_header, secret, chrono::Utc::now().timestamp())
}

fn verify_webhook_signature_at(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = v;
        }
    }

    if timestamp.is_empty() || signature.is_empty() {
        return Err(PaymentError::InvalidSignature("malformed Stripe-Signature header"));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::InvalidSignature("HMAC key error"))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let sig_bytes =
        hex::decode(signature).map_err(|_| PaymentError::InvalidSignature("signature is not hex"))?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| PaymentError::InvalidSignature("signature mismatch"))?;

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::InvalidSignature("invalid timestamp"))?;
    if (now - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature("timestamp outside tolerance"));
    }

    Ok(())
}

/// Map a webhook event to `(order_id, outcome)`
///
/// Returns `Ok(None)` for event types that carry no payment outcome.
pub fn parse_webhook_outcome(
    event: &serde_json::Value,
) -> Result<Option<(String, PaymentOutcome)>, PaymentError> {
    let event_type = event["type"]
        .as_str()
        .ok_or_else(|| PaymentError::InvalidPayload("missing event type".into()))?;

    let outcome = match event_type {
        "checkout.session.completed" => PaymentOutcome::Success,
        "checkout.session.expired" | "checkout.session.async_payment_failed" => {
            PaymentOutcome::Failure
        }
        _ => return Ok(None),
    };

    let order_id = event["data"]["object"]["metadata"]["order_id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PaymentError::InvalidPayload(format!("{event_type} without order_id")))?;

    Ok(Some((order_id.to_string(), outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str, ts: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{ts}.").as_bytes());
        mac.update(payload);
        format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn gateway() -> StripeGateway {
        StripeGateway::new(
            "sk_test",
            "usd",
            Decimal::new(16943, 6),
            "http://localhost:5173/",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_minor_units_rounds_half_up() {
        // 100 × 0.016943 × 100 = 169.43
        assert_eq!(minor_units(Decimal::from(100), Decimal::new(16943, 6)), 169);
        assert_eq!(minor_units(Decimal::new(25, 1), Decimal::ONE), 250);
        assert_eq!(minor_units(Decimal::new(5, 3), Decimal::ONE), 1);
    }

    #[test]
    fn test_checkout_form_lines_and_urls() {
        let request = CheckoutRequest {
            order_id: "o1".into(),
            order_number: 1,
            lines: vec![CheckoutLine {
                name: "Adobo".into(),
                unit_price: Decimal::from(100),
                quantity: 2,
            }],
            delivery_fee: Decimal::from(15),
            discount: Decimal::ZERO,
        };
        let form = gateway().checkout_form(&request);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };

        assert_eq!(get("line_items[0][price_data][product_data][name]"), "Adobo");
        assert_eq!(get("line_items[0][price_data][unit_amount]"), "169");
        assert_eq!(get("line_items[0][quantity]"), "2");
        assert_eq!(get("line_items[1][price_data][product_data][name]"), "Delivery Fee");
        assert_eq!(get("line_items[1][price_data][unit_amount]"), "25");
        assert_eq!(get("mode"), "payment");
        assert_eq!(
            get("success_url"),
            "http://localhost:5173/verify?success=true&orderId=o1"
        );
        assert_eq!(
            get("cancel_url"),
            "http://localhost:5173/verify?success=false&orderId=o1"
        );
        assert_eq!(get("metadata[order_id]"), "o1");
    }

    #[test]
    fn test_checkout_form_skips_zero_fee() {
        let request = CheckoutRequest {
            order_id: "o1".into(),
            order_number: 1,
            lines: vec![],
            delivery_fee: Decimal::ZERO,
            discount: Decimal::ZERO,
        };
        let form = gateway().checkout_form(&request);
        assert!(!form.iter().any(|(_, v)| v == "Delivery Fee"));
    }

    #[test]
    fn test_checkout_form_charges_discounted_total_as_one_line() {
        let request = CheckoutRequest {
            order_id: "o7".into(),
            order_number: 7,
            lines: vec![CheckoutLine {
                name: "Adobo".into(),
                unit_price: Decimal::from(100),
                quantity: 1,
            }],
            delivery_fee: Decimal::from(15),
            discount: Decimal::from(100),
        };
        assert_eq!(request.total(), Decimal::from(15));

        let form = StripeGateway::new("sk_test", "php", Decimal::ONE, "http://x", Duration::from_secs(5))
            .unwrap()
            .checkout_form(&request);
        let names: Vec<&str> = form
            .iter()
            .filter(|(k, _)| k.ends_with("[product_data][name]"))
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(names, vec!["Order #7"]);

        let charged: i64 = form
            .iter()
            .filter(|(k, _)| k.ends_with("[unit_amount]"))
            .map(|(_, v)| v.parse::<i64>().unwrap())
            .sum();
        assert_eq!(charged, 1_500);
    }

    #[test]
    fn test_webhook_signature_accepts_valid() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign(payload, "whsec", 1_000);
        assert!(verify_webhook_signature_at(payload, &header, "whsec", 1_100).is_ok());
    }

    #[test]
    fn test_webhook_signature_rejects_tampering_and_replay() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign(payload, "whsec", 1_000);

        assert!(verify_webhook_signature_at(b"{}", &header, "whsec", 1_000).is_err());
        assert!(verify_webhook_signature_at(payload, &header, "other", 1_000).is_err());
        assert!(verify_webhook_signature_at(payload, &header, "whsec", 1_400).is_err());
        assert!(verify_webhook_signature_at(payload, "garbage", "whsec", 1_000).is_err());
    }

    #[test]
    fn test_parse_webhook_outcome() {
        let completed = serde_json::json!({
            "type": "checkout.session.completed",
            "data": { "object": { "metadata": { "order_id": "o1" } } }
        });
        assert_eq!(
            parse_webhook_outcome(&completed).unwrap(),
            Some(("o1".to_string(), PaymentOutcome::Success))
        );

        let expired = serde_json::json!({
            "type": "checkout.session.expired",
            "data": { "object": { "metadata": { "order_id": "o2" } } }
        });
        assert_eq!(
            parse_webhook_outcome(&expired).unwrap(),
            Some(("o2".to_string(), PaymentOutcome::Failure))
        );

        let other = serde_json::json!({ "type": "invoice.paid" });
        assert_eq!(parse_webhook_outcome(&other).unwrap(), None);

        let missing = serde_json::json!({ "type": "checkout.session.completed", "data": {} });
        assert!(parse_webhook_outcome(&missing).is_err());
    }
}
