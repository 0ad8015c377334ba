//! Stripe Checkout implementation of the payment gateway.
//!
//! Talks to the Stripe REST API directly with `reqwest` (form-encoded
//! requests, JSON responses). Only the two calls the checkout flow needs
//! are implemented: create a checkout session and retrieve one.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use ironcart_core::MinorUnits;

use super::{
    CreateSessionRequest, CreatedSession, GatewayError, PaymentGateway, PaymentStatus,
    SessionDetails, SessionMetadata,
};

const DEFAULT_API_BASE: &str = "https://api.stripe.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CURRENCY: &str = "usd";

/// Stripe Checkout client.
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

impl StripeGateway {
    /// Create a client for the live Stripe API.
    #[must_use]
    pub fn new(secret_key: SecretString) -> Self {
        Self::with_api_base(secret_key, DEFAULT_API_BASE.to_owned())
    }

    /// Create a client against an alternate API base (stripe-mock, tests).
    #[must_use]
    pub fn with_api_base(secret_key: SecretString, api_base: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_base,
            secret_key,
        }
    }

    /// POST a form-encoded request and decode the JSON response.
    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(format!("{}{path}", self.api_base))
            .basic_auth(self.secret_key.expose_secret(), None::<&str>)
            .form(form)
            .send()
            .await?;

        decode_response(response).await
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(format!("{}{path}", self.api_base))
            .basic_auth(self.secret_key.expose_secret(), None::<&str>)
            .send()
            .await?;

        decode_response(response).await
    }

    /// Create a single-use percent-off coupon on the gateway side.
    ///
    /// Stripe discounts reference a coupon object rather than altered line
    /// prices, so line items stay undiscounted and Stripe computes the
    /// authoritative total itself.
    async fn create_gateway_coupon(&self, percent_off: u8) -> Result<String, GatewayError> {
        let form = vec![
            ("percent_off".to_owned(), percent_off.to_string()),
            ("duration".to_owned(), "once".to_owned()),
        ];
        let coupon: StripeCoupon = self.post_form("/coupons", &form).await?;
        Ok(coupon.id)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(lines = request.line_items.len()))]
    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreatedSession, GatewayError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".to_owned(), "payment".to_owned()),
            ("payment_method_types[0]".to_owned(), "card".to_owned()),
            ("success_url".to_owned(), request.success_url.clone()),
            ("cancel_url".to_owned(), request.cancel_url.clone()),
        ];

        for (i, line) in request.line_items.iter().enumerate() {
            let unit_amount = MinorUnits::from_major(line.unit_price).ok_or_else(|| {
                GatewayError::Protocol(format!("unrepresentable price: {}", line.unit_price))
            })?;

            form.push((format!("line_items[{i}][quantity]"), line.quantity.to_string()));
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                CURRENCY.to_owned(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                unit_amount.to_string(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                line.name.clone(),
            ));
            if let Some(image) = &line.image {
                form.push((
                    format!("line_items[{i}][price_data][product_data][images][0]"),
                    image.clone(),
                ));
            }
        }

        if let Some(percent_off) = request.discount_percentage {
            let coupon_id = self.create_gateway_coupon(percent_off).await?;
            form.push(("discounts[0][coupon]".to_owned(), coupon_id));
        }

        for (key, value) in request.metadata.to_string_map()? {
            form.push((format!("metadata[{key}]"), value));
        }

        let session: StripeSession = self.post_form("/checkout/sessions", &form).await?;
        Ok(CreatedSession { id: session.id })
    }

    #[instrument(skip(self))]
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<SessionDetails, GatewayError> {
        let session: StripeSession = self
            .get_json(&format!("/checkout/sessions/{session_id}"))
            .await?;

        session.into_details()
    }
}

/// Turn an HTTP response into a decoded body or a gateway error.
///
/// Server-side failures and rate limits are `Unavailable` (retryable);
/// anything else unexpected is `Protocol`.
async fn decode_response<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    let status = response.status();

    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GatewayError::Unavailable(format!(
            "gateway answered {status}"
        )));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Protocol(format!(
            "gateway answered {status}: {body}"
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| GatewayError::Protocol(format!("response decode: {e}")))
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCoupon {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    payment_status: String,
    amount_total: Option<i64>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl StripeSession {
    fn into_details(self) -> Result<SessionDetails, GatewayError> {
        let payment_status = PaymentStatus::parse(&self.payment_status)?;

        // Only a paid session must carry a total; an unpaid one settles
        // as a no-op and never reads it.
        let amount_total = match payment_status {
            PaymentStatus::Paid => self
                .amount_total
                .ok_or_else(|| GatewayError::Protocol("paid session missing amount_total".to_owned()))?,
            PaymentStatus::Unpaid | PaymentStatus::NoPaymentRequired => {
                self.amount_total.unwrap_or(0)
            }
        };

        let metadata = SessionMetadata::from_string_map(&self.metadata)?;

        Ok(SessionDetails {
            id: self.id,
            payment_status,
            amount_total: MinorUnits::new(amount_total),
            metadata,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_decode() {
        let raw = r#"{
            "id": "cs_test_123",
            "payment_status": "paid",
            "amount_total": 9000,
            "metadata": {
                "user_id": "3",
                "coupon_code": "GIFTAB12CD",
                "items": "[{\"productId\":\"p1\",\"quantity\":1,\"unitPrice\":\"100.00\"}]"
            }
        }"#;

        let session: StripeSession = serde_json::from_str(raw).unwrap();
        let details = session.into_details().unwrap();

        assert_eq!(details.id, "cs_test_123");
        assert_eq!(details.payment_status, PaymentStatus::Paid);
        assert_eq!(details.amount_total, MinorUnits::new(9000));
        assert_eq!(details.metadata.coupon_code.as_deref(), Some("GIFTAB12CD"));
    }

    #[test]
    fn test_paid_session_missing_total_rejected() {
        let raw = r#"{
            "id": "cs_1",
            "payment_status": "paid",
            "amount_total": null,
            "metadata": {
                "user_id": "3",
                "coupon_code": "",
                "items": "[]"
            }
        }"#;
        let session: StripeSession = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            session.into_details(),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn test_unpaid_session_missing_total_is_benign() {
        let raw = r#"{
            "id": "cs_2",
            "payment_status": "unpaid",
            "amount_total": null,
            "metadata": {
                "user_id": "3",
                "coupon_code": "",
                "items": "[]"
            }
        }"#;
        let session: StripeSession = serde_json::from_str(raw).unwrap();
        let details = session.into_details().unwrap();
        assert_eq!(details.payment_status, PaymentStatus::Unpaid);
        assert_eq!(details.amount_total, MinorUnits::ZERO);
    }
}
