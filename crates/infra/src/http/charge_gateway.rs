//! Charge gateway over HTTP
//!
//! Posts the charge as a form body with bearer auth and an `Idempotency-Key`
//! header. The JSON reply is reduced to a [`ProviderResponse`]: `id` on
//! success, `error.code` / `error.message` otherwise.

use async_trait::async_trait;
use paysched_core::ChargeGateway;
use paysched_domain::{ChargeRequest, ProviderResponse, TransportError};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::client::HttpClient;

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Default, Deserialize)]
struct ChargeBody {
    id: Option<String>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    decline_code: Option<String>,
    message: Option<String>,
}

/// [`ChargeGateway`] backed by [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpChargeGateway {
    client: HttpClient,
}

impl HttpChargeGateway {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChargeGateway for HttpChargeGateway {
    #[instrument(skip_all, fields(item = %request.item_id))]
    async fn submit(
        &self,
        endpoint: &str,
        request: &ChargeRequest,
        api_key: &str,
    ) -> Result<ProviderResponse, TransportError> {
        let fields = request.form_fields();
        let builder = self
            .client
            .request(Method::POST, endpoint)
            .bearer_auth(api_key)
            .header(IDEMPOTENCY_HEADER, &request.idempotency_key)
            .form(&fields[..]);

        let response = self.client.send(builder).await?;
        let status = response.status().as_u16();

        // The provider answered; an unreadable body still leaves the status to
        // classify by.
        let body = match response.text().await {
            Ok(text) => parse_body(&text),
            Err(error) => {
                debug!(status, %error, "Could not read provider response body");
                ChargeBody::default()
            }
        };

        Ok(to_response(status, body))
    }
}

fn parse_body(text: &str) -> ChargeBody {
    serde_json::from_str(text).unwrap_or_else(|error| {
        debug!(%error, "Provider response is not JSON");
        ChargeBody::default()
    })
}

fn to_response(status: u16, body: ChargeBody) -> ProviderResponse {
    let (error_code, message) = match body.error {
        // A card decline carries the specific reason in `decline_code`.
        Some(error) => (error.decline_code.or(error.code), error.message),
        None => (None, None),
    };
    ProviderResponse { status, reference: body.id, error_code, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_decline_code_over_generic_code() {
        let body = parse_body(
            r#"{"error":{"code":"card_declined","decline_code":"insufficient_funds","message":"Your card has insufficient funds."}}"#,
        );
        let response = to_response(402, body);

        assert_eq!(response.error_code.as_deref(), Some("insufficient_funds"));
        assert_eq!(response.message.as_deref(), Some("Your card has insufficient funds."));
        assert_eq!(response.reference, None);
    }

    #[test]
    fn non_json_body_keeps_status() {
        let response = to_response(502, parse_body("<html>Bad Gateway</html>"));
        assert_eq!(response, ProviderResponse::error(502, None, None));
    }
}
