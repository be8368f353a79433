//! Conversions from external infrastructure errors into domain errors.

use paysched_domain::{PaySchedError, TransportError};
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub PaySchedError);

impl From<InfraError> for PaySchedError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<PaySchedError> for InfraError {
    fn from(value: PaySchedError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoPaySchedError {
    fn into_paysched(self) -> PaySchedError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → PaySchedError / TransportError */
/* -------------------------------------------------------------------------- */

impl IntoPaySchedError for HttpError {
    fn into_paysched(self) -> PaySchedError {
        if self.is_timeout() {
            return PaySchedError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return PaySchedError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return PaySchedError::Config(format!("invalid HTTP client setup: {self}"));
        }

        PaySchedError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_paysched())
    }
}

/// Classify a failed request for the retry loop.
///
/// Only failures that never produced a response land here; a response with
/// any status is classified by the caller instead.
pub fn transport_error(error: &HttpError) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* File formats → PaySchedError */
/* -------------------------------------------------------------------------- */

impl IntoPaySchedError for serde_json::Error {
    fn into_paysched(self) -> PaySchedError {
        PaySchedError::Config(format!("Invalid JSON format: {self}"))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        Self(value.into_paysched())
    }
}

impl IntoPaySchedError for toml::de::Error {
    fn into_paysched(self) -> PaySchedError {
        PaySchedError::Config(format!("Invalid TOML format: {self}"))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        Self(value.into_paysched())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::Duration;

    use reqwest::Client;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn refused_connection_maps_to_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(format!("http://{addr}")).send().await.unwrap_err();

        assert!(matches!(transport_error(&error), TransportError::Connect(_)));
        let mapped: PaySchedError = InfraError::from(error).into();
        assert!(matches!(mapped, PaySchedError::Network(_)));
    }

    #[tokio::test]
    async fn slow_response_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client =
            Client::builder().no_proxy().timeout(Duration::from_millis(50)).build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap_err();

        assert_eq!(transport_error(&error), TransportError::Timeout);
    }

    #[test]
    fn malformed_json_maps_to_config_error() {
        let error = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let mapped: PaySchedError = InfraError::from(error).into();
        match mapped {
            PaySchedError::Config(msg) => assert!(msg.contains("JSON")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
