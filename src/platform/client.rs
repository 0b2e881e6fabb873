// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the enclave platform REST API.

use std::fmt;

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use url::Url;

use super::types::{
    AttestationVerification, AttestationVerifyRequest, EnclaveDescriptor, EnclaveEnvelope,
    SignMessageRequest, SignTransactionRequest, SignTransactionResponse, SignTypedDataRequest,
    SignatureResponse,
};
use crate::config::PlatformConfig;
use crate::error::{Result, SignerError, TransportError};

/// Thin JSON client for the platform. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct PlatformClient {
    base_url: Url,
    api_key: Option<String>,
    http: Client,
}

impl fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}

impl PlatformClient {
    pub fn new(config: PlatformConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SignerError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url,
            api_key: config.api_key,
            http,
        })
    }

    /// Build a client from `ENCLAVE_PLATFORM_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::new(PlatformConfig::from_env()?)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /api/enclaves/{id}`
    pub async fn get_enclave(&self, enclave_id: &str) -> Result<EnclaveDescriptor, TransportError> {
        let url = self.endpoint(&["api", "enclaves", enclave_id])?;
        let envelope: EnclaveEnvelope = self.get_json(url).await?;
        Ok(envelope.into_descriptor())
    }

    /// `POST /api/enclaves/{id}/attestation/verify`
    pub async fn verify_attestation(
        &self,
        enclave_id: &str,
        request: &AttestationVerifyRequest,
    ) -> Result<AttestationVerification, TransportError> {
        let url = self.endpoint(&["api", "enclaves", enclave_id, "attestation", "verify"])?;
        self.post_json(url, request).await
    }

    /// `POST /api/enclaves/{id}/sign/transaction`
    pub async fn sign_transaction(
        &self,
        enclave_id: &str,
        unsigned_transaction: String,
    ) -> Result<SignTransactionResponse, TransportError> {
        let url = self.endpoint(&["api", "enclaves", enclave_id, "sign", "transaction"])?;
        self.post_json(
            url,
            &SignTransactionRequest {
                unsigned_transaction,
            },
        )
        .await
    }

    /// `POST /api/enclaves/{id}/sign/message`
    pub async fn sign_message(
        &self,
        enclave_id: &str,
        message: String,
    ) -> Result<SignatureResponse, TransportError> {
        let url = self.endpoint(&["api", "enclaves", enclave_id, "sign", "message"])?;
        self.post_json(url, &SignMessageRequest { message }).await
    }

    /// `POST /api/enclaves/{id}/sign/typed-data`
    pub async fn sign_typed_data(
        &self,
        enclave_id: &str,
        request: &SignTypedDataRequest,
    ) -> Result<SignatureResponse, TransportError> {
        let url = self.endpoint(&["api", "enclaves", enclave_id, "sign", "typed-data"])?;
        self.post_json(url, request).await
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, TransportError> {
        self.send(self.http.get(url)).await
    }

    async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.http.post(url).json(body)).await
    }

    /// Attach the API key, send, and decode the JSON response.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TransportError> {
        let request = match &self.api_key {
            Some(api_key) => request.bearer_auth(api_key),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        decode_response(response).await
    }
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::Http {
            status: status.as_u16(),
            message: error_message(&body, status.canonical_reason()),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| TransportError::Network(format!("failed to read response body: {e}")))?;
    serde_json::from_slice(&body).map_err(|e| TransportError::InvalidResponse(e.to_string()))
}

/// Pull a human-readable message out of an error body.
///
/// Tries `error` (string, or object with `message`), then `message`, then the
/// raw body, then the status reason.
fn error_message(body: &str, reason: Option<&str>) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        let nested = match json.get("error") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(obj)) => obj.get("message").and_then(Value::as_str).map(String::from),
            _ => None,
        };
        nested.or_else(|| json.get("message").and_then(Value::as_str).map(String::from))
    });

    from_json
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| reason.unwrap_or("unknown error").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> PlatformClient {
        PlatformClient::new(PlatformConfig::new(&server.uri()).unwrap()).unwrap()
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"enclave busy"}"#, None), "enclave busy");
        assert_eq!(
            error_message(r#"{"error":{"message":"nested"}}"#, None),
            "nested"
        );
        assert_eq!(error_message(r#"{"message":"plain"}"#, None), "plain");
        assert_eq!(error_message("upstream timeout", None), "upstream timeout");
        assert_eq!(
            error_message("", Some("Internal Server Error")),
            "Internal Server Error"
        );
    }

    #[test]
    fn endpoint_escapes_enclave_id_and_keeps_base_path() {
        let config = PlatformConfig::new("https://platform.example.com/v1/").unwrap();
        let client = PlatformClient::new(config).unwrap();
        let url = client
            .endpoint(&["api", "enclaves", "a/b c", "sign", "message"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://platform.example.com/v1/api/enclaves/a%2Fb%20c/sign/message"
        );
    }

    #[tokio::test]
    async fn get_enclave_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/enclaves/enc-1"))
            .and(header("authorization", "Bearer sk_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "enclave": {
                    "id": "enc-1",
                    "providerConfig": { "signingAddress": "0x0000000000000000000000000000000000000001" }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = PlatformConfig::new(&server.uri())
            .unwrap()
            .with_api_key("sk_test");
        let client = PlatformClient::new(config).unwrap();
        assert!(!format!("{client:?}").contains("sk_test"));
        let descriptor = client.get_enclave("enc-1").await.unwrap();
        assert_eq!(descriptor.id, "enc-1");
        assert_eq!(
            descriptor.signing_address(),
            Some("0x0000000000000000000000000000000000000001")
        );
    }

    #[tokio::test]
    async fn post_requests_send_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/enclaves/enc-1/sign/message"))
            .and(header("authorization", "Bearer sk_test"))
            .and(body_json(json!({ "message": "0x01" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "signature": "0xab" })))
            .expect(1)
            .mount(&server)
            .await;

        let config = PlatformConfig::new(&server.uri())
            .unwrap()
            .with_api_key("sk_test");
        let response = PlatformClient::new(config)
            .unwrap()
            .sign_message("enc-1", "0x01".to_string())
            .await
            .unwrap();
        assert_eq!(response.signature, "0xab");
    }

    #[tokio::test]
    async fn verify_attestation_posts_nonce() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/enclaves/enc-1/attestation/verify"))
            .and(body_json(json!({ "nonce": "n-1", "challenge": "n-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isValid": true,
                "verificationDetails": { "pcrs": "ok" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .verify_attestation(
                "enc-1",
                &AttestationVerifyRequest {
                    nonce: Some("n-1".to_string()),
                    challenge: Some("n-1".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(result.is_valid);
        assert_eq!(result.verification_details["pcrs"], "ok");
    }

    #[tokio::test]
    async fn http_errors_unwrap_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/enclaves/enc-1/sign/message"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "error": "enclave busy" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .sign_message("enc-1", "0x68656c6c6f".to_string())
            .await
            .unwrap_err();
        match err {
            TransportError::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "enclave busy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/enclaves/enc-1/sign/message"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .sign_message("enc-1", "0x00".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_platform_is_network_error() {
        let client = PlatformClient::new(PlatformConfig::new("http://127.0.0.1:1").unwrap()).unwrap();
        let err = client.get_enclave("enc-1").await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
        assert!(err.is_retryable());
    }
}
