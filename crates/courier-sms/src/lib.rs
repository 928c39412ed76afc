// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Twilio-compatible SMS gateway adapter for Courier.
//!
//! [`HttpSmsGateway`] implements [`DispatchAdapter`] on top of [`SmsClient`].

pub mod client;
pub mod types;

use async_trait::async_trait;
use courier_config::model::SmsConfig;
use courier_core::{
    AdapterType, CourierError, DispatchAdapter, DispatchReceipt, HealthStatus, PluginAdapter,
};
use tracing::{debug, info};

pub use client::SmsClient;

/// SMS dispatch through an HTTP messages API.
pub struct HttpSmsGateway {
    client: SmsClient,
}

impl HttpSmsGateway {
    pub fn new(config: &SmsConfig) -> Result<Self, CourierError> {
        let client = SmsClient::new(config)?;
        info!(base_url = %config.base_url, "SMS gateway initialized");
        Ok(Self { client })
    }

    /// Creates a gateway with an existing client (for testing).
    pub fn with_client(client: SmsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginAdapter for HttpSmsGateway {
    fn name(&self) -> &str {
        "http-sms"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Dispatch
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(match self.client.probe().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Degraded(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[async_trait]
impl DispatchAdapter for HttpSmsGateway {
    async fn send(&self, recipient: &str, body: &str) -> Result<DispatchReceipt, CourierError> {
        let receipt = self.client.send_message(recipient, body).await?;
        debug!(
            account = %self.client.account_sid(),
            message_id = %receipt.message_id,
            status = %receipt.status,
            "message accepted by gateway"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(base_url: &str) -> HttpSmsGateway {
        let config = SmsConfig {
            base_url: base_url.to_string(),
            account_sid: Some("AC9".into()),
            auth_token: Some("token".into()),
            from_number: Some("+15550009999".into()),
            ..SmsConfig::default()
        };
        HttpSmsGateway::new(&config).unwrap()
    }

    #[tokio::test]
    async fn dispatch_adapter_sends_through_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC9/Messages.json"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "sid": "SM7",
                "status": "accepted",
                "price": null
            })))
            .mount(&server)
            .await;

        let adapter: Box<dyn DispatchAdapter> = Box::new(gateway(&server.uri()));
        let receipt = adapter.send("+15551234567", "ping").await.unwrap();
        assert_eq!(receipt.message_id, "SM7");
        assert_eq!(receipt.cost, None);
        assert_eq!(adapter.adapter_type(), AdapterType::Dispatch);
    }

    #[tokio::test]
    async fn unreachable_gateway_is_degraded() {
        let client = SmsClient::new(&SmsConfig {
            account_sid: Some("AC9".into()),
            auth_token: Some("token".into()),
            from_number: Some("+15550009999".into()),
            ..SmsConfig::default()
        })
        .unwrap()
        .with_base_url("http://127.0.0.1:9");
        let adapter = HttpSmsGateway::with_client(client);
        assert!(matches!(
            adapter.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
