//! HTTP client for the payment-link and recommendation endpoints
//!
//! `POST {base}/api/stripe/create-payment-link`, `POST {base}/api/ai/recommendations`.
//! Both answer `{ "error": "..." }` on failure, sometimes with a 2xx status.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{PaymentLink, PaymentLinkRequest, PaymentLinkService, RecommendationRequest, RecommendationService};
use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};

const PAYMENT_LINK_PATH: &str = "/api/stripe/create-payment-link";
const RECOMMENDATIONS_PATH: &str = "/api/ai/recommendations";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkReply {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    link_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl LinkReply {
    fn into_link(self) -> ServiceResult<PaymentLink> {
        if let Some(error) = self.error {
            return Err(ServiceError::Api(error));
        }
        if self.success == Some(false) {
            return Err(ServiceError::Api("Payment link was not created".into()));
        }
        match (self.url, self.link_id) {
            (Some(link_url), Some(link_id)) => Ok(PaymentLink { link_url, link_id }),
            _ => Err(ServiceError::InvalidResponse("missing url or linkId".into())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecommendationReply {
    #[serde(default)]
    recommendations: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl RecommendationReply {
    fn into_text(self) -> ServiceResult<String> {
        if let Some(error) = self.error {
            return Err(ServiceError::Api(error));
        }
        self.recommendations
            .ok_or_else(|| ServiceError::InvalidResponse("missing recommendations".into()))
    }
}

/// reqwest-backed implementation of both service traits
#[derive(Debug, Clone)]
pub struct HttpServices {
    client: Client,
    base_url: String,
}

impl HttpServices {
    pub fn new(config: &ServiceConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> ServiceResult<T> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Error bodies carry `{ "error": ... }`; anything else is reported verbatim
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ServiceResult<T> {
        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<T>(&text) {
            Ok(body) => Ok(body),
            Err(_) if !status.is_success() => Err(ServiceError::Api(if text.trim().is_empty() {
                status.to_string()
            } else {
                text
            })),
            Err(e) => Err(ServiceError::InvalidResponse(e.to_string())),
        }
    }
}

#[async_trait]
impl PaymentLinkService for HttpServices {
    async fn create_link(&self, request: &PaymentLinkRequest) -> ServiceResult<PaymentLink> {
        tracing::debug!(amount = %request.amount, plan = %request.plan_label, "Creating payment link");
        let reply: LinkReply = self.post(PAYMENT_LINK_PATH, request).await?;
        let link = reply.into_link()?;
        tracing::info!(link_id = %link.link_id, "Payment link created");
        Ok(link)
    }
}

#[async_trait]
impl RecommendationService for HttpServices {
    async fn recommend(&self, request: &RecommendationRequest) -> ServiceResult<String> {
        let reply: RecommendationReply = self.post(RECOMMENDATIONS_PATH, request).await?;
        reply.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_reply() {
        let reply: LinkReply =
            serde_json::from_value(json!({"success": true, "url": "https://pay/x", "linkId": "plink_1"})).unwrap();
        let link = reply.into_link().unwrap();
        assert_eq!(link.link_url, "https://pay/x");
        assert_eq!(link.link_id, "plink_1");

        let reply: LinkReply = serde_json::from_value(json!({"error": "Invalid amount"})).unwrap();
        assert!(matches!(reply.into_link(), Err(ServiceError::Api(msg)) if msg == "Invalid amount"));

        let reply: LinkReply = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(matches!(reply.into_link(), Err(ServiceError::InvalidResponse(_))));
    }

    #[test]
    fn test_recommendation_reply() {
        let reply: RecommendationReply = serde_json::from_value(json!({"recommendations": "Run a promo"})).unwrap();
        assert_eq!(reply.into_text().unwrap(), "Run a promo");

        let reply: RecommendationReply = serde_json::from_value(json!({"error": "quota"})).unwrap();
        assert!(matches!(reply.into_text(), Err(ServiceError::Api(_))));
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let services = HttpServices::new(&ServiceConfig::new("http://svc:3000/")).unwrap();
        assert_eq!(services.url(PAYMENT_LINK_PATH), "http://svc:3000/api/stripe/create-payment-link");
    }
}
