use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::PushTransport;

const FCM_API_URL: &str = "https://fcm.googleapis.com/v1/projects";

#[derive(Debug, Serialize)]
struct SendRequest {
    message: FcmMessage,
}

#[derive(Debug, Serialize)]
struct FcmMessage {
    token: String,
    notification: FcmNotification,
    data: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct FcmNotification {
    title: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    // e.g. "projects/my-project/messages/0:1500415314455276"
    name: String,
}

/// FCM HTTP v1 transport. The OAuth2 access token is provisioned outside
/// this process (service-account flow); we only consume it.
pub struct FcmClient {
    client: Client,
    project_id: String,
    access_token: String,
}

impl FcmClient {
    pub fn new(project_id: String, access_token: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            project_id,
            access_token,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}/messages:send", FCM_API_URL, self.project_id)
    }
}

#[async_trait]
impl PushTransport for FcmClient {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: &HashMap<String, String>,
    ) -> Result<String> {
        let request = SendRequest {
            message: FcmMessage {
                token: token.to_string(),
                notification: FcmNotification {
                    title: title.to_string(),
                    body: body.to_string(),
                },
                data: data.clone(),
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::PushApi(format!("API error: {}", error_text)));
        }

        let send_response: SendResponse = response.json().await?;
        Ok(send_response.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_project_id() {
        let client = FcmClient::new("my-project".to_string(), "token".to_string());
        assert_eq!(
            client.endpoint(),
            "https://fcm.googleapis.com/v1/projects/my-project/messages:send"
        );
    }
}
