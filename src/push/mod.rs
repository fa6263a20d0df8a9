use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

mod fcm;

pub use fcm::FcmClient;

/// Sends one push message to one device token. Returns the provider's
/// message id as a delivery receipt; any transport failure is an error.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: &HashMap<String, String>,
    ) -> Result<String>;
}
