//! Edge function invocation

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::fetch::Fetch;

/// Function that delivers outbound email
pub const SEND_EMAIL_FUNCTION: &str = "send-email";

/// Client for deployed edge functions
#[derive(Debug, Clone)]
pub struct Functions {
    url: String,
    key: String,
    token: String,
    client: Client,
}

/// Payload of the email function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl EmailMessage {
    /// Validates and builds a message
    pub fn new(to: &str, subject: &str, html: &str) -> Result<Self> {
        if !to.contains('@') {
            return Err(Error::validation(format!("Invalid recipient address: {}", to)));
        }
        if subject.trim().is_empty() {
            return Err(Error::validation("Email subject is required"));
        }
        Ok(Self {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        })
    }
}

impl Functions {
    pub(crate) fn new(url: &str, key: &str, token: &str, client: Client) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            token: token.to_string(),
            client,
        }
    }

    fn get_url(&self, function_name: &str) -> String {
        format!("{}/functions/v1/{}", self.url, function_name)
    }

    /// Invoke a function with a JSON body and decode its JSON answer
    pub async fn invoke<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        function_name: &str,
        body: &T,
    ) -> Result<R> {
        let url = self.get_url(function_name);

        Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .bearer_auth(&self.token)
            .json(body)?
            .execute::<R>()
            .await
            .map_err(|e| match e {
                Error::Api { message, .. } => {
                    Error::function(format!("{} failed: {}", function_name, message))
                }
                other => other,
            })
    }

    /// Send an email through the email function
    pub async fn send_email(&self, message: &EmailMessage) -> Result<()> {
        let _: serde_json::Value = self.invoke(SEND_EMAIL_FUNCTION, message).await?;
        info!(subject = %message.subject, "email dispatched");
        Ok(())
    }
}
