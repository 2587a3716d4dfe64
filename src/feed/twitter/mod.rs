//! Twitter REST v1.1 client.
//!
//! Request/response endpoints carry a per-request timeout. The live stream
//! lives in [`stream`] and uses the same `reqwest::Client` without one.

mod stream;

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use log::{debug, info, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::feed::{
    ClientError, FeedClient, LOOKUP_BATCH, Status, StatusId, StreamItem, StreamOptions, User,
};

pub use stream::StreamReader;
use stream::StreamConnector;

pub const DEFAULT_API_BASE_URL: &str = "https://api.twitter.com/1.1";
pub const DEFAULT_STREAM_BASE_URL: &str = "https://userstream.twitter.com/1.1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Response envelopes
// ============================================================================

#[derive(Deserialize, Debug)]
struct SearchResponse {
    statuses: Vec<Status>,
}

#[derive(Deserialize, Debug)]
struct IdsResponse {
    ids: Vec<u64>,
}

// ============================================================================
// Client
// ============================================================================

pub struct TwitterClient {
    token: String,
    api_base: String,
    stream_base: String,
    client: reqwest::Client,
}

impl TwitterClient {
    /// Creates a new client.
    ///
    /// # Arguments
    /// * `token` - Bearer token for the authenticated account
    /// * `api_base` - Optional REST base URL (defaults to the public API)
    /// * `stream_base` - Optional streaming base URL
    pub fn new(token: String, api_base: Option<String>, stream_base: Option<String>) -> Self {
        Self {
            token,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            stream_base: stream_base.unwrap_or_else(|| DEFAULT_STREAM_BASE_URL.to_string()),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), endpoint)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        debug!("GET {} {:?}", endpoint, query);
        let response = self
            .client
            .get(self.url(endpoint))
            .bearer_auth(&self.token)
            .query(query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        decode(endpoint, response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        debug!("POST {} {:?}", endpoint, query);
        let response = self
            .client
            .post(self.url(endpoint))
            .bearer_auth(&self.token)
            .query(query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        decode(endpoint, response).await
    }
}

/// Maps non-2xx responses to `ClientError::Api`, otherwise decodes the JSON body.
async fn decode<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let response = check_status(endpoint, response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::Parse(format!("{endpoint}: {e}")))
}

pub(crate) async fn check_status(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    debug!("{} response status: {}", endpoint, response.status());
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    warn!("{} API error: {} - {}", endpoint, status, message);
    Err(ClientError::Api { status, message })
}

#[async_trait]
impl FeedClient for TwitterClient {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn verify_credentials(&self) -> Result<User, ClientError> {
        self.get("account/verify_credentials.json", &[]).await
    }

    async fn home_timeline(&self, count: u32) -> Result<Vec<Status>, ClientError> {
        self.get("statuses/home_timeline.json", &[("count", count.to_string())])
            .await
    }

    async fn user_timeline(&self, screen_name: &str, count: u32) -> Result<Vec<Status>, ClientError> {
        self.get(
            "statuses/user_timeline.json",
            &[
                ("screen_name", screen_name.to_string()),
                ("count", count.to_string()),
            ],
        )
        .await
    }

    async fn update_status(
        &self,
        text: &str,
        in_reply_to: Option<StatusId>,
    ) -> Result<Status, ClientError> {
        let mut query = vec![("status", text.to_string())];
        if let Some(id) = in_reply_to {
            query.push(("in_reply_to_status_id", id.to_string()));
        }
        self.post("statuses/update.json", &query).await
    }

    async fn retweet(&self, id: StatusId) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .post(
                &format!("statuses/retweet/{id}.json"),
                &[("trim_user", "true".to_string())],
            )
            .await?;
        Ok(())
    }

    async fn show_status(&self, id: StatusId) -> Result<Status, ClientError> {
        self.get("statuses/show.json", &[("id", id.to_string())]).await
    }

    async fn destroy_status(&self, id: StatusId) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .post(&format!("statuses/destroy/{id}.json"), &[])
            .await?;
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<Status>, ClientError> {
        let response: SearchResponse = self
            .get("search/tweets.json", &[("q", query.to_string())])
            .await?;
        Ok(response.statuses)
    }

    async fn friend_ids(&self) -> Result<Vec<u64>, ClientError> {
        let response: IdsResponse = self.get("friends/ids.json", &[]).await?;
        Ok(response.ids)
    }

    async fn follower_ids(&self) -> Result<Vec<u64>, ClientError> {
        let response: IdsResponse = self.get("followers/ids.json", &[]).await?;
        Ok(response.ids)
    }

    async fn lookup_users(&self, ids: &[u64]) -> Result<Vec<User>, ClientError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > LOOKUP_BATCH {
            return Err(ClientError::Config(format!(
                "lookup_users accepts at most {LOOKUP_BATCH} ids, got {}",
                ids.len()
            )));
        }
        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.get("users/lookup.json", &[("user_id", joined)]).await
    }

    async fn open_stream(
        &self,
        options: &StreamOptions,
    ) -> Result<BoxStream<'static, StreamItem>, ClientError> {
        let connector = StreamConnector::new(
            self.client.clone(),
            format!("{}/user.json", self.stream_base.trim_end_matches('/')),
            self.token.clone(),
            options.track.clone(),
        );

        // Connect up front so bad credentials fail loudly instead of as a Hangup loop
        let response = connector.connect().await?;
        info!(
            "Stream connected (track={:?}, block={}, timeout={:?}, heartbeat={:?})",
            options.track, options.block, options.timeout, options.heartbeat_timeout
        );

        let reader = StreamReader::new(connector, Some(response), options.clone());
        Ok(reader.into_stream().boxed())
    }
}
