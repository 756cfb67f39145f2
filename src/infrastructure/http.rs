use crate::api::{ChatApi, CredentialsProvider, HistoryQuery};
use crate::types::{ChatError, Member, Message, PharmacyId, Result, Room, RoomId, UserId};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// List endpoints answer either with a bare array or a paginated envelope
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Page { results: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Page { results } => results,
            Self::Bare(items) => items,
        }
    }
}

/// [`ChatApi`] over the backend's REST endpoints
pub struct HttpChatApi {
    base: Url,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialsProvider>,
}

impl HttpChatApi {
    pub fn new(
        base_endpoint: &str,
        credentials: Arc<dyn CredentialsProvider>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut base = Url::parse(base_endpoint)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base,
            http: builder.build()?,
            credentials,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let creds = self
            .credentials
            .credentials()
            .ok_or_else(|| ChatError::Auth("no access token available".to_string()))?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(creds.access_token))
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let method_name = method_name(&method);
        let mut request = self.request(method, url.clone())?;
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ChatError::Status {
                method: method_name,
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        tracing::debug!("{} {} -> {}", method_name, url, response.status());
        Ok(response)
    }

    async fn get_list<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        let response = self.send(Method::GET, url, None).await?;
        let listing: Listing<T> = response.json().await?;
        Ok(listing.into_vec())
    }

    async fn post_json<T: DeserializeOwned>(&self, url: Url, body: serde_json::Value) -> Result<T> {
        let response = self.send(Method::POST, url, Some(body)).await?;
        Ok(response.json().await?)
    }
}

fn method_name(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        _ => "REQUEST",
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_rooms(&self) -> Result<Vec<Room>> {
        self.get_list(self.url("chat/rooms/")?).await
    }

    async fn fetch_messages(&self, room: RoomId, query: HistoryQuery) -> Result<Vec<Message>> {
        let mut url = self.url(&format!("chat/rooms/{}/messages/", room))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page_size", &query.limit.to_string());
            if let Some(before) = query.before {
                pairs.append_pair("before", &before.to_string());
            }
        }
        self.get_list(url).await
    }

    async fn post_message(&self, room: RoomId, body: &str) -> Result<()> {
        let url = self.url(&format!("chat/rooms/{}/messages/", room))?;
        self.send(Method::POST, url, Some(serde_json::json!({ "body": body })))
            .await?;
        Ok(())
    }

    async fn mark_read(&self, room: RoomId) -> Result<()> {
        let url = self.url(&format!("chat/rooms/{}/read/", room))?;
        self.send(Method::POST, url, Some(serde_json::json!({})))
            .await?;
        Ok(())
    }

    async fn get_or_create_group_room(&self, pharmacy: PharmacyId) -> Result<Room> {
        let url = self.url("chat/rooms/get-or-create-group/")?;
        self.post_json(url, serde_json::json!({ "pharmacy_id": pharmacy }))
            .await
    }

    async fn start_direct_message(&self, pharmacy: PharmacyId, partner: UserId) -> Result<Room> {
        let url = self.url("chat/rooms/start-dm/")?;
        self.post_json(
            url,
            serde_json::json!({ "pharmacy_id": pharmacy, "partner_user_id": partner }),
        )
        .await
    }

    async fn list_members(&self, pharmacy: PharmacyId) -> Result<Vec<Member>> {
        self.get_list(self.url(&format!("pharmacies/{}/memberships/", pharmacy))?)
            .await
    }
}

/// Converts a REST base URL into the matching WebSocket base URL
pub fn http_to_ws_endpoint(http_endpoint: &str) -> String {
    http_endpoint
        .replace("http://", "ws://")
        .replace("https://", "wss://")
        .split('?')
        .next()
        .unwrap_or(http_endpoint)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StaticCredentials;

    #[test]
    fn test_http_to_ws_endpoint() {
        assert_eq!(
            http_to_ws_endpoint("https://api.example.com/api?x=1"),
            "wss://api.example.com/api"
        );
        assert_eq!(http_to_ws_endpoint("http://localhost:8000"), "ws://localhost:8000");
    }

    #[test]
    fn test_listing_accepts_both_shapes() {
        let bare: Listing<u32> = serde_json::from_str("[1,2]").unwrap();
        assert_eq!(bare.into_vec(), vec![1, 2]);
        let page: Listing<u32> =
            serde_json::from_str(r#"{"count":2,"next":null,"results":[3,4]}"#).unwrap();
        assert_eq!(page.into_vec(), vec![3, 4]);
    }

    #[test]
    fn test_base_gets_trailing_slash() {
        let api = HttpChatApi::new(
            "http://localhost:8000/api",
            Arc::new(StaticCredentials::new("t", 1)),
            None,
        )
        .unwrap();
        assert_eq!(
            api.url("chat/rooms/").unwrap().as_str(),
            "http://localhost:8000/api/chat/rooms/"
        );
    }
}
