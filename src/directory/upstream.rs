//! REST client for the flag service.
//!
//! Collections are fetched page by page (`limit`/`offset`) until the
//! accumulated item count reaches the server-reported `totalCount`.
//! Records are kept as raw JSON so the proxy can return them verbatim.

use futures::future::join_all;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::UpstreamError;
use super::model::Page;

pub const DEFAULT_BASE_URL: &str = "https://app.launchdarkly.com";
pub const API_PATH: &str = "/api/v2";
pub const PAGE_SIZE: usize = 100;

/// A successful response and the status the flag service answered with.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub status: u16,
    pub body: T,
}

/// Authenticated client for one API key.
#[derive(Debug, Clone)]
pub struct FlagService {
    http: Client,
    api_url: String,
    authorization: String,
    page_size: usize,
}

impl FlagService {
    pub fn new(http: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            api_url: format!("{}{}", base_url.trim_end_matches('/'), API_PATH),
            authorization: authorization_header(api_key),
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn list_projects(&self) -> Result<Reply<Page<Value>>, UpstreamError> {
        self.collect_pages("/projects", "").await
    }

    /// List a project's environments with full details.
    ///
    /// Each environment summary is followed by a detail fetch. A failed
    /// detail fetch keeps the summary instead of failing the listing.
    pub async fn list_environments(
        &self,
        project_key: &str,
    ) -> Result<Reply<Page<Value>>, UpstreamError> {
        let encoded = urlencoding::encode(project_key);
        let project: &str = &encoded;
        let summaries = self
            .collect_pages(&format!("/projects/{}/environments", project), "")
            .await?;

        let details = summaries.body.items.into_iter().map(|summary| async move {
            let Some(env_key) = summary.get("key").and_then(Value::as_str) else {
                return summary;
            };
            let path = format!(
                "/projects/{}/environments/{}",
                project,
                urlencoding::encode(env_key)
            );
            match self.get_json(&path).await {
                Ok(detail) => detail.body,
                Err(e) => {
                    warn!("[directory] environment {} detail unavailable: {}", env_key, e);
                    summary
                }
            }
        });
        let items = join_all(details).await;
        Ok(Reply {
            status: summaries.status,
            body: Page {
                items,
                total_count: summaries.body.total_count,
            },
        })
    }

    /// List a project's flags, optionally filtered by a search term.
    pub async fn list_flags(
        &self,
        project_key: &str,
        search: &str,
    ) -> Result<Reply<Page<Value>>, UpstreamError> {
        let search = search.trim();
        let filter = if search.is_empty() {
            String::new()
        } else {
            format!("&filter={}", urlencoding::encode(&format!("query:{}", search)))
        };
        let path = format!("/flags/{}", urlencoding::encode(project_key));
        self.collect_pages(&path, &filter).await
    }

    pub async fn flag_details(
        &self,
        project_key: &str,
        flag_key: &str,
    ) -> Result<Reply<Value>, UpstreamError> {
        self.get_json(&format!(
            "/flags/{}/{}",
            urlencoding::encode(project_key),
            urlencoding::encode(flag_key)
        ))
        .await
    }

    pub async fn create_flag(
        &self,
        project_key: &str,
        flag: &Value,
    ) -> Result<Reply<Value>, UpstreamError> {
        let url = format!("{}/flags/{}", self.api_url, urlencoding::encode(project_key));
        self.send(self.request(Method::POST, &url).json(flag)).await
    }

    /// Fetch every page of a collection, concatenating items in server order.
    ///
    /// The reply carries the status of the last page fetched.
    pub async fn collect_pages(
        &self,
        path: &str,
        extra_query: &str,
    ) -> Result<Reply<Page<Value>>, UpstreamError> {
        let mut items: Vec<Value> = Vec::new();
        let mut offset = 0;
        let mut total_count;
        let mut status;

        loop {
            let url = format!(
                "{}{}?limit={}&offset={}{}",
                self.api_url, path, self.page_size, offset, extra_query
            );
            debug!("[directory] GET {}", url);
            let reply = self.send(self.request(Method::GET, &url)).await?;
            let page: Page<Value> = serde_json::from_value(reply.body)
                .map_err(|e| UpstreamError::Decode(e.to_string()))?;

            let received = page.items.len();
            items.extend(page.items);
            total_count = page.total_count;
            status = reply.status;
            offset += self.page_size;

            // An empty page means the total was overstated; stop rather than spin
            if items.len() >= total_count || received == 0 {
                break;
            }
        }

        debug!("[directory] {} -> {} of {} items", path, items.len(), total_count);
        Ok(Reply {
            status,
            body: Page { items, total_count },
        })
    }

    async fn get_json(&self, path: &str) -> Result<Reply<Value>, UpstreamError> {
        let url = format!("{}{}", self.api_url, path);
        self.send(self.request(Method::GET, &url)).await
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Reply<Value>, UpstreamError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Reply {
            status: status.as_u16(),
            body,
        })
    }
}

/// Access tokens starting with `api-` are sent as-is; anything else as a bearer token.
pub fn authorization_header(api_key: &str) -> String {
    if api_key.starts_with("api-") {
        api_key.to_string()
    } else {
        format!("Bearer {}", api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_header() {
        assert_eq!(authorization_header("api-123"), "api-123");
        assert_eq!(authorization_header("sdk-123"), "Bearer sdk-123");
    }

    #[test]
    fn test_api_url_strips_trailing_slash() {
        let service = FlagService::new(Client::new(), "http://localhost:9000/", "api-x");
        assert_eq!(service.api_url, "http://localhost:9000/api/v2");
        assert_eq!(service.page_size(), PAGE_SIZE);
        assert_eq!(service.with_page_size(0).page_size(), 1);
    }
}
