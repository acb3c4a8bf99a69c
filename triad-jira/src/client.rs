//! Jira REST client

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The authenticated Jira user
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Myself {
    pub account_id: Option<String>,
    pub display_name: Option<String>,
    pub email_address: Option<String>,
}

/// Jira client bound to one site and project
pub struct JiraClient {
    http: Client,
    base_url: Url,
    user: String,
    token: String,
    project_key: String,
}

impl JiraClient {
    /// Create a client for `base_url`, filing new issues under `project_key`
    pub fn new(
        base_url: &str,
        user: impl Into<String>,
        token: impl Into<String>,
        project_key: impl Into<String>,
    ) -> Result<Self> {
        let user = user.into();
        let token = token.into();
        if user.trim().is_empty() || token.trim().is_empty() {
            return Err(Error::Auth(
                "Jira user and API token are required. Run `triad setup`".to_string(),
            ));
        }

        let base_url = Url::parse(base_url.trim().trim_end_matches('/'))?;
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let client = Self {
            http,
            base_url,
            user,
            token,
            project_key: project_key.into(),
        };
        info!(url = %client.site(), project = %client.project_key, "Created Jira client");
        Ok(client)
    }

    /// Site root without a trailing slash
    pub fn site(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Project new issues are created in
    pub fn project(&self) -> &str {
        &self.project_key
    }

    /// Browse link for an issue
    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.site(), key)
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{}", self.site(), path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.api_url(path))
            .basic_auth(&self.user, Some(&self.token))
            .header("Accept", "application/json")
    }

    /// Send a request and decode the JSON body; `subject` names the issue for 404s
    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        subject: Option<&str>,
    ) -> Result<T> {
        debug!(method = %method, path = %path, "Jira request");
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        check_status(status, &text, subject)?;

        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| Error::Parse(format!("{}: {}", path, e)))
    }

    /// The authenticated user
    pub async fn myself(&self) -> Result<Myself> {
        self.send(Method::GET, "myself", None, None).await
    }

    /// Verify the site and credentials
    pub async fn test_connection(&self) -> Result<Myself> {
        debug!(url = %self.site(), "Testing Jira connection");
        let me = self.myself().await?;
        info!(
            user = me.display_name.as_deref().unwrap_or(&self.user),
            "Jira connection successful"
        );
        Ok(me)
    }

    pub(crate) fn user(&self) -> &str {
        &self.user
    }
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.site())
            .field("user", &self.user)
            .field("project_key", &self.project_key)
            .finish_non_exhaustive()
    }
}

/// Map an error status to a typed error
pub(crate) fn check_status(status: StatusCode, body: &str, subject: Option<&str>) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    match (status, subject) {
        (StatusCode::UNAUTHORIZED, _) | (StatusCode::FORBIDDEN, _) => Err(Error::Auth(format!(
            "Jira rejected the credentials ({})",
            status
        ))),
        (StatusCode::NOT_FOUND, Some(key)) => Err(Error::IssueNotFound(key.to_string())),
        _ => Err(Error::Api {
            status: status.as_u16(),
            message: error_message(body),
        }),
    }
}

/// Jira error bodies carry `errorMessages` and a field map `errors`
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.chars().take(300).collect();
    };

    let mut parts: Vec<String> = value["errorMessages"]
        .as_array()
        .map(|msgs| {
            msgs.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if let Some(fields) = value["errors"].as_object() {
        for (field, msg) in fields {
            parts.push(format!("{}: {}", field, msg.as_str().unwrap_or_default()));
        }
    }

    if parts.is_empty() {
        body.chars().take(300).collect()
    } else {
        parts.join("; ")
    }
}
