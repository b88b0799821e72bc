//! Help-center article client.
//!
//! Wraps the three remote operations kbsync needs against a Zendesk-style
//! help-center API: create an article in the default section, update its
//! translation, and delete it. Each call is a single attempt bounded by the
//! configured timeout; retrying is the caller's business.

use kbsync_shared::{HelpCenterConfig, KbSyncError, Result};
use reqwest::{Client, Response, StatusCode, header};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// User-Agent string for help-center requests.
const USER_AGENT: &str = concat!("kbsync/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CreateArticleRequest<'a> {
    article: NewArticle<'a>,
}

#[derive(Debug, Serialize)]
struct NewArticle<'a> {
    title: &'a str,
    body: &'a str,
    locale: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateTranslationRequest<'a> {
    translation: Translation<'a>,
}

#[derive(Debug, Serialize)]
struct Translation<'a> {
    title: &'a str,
    body: &'a str,
    section_id: u64,
}

#[derive(Debug, Deserialize)]
struct ArticleEnvelope {
    article: ArticleRef,
}

#[derive(Debug, Deserialize)]
struct ArticleRef {
    id: u64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client for the help-center article API.
#[derive(Debug, Clone)]
pub struct HelpCenterClient {
    http: Client,
    config: HelpCenterConfig,
}

impl HelpCenterClient {
    /// Build a client from a resolved configuration.
    pub fn new(config: HelpCenterConfig) -> Result<Self> {
        let mut auth = header::HeaderValue::from_str(&config.authorization)
            .map_err(|e| KbSyncError::config(format!("invalid authorization header: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| KbSyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &HelpCenterConfig {
        &self.config
    }

    /// Create an article in the default section. Returns the id the
    /// help center assigned. Expects `201 Created`.
    #[instrument(skip_all, fields(section_id = self.config.section_id))]
    pub async fn create_article(&self, title: &str, body: &str) -> Result<u64> {
        const OP: &str = "create";
        let url = format!(
            "{}/help_center/sections/{}/articles.json",
            self.config.base_url, self.config.section_id
        );
        let payload = CreateArticleRequest {
            article: NewArticle {
                title,
                body,
                locale: &self.config.locale,
            },
        };

        debug!(%url, "creating help center article");
        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(OP, e))?;
        let response = expect_status(OP, response, StatusCode::CREATED).await?;

        let text = response.text().await.map_err(|e| transport_error(OP, e))?;
        let envelope: ArticleEnvelope = serde_json::from_str(&text).map_err(|e| {
            KbSyncError::parse(format!("help center create response missing article id: {e}"))
        })?;

        // 0 marks "no remote article" in page state
        if envelope.article.id == 0 {
            return Err(KbSyncError::parse("help center returned article id 0"));
        }

        info!(article_id = envelope.article.id, "help center article created");
        Ok(envelope.article.id)
    }

    /// Replace the title and body of an article's translation in the
    /// configured locale. Expects `200 OK`.
    #[instrument(skip_all, fields(article_id = article_id))]
    pub async fn update_article(&self, article_id: u64, title: &str, body: &str) -> Result<()> {
        const OP: &str = "update";
        let url = format!(
            "{}/help_center/articles/{article_id}/translations/{}.json",
            self.config.base_url, self.config.locale
        );
        let payload = UpdateTranslationRequest {
            translation: Translation {
                title,
                body,
                section_id: self.config.section_id,
            },
        };

        debug!(%url, "updating help center article");
        let response = self
            .http
            .put(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(OP, e))?;
        expect_status(OP, response, StatusCode::OK).await?;

        info!(article_id, "help center article updated");
        Ok(())
    }

    /// Delete an article. Expects `204 No Content`.
    #[instrument(skip_all, fields(article_id = article_id))]
    pub async fn delete_article(&self, article_id: u64) -> Result<()> {
        const OP: &str = "delete";
        let url = format!(
            "{}/help_center/articles/{article_id}.json",
            self.config.base_url
        );

        debug!(%url, "deleting help center article");
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| transport_error(OP, e))?;
        expect_status(OP, response, StatusCode::NO_CONTENT).await?;

        info!(article_id, "help center article deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Classify a reqwest failure: timeouts are their own kind.
fn transport_error(operation: &'static str, err: reqwest::Error) -> KbSyncError {
    if err.is_timeout() {
        KbSyncError::RemoteTimeout { operation }
    } else {
        KbSyncError::Network(format!("help center {operation}: {err}"))
    }
}

/// Accept exactly `expected`; anything else is a rejection carrying the body.
async fn expect_status(
    operation: &'static str,
    response: Response,
    expected: StatusCode,
) -> Result<Response> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .map_err(|e| transport_error(operation, e))?;
    Err(KbSyncError::RemoteRejected {
        operation,
        status: status.as_u16(),
        body,
    })
}
