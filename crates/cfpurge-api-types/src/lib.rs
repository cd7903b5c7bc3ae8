//! Request and response shapes shared by the cfpurge hooks API and its
//! clients, plus the subset of the Cloudflare v4 envelope the dispatcher reads.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Cloudflare purge_cache endpoint
// ---------------------------------------------------------------------------

/// JSON body accepted by `zones/{zone_id}/purge_cache`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PurgeCacheBody {
    Files { files: Vec<String> },
    Everything { purge_everything: bool },
}

impl PurgeCacheBody {
    pub fn files(files: Vec<String>) -> Self {
        Self::Files { files }
    }

    pub fn everything() -> Self {
        Self::Everything {
            purge_everything: true,
        }
    }
}

/// Standard Cloudflare v4 response envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudflareEnvelope {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<CloudflareMessage>,
    #[serde(default)]
    pub messages: Vec<CloudflareMessage>,
    #[serde(default)]
    pub result: Option<PurgeCacheResult>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudflareMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PurgeCacheResult {
    pub id: String,
}

// ---------------------------------------------------------------------------
// Hooks API
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostTypeInput {
    pub name: String,
    #[serde(default = "default_true")]
    pub public: bool,
    #[serde(default = "default_true")]
    pub publicly_queryable: bool,
}

/// Reported by the host CMS after a piece of content has been saved.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentSavedRequest {
    pub post_id: u64,
    pub post_type: PostTypeInput,
    /// Canonical URLs of the saved resource, after the host's own URL filters.
    #[serde(default)]
    pub urls: Vec<String>,
    /// False for autosaves and programmatic saves.
    #[serde(default = "default_true")]
    pub form_submission: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PurgeUrlsRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Purged,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PurgeOutcomeResponse {
    pub outcome: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub purge_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKindInput {
    Home,
    Post,
    Page,
    PostType,
    Category,
    Tag,
    Author,
    Day,
    Month,
    Year,
    CommentsFeed,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkInput {
    pub kind: LinkKindInput,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RewriteLinksRequest {
    #[serde(default)]
    pub logged_in: bool,
    pub links: Vec<LinkInput>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RewriteLinksResponse {
    pub links: Vec<String>,
    /// Cache-bust token shared by every link of this render; absent when links
    /// pass through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}
