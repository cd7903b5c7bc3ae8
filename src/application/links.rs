//! Cache-bust link rewriting for logged-in visitors.

use metrics::counter;
use tracing::trace;

use crate::{
    config::NoCacheSettings,
    domain::nocache::{self, NoCacheConfig, TokenPolicy},
    infra::telemetry::METRIC_LINKS_REWRITTEN_TOTAL,
};

/// Link families that receive the cache-bust parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
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

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    pub logged_in: bool,
}

#[derive(Debug, Clone)]
pub struct LinkRewriter {
    enabled: bool,
    param_name: String,
    policy: TokenPolicy,
    fixed_token: Option<String>,
    process_token: String,
}

impl LinkRewriter {
    pub fn new(settings: &NoCacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            param_name: settings.param_name.clone(),
            policy: settings.token_policy,
            fixed_token: settings.param_value.clone(),
            process_token: nocache::process_token(),
        }
    }

    /// Start a render for `session`; every link of that render shares one token.
    pub fn render(&self, session: Session) -> RenderLinks {
        if !self.enabled || !session.logged_in {
            return RenderLinks {
                config: NoCacheConfig::new(false, self.param_name.clone(), String::new()),
            };
        }

        let token = match (&self.fixed_token, self.policy) {
            (Some(fixed), _) => fixed.clone(),
            (None, TokenPolicy::PerProcess) => self.process_token.clone(),
            (None, TokenPolicy::PerRender) => nocache::render_token(),
        };

        RenderLinks {
            config: NoCacheConfig::new(true, self.param_name.clone(), token),
        }
    }
}

/// Per-render handle returned by [`LinkRewriter::render`].
#[derive(Debug, Clone)]
pub struct RenderLinks {
    config: NoCacheConfig,
}

impl RenderLinks {
    pub fn is_active(&self) -> bool {
        self.config.enabled
    }

    /// Token carried by this render, `None` when links pass through untouched.
    pub fn token(&self) -> Option<&str> {
        self.is_active().then_some(self.config.param_value.as_str())
    }

    pub fn rewrite(&self, kind: LinkKind, url: &str) -> String {
        if !self.is_active() {
            return url.to_string();
        }

        let rewritten = match kind {
            LinkKind::CommentsFeed => {
                let fixed = nocache::fix_feed_ordering_for(url, &self.config);
                nocache::rewrite(&fixed, &self.config)
            }
            _ => nocache::rewrite(url, &self.config),
        };

        trace!(
            target = "cfpurge::links",
            ?kind,
            url,
            rewritten = %rewritten,
            "link rewritten"
        );
        counter!(METRIC_LINKS_REWRITTEN_TOTAL).increment(1);
        rewritten
    }
}
