//! Live-stats bearer token.
//!
//! The token is issued outside this process and carries its own expiry as an
//! `exp=<unix-seconds>` claim. One token is held at a time; it is replaced,
//! never purged.

use chrono::Utc;
use regex::Regex;
use std::env;
use std::sync::LazyLock;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Built-in fallback. Its claim is already in the past, so it only keeps the
/// wiring testable. Deployments must supply a real token.
pub const PLACEHOLDER_FALLBACK_TOKEN: &str = "exp=1767225600~acl=/*~data=placeholder~hmac=rotate-me";

static EXP_CLAIM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"exp=(\d+)").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    pub value: String,
    /// Unix seconds, from the embedded claim
    pub expires_at: i64,
}

impl BearerToken {
    /// `None` when the token has no parsable `exp=` claim.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let expires_at = EXP_CLAIM
            .captures(raw)?
            .get(1)?
            .as_str()
            .parse::<i64>()
            .ok()?;
        Some(Self {
            value: raw.to_string(),
            expires_at,
        })
    }

    pub fn is_valid_at(&self, now_secs: i64) -> bool {
        now_secs < self.expires_at
    }
}

/// Where the externally issued token comes from.
pub trait TokenSource: Send + Sync {
    fn current(&self) -> Option<String>;
}

/// Reads an env var on every call, so a rotated token is picked up without a restart.
pub struct EnvTokenSource {
    var: String,
}

impl EnvTokenSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl TokenSource for EnvTokenSource {
    fn current(&self) -> Option<String> {
        env::var(&self.var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Fixed value, mostly for tests and the snapshot tool.
pub struct StaticTokenSource(pub Option<String>);

impl TokenSource for StaticTokenSource {
    fn current(&self) -> Option<String> {
        self.0.clone()
    }
}

pub struct TokenManager {
    source: Box<dyn TokenSource>,
    fallback: Option<String>,
    held: RwLock<Option<BearerToken>>,
}

impl TokenManager {
    pub fn new(source: Box<dyn TokenSource>, fallback: Option<String>) -> Self {
        Self {
            source,
            fallback,
            held: RwLock::new(None),
        }
    }

    /// `None` means "no live stats this cycle", never an error.
    pub async fn get_token(&self) -> Option<BearerToken> {
        self.get_token_at(Utc::now().timestamp()).await
    }

    pub async fn get_token_at(&self, now_secs: i64) -> Option<BearerToken> {
        if let Some(raw) = self.source.current() {
            if let Some(held) = self.held_if(|t| t.value == raw.trim() && t.is_valid_at(now_secs)).await {
                return Some(held);
            }
            return self.adopt(&raw, now_secs, "configured").await;
        }

        if let Some(held) = self.held_if(|t| t.is_valid_at(now_secs)).await {
            return Some(held);
        }

        let fallback = self.fallback.as_deref()?;
        self.adopt(fallback, now_secs, "fallback").await
    }

    /// Currently held token, valid or not.
    pub async fn snapshot(&self) -> Option<BearerToken> {
        self.held.read().await.clone()
    }

    async fn held_if(&self, keep: impl Fn(&BearerToken) -> bool) -> Option<BearerToken> {
        self.held.read().await.as_ref().filter(|t| keep(t)).cloned()
    }

    async fn adopt(&self, raw: &str, now_secs: i64, origin: &str) -> Option<BearerToken> {
        let Some(token) = BearerToken::parse(raw) else {
            warn!("{} live-stats token has no exp claim, live stats disabled", origin);
            return None;
        };
        if !token.is_valid_at(now_secs) {
            warn!(
                "{} live-stats token expired at {}, live stats disabled",
                origin, token.expires_at
            );
            return None;
        }

        let mut held = self.held.write().await;
        if held.as_ref() != Some(&token) {
            info!("adopted {} live-stats token (exp {})", origin, token.expires_at);
        } else {
            debug!("re-validated {} live-stats token", origin);
        }
        *held = Some(token.clone());
        Some(token)
    }
}
