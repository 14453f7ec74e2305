//! Channel authorization hook
//!
//! The engine asks a [`ChannelAuthorizer`] before creating a subscription.
//! Policy lives entirely in the implementation supplied by the application.

use std::fmt;
use std::sync::Arc;

use crate::channel::{ChannelParams, ChannelPattern};

use super::context::SubscribeContext;

/// Decides whether a subscription may be created
pub trait ChannelAuthorizer: Send + Sync {
    /// Return `true` to allow `ctx` to subscribe to `channel`
    fn authorize(&self, ctx: &SubscribeContext, channel: &str) -> bool;
}

impl<F> ChannelAuthorizer for F
where
    F: Fn(&SubscribeContext, &str) -> bool + Send + Sync,
{
    fn authorize(&self, ctx: &SubscribeContext, channel: &str) -> bool {
        self(ctx, channel)
    }
}

/// Allows every subscription
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl ChannelAuthorizer for AllowAll {
    fn authorize(&self, _ctx: &SubscribeContext, _channel: &str) -> bool {
        true
    }
}

type RuleFn = dyn Fn(&SubscribeContext, &ChannelParams) -> bool + Send + Sync;

/// Pattern-based authorization table
///
/// The first rule whose pattern matches the channel decides. Channels that
/// match no rule are public.
///
/// ```
/// use transmit_rs::engine::ChannelRules;
///
/// let rules = ChannelRules::new().rule("users/:id", |ctx, params| {
///     ctx.bearer_token() == params.get("id")
/// });
/// ```
#[derive(Clone, Default)]
pub struct ChannelRules {
    rules: Vec<(ChannelPattern, Arc<RuleFn>)>,
}

impl ChannelRules {
    /// Create an empty table (everything public)
    pub fn new() -> Self {
        Self::default()
    }

    /// Protect channels matching `pattern` with `check`
    pub fn rule<F>(mut self, pattern: impl Into<String>, check: F) -> Self
    where
        F: Fn(&SubscribeContext, &ChannelParams) -> bool + Send + Sync + 'static,
    {
        self.rules
            .push((ChannelPattern::new(pattern), Arc::new(check)));
        self
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl ChannelAuthorizer for ChannelRules {
    fn authorize(&self, ctx: &SubscribeContext, channel: &str) -> bool {
        for (pattern, check) in &self.rules {
            if let Some(params) = pattern.matches(channel) {
                let allowed = check(ctx, &params);
                tracing::debug!(
                    uid = %ctx.uid(),
                    channel = %channel,
                    pattern = %pattern.as_str(),
                    allowed = allowed,
                    "Channel authorization"
                );
                return allowed;
            }
        }

        true
    }
}

impl fmt::Debug for ChannelRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|(pattern, _)| pattern.as_str()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner_rules() -> ChannelRules {
        ChannelRules::new().rule("users/:id", |ctx, params| {
            ctx.bearer_token() == params.get("id")
        })
    }

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.authorize(&SubscribeContext::new("u1"), "anything"));
    }

    #[test]
    fn test_rules_match() {
        let rules = owner_rules();
        let ctx = SubscribeContext::new("u1").with_metadata("authorization", "Bearer 42");

        assert!(rules.authorize(&ctx, "users/42"));
        assert!(!rules.authorize(&ctx, "users/7"));
    }

    #[test]
    fn test_unmatched_channel_is_public() {
        let rules = owner_rules();

        assert!(rules.authorize(&SubscribeContext::new("u1"), "news"));
    }

    #[test]
    fn test_first_rule_wins() {
        let rules = ChannelRules::new()
            .rule("admin/:section", |_, _| false)
            .rule("admin/stats", |_, _| true);

        assert_eq!(rules.len(), 2);
        assert!(!rules.authorize(&SubscribeContext::new("u1"), "admin/stats"));
    }

    #[test]
    fn test_closure_authorizer() {
        let deny_private = |_: &SubscribeContext, channel: &str| !channel.starts_with("private");

        assert!(deny_private.authorize(&SubscribeContext::new("u1"), "public"));
        assert!(!deny_private.authorize(&SubscribeContext::new("u1"), "private/x"));
    }
}
