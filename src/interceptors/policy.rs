//! Policy enforcement interceptor for tool calls.

use super::{InterceptorDecision, ToolCallContext, ToolInterceptor};
use crate::config::{PolicyDefaultMode, PolicySettings};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone)]
struct PolicyDecision {
    allowed: bool,
    reason: String,
}

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    mode: PolicyDefaultMode,
    rules: HashMap<String, PolicyDecision>,
}

impl PolicyConfig {
    pub fn allow_all() -> Self {
        Self {
            mode: PolicyDefaultMode::AllowAll,
            rules: HashMap::new(),
        }
    }

    pub fn from_settings(settings: &PolicySettings) -> Self {
        let mut rules = HashMap::new();
        for rule in &settings.rules {
            if !is_valid_tool_name(&rule.tool) {
                warn!(tool = %rule.tool, "Invalid tool name in policy; skipping rule");
                continue;
            }

            rules.insert(
                rule.tool.clone(),
                PolicyDecision {
                    allowed: rule.allowed,
                    reason: rule
                        .reason
                        .clone()
                        .unwrap_or_else(|| "policy rule".to_string()),
                },
            );
        }

        Self {
            mode: settings.default_mode,
            rules,
        }
    }

    fn decision_for_tool(&self, tool: &str) -> PolicyDecision {
        if let Some(decision) = self.rules.get(tool) {
            return decision.clone();
        }

        match self.mode {
            PolicyDefaultMode::AllowAll => PolicyDecision {
                allowed: true,
                reason: "allowed by default policy".to_string(),
            },
            PolicyDefaultMode::DefaultDeny => PolicyDecision {
                allowed: false,
                reason: "denied by default policy".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolicyInterceptor {
    policy: PolicyConfig,
}

impl PolicyInterceptor {
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }
}

#[async_trait::async_trait]
impl ToolInterceptor for PolicyInterceptor {
    async fn intercept_tool_call(
        &self,
        context: &ToolCallContext,
    ) -> crate::Result<InterceptorDecision> {
        let decision = self.policy.decision_for_tool(&context.tool_name);
        if decision.allowed {
            return Ok(InterceptorDecision::Allow);
        }

        warn!(tool = %context.tool_name, reason = %decision.reason, "Tool call blocked by policy");
        Ok(InterceptorDecision::Block(format!(
            "Policy denied tool {}: {}",
            context.tool_name, decision.reason
        )))
    }
}

/// Tool names are lowercase ASCII, digits and underscores
pub fn is_valid_tool_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    name.bytes()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyRule;
    use serde_json::json;

    #[test]
    fn default_allow_policy_allows_unknown_tools() {
        let policy = PolicyConfig::allow_all();
        let decision = policy.decision_for_tool("token_security");
        assert!(decision.allowed);
    }

    #[test]
    fn default_deny_policy_blocks_unknown_tools() {
        let policy = PolicyConfig::from_settings(&PolicySettings {
            default_mode: PolicyDefaultMode::DefaultDeny,
            rules: Vec::new(),
        });
        let decision = policy.decision_for_tool("token_security");
        assert!(!decision.allowed);
    }

    #[test]
    fn rule_overrides_default_mode() {
        let policy = PolicyConfig::from_settings(&PolicySettings {
            default_mode: PolicyDefaultMode::DefaultDeny,
            rules: vec![
                PolicyRule {
                    tool: "token_details".to_string(),
                    allowed: true,
                    reason: Some("explicit allow".to_string()),
                },
                PolicyRule {
                    tool: "Bad-Name".to_string(),
                    allowed: true,
                    reason: None,
                },
            ],
        });
        assert!(policy.decision_for_tool("token_details").allowed);
        assert!(!policy.decision_for_tool("Bad-Name").allowed);
    }

    #[tokio::test]
    async fn blocked_call_names_the_tool() {
        let policy = PolicyConfig::from_settings(&PolicySettings {
            default_mode: PolicyDefaultMode::AllowAll,
            rules: vec![PolicyRule {
                tool: "cambrian_price_current".to_string(),
                allowed: false,
                reason: Some("paid endpoint".to_string()),
            }],
        });
        let interceptor = PolicyInterceptor::new(policy);
        let ctx = ToolCallContext::new("cambrian_price_current", json!({}));
        let decision = interceptor.intercept_tool_call(&ctx).await.unwrap();
        assert_eq!(
            decision,
            InterceptorDecision::Block(
                "Policy denied tool cambrian_price_current: paid endpoint".to_string()
            )
        );
    }

    #[test]
    fn tool_name_validation_rejects_invalid() {
        assert!(is_valid_tool_name("token_security"));
        assert!(!is_valid_tool_name("token-security"));
        assert!(!is_valid_tool_name("Token"));
        assert!(!is_valid_tool_name(""));
    }
}
