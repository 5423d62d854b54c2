//! Maker/checker risk validation — spec.md §4.3.2.
//!
//! A composable `Checker` inspects a proposed action and returns a
//! `CheckResult`. The overall verdict is the worst individual result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Approved,
    NeedsReview,
    Escalate,
    Rejected,
}

/// What a checker is given to inspect.
#[derive(Debug, Clone, Default)]
pub struct ActionRequest {
    pub action_name: String,
    pub target_sites: Vec<String>,
    pub target_devices: Vec<String>,
    pub plan: Value,
    pub user: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub level: RiskLevel,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub risk_flags: Vec<String>,
}

impl CheckResult {
    pub fn approved() -> Self {
        Self {
            level: RiskLevel::Approved,
            issues: Vec::new(),
            suggestions: Vec::new(),
            risk_flags: Vec::new(),
        }
    }

    pub fn escalate(issue: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            level: RiskLevel::Escalate,
            issues: vec![issue.into()],
            suggestions: Vec::new(),
            risk_flags: vec![flag.into()],
        }
    }

    fn merge(mut self, other: CheckResult) -> Self {
        if other.level > self.level {
            self.level = other.level;
        }
        self.issues.extend(other.issues);
        self.suggestions.extend(other.suggestions);
        self.risk_flags.extend(other.risk_flags);
        self
    }
}

pub trait Checker: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, request: &ActionRequest) -> CheckResult;
}

/// Runs every registered checker and folds the results into one verdict —
/// the worst individual result, with every issue/suggestion/flag kept.
pub struct CompositeChecker {
    checkers: Vec<Box<dyn Checker>>,
}

impl CompositeChecker {
    pub fn new() -> Self {
        Self { checkers: Vec::new() }
    }

    pub fn with_builtin_checks() -> Self {
        let mut composite = Self::new();
        composite.register(Box::new(BulkOperationCheck));
        composite.register(Box::new(RollbackPlanCheck));
        composite
    }

    pub fn register(&mut self, checker: Box<dyn Checker>) {
        self.checkers.push(checker);
    }

    pub fn evaluate(&self, request: &ActionRequest) -> CheckResult {
        self.checkers
            .iter()
            .map(|c| c.check(request))
            .fold(CheckResult::approved(), CheckResult::merge)
    }
}

impl Default for CompositeChecker {
    fn default() -> Self {
        Self::with_builtin_checks()
    }
}

fn plan_str(plan: &Value, field: &str) -> Option<String> {
    plan.get(field).and_then(|v| v.as_str()).map(str::to_string)
}

fn plan_bool(plan: &Value, field: &str) -> bool {
    plan.get(field).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Sites count > 10 requires `plan.bulk_confirmed = true` and a non-empty
/// `plan.rollback_plan`; otherwise ESCALATE.
pub struct BulkOperationCheck;

impl Checker for BulkOperationCheck {
    fn name(&self) -> &'static str {
        "bulk_operation"
    }

    fn check(&self, request: &ActionRequest) -> CheckResult {
        if request.target_sites.len() <= 10 {
            return CheckResult::approved();
        }
        let confirmed = plan_bool(&request.plan, "bulk_confirmed");
        let rollback_present = plan_str(&request.plan, "rollback_plan")
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        if confirmed && rollback_present {
            CheckResult::approved()
        } else {
            CheckResult::escalate(
                format!(
                    "bulk operation across {} sites requires bulk_confirmed and a rollback_plan",
                    request.target_sites.len()
                ),
                "bulk_operation",
            )
        }
    }
}

const CRITICAL_ACTION_PATTERNS: &[&str] = &[
    "firmware upgrade",
    "factory reset",
    "config push",
    "vlan change",
    "firewall rule change",
    "ssid modify",
];

/// Critical actions (firmware upgrades, factory resets, config pushes, vlan
/// changes, firewall rule changes, SSID modifications) require a
/// `rollback_plan` of at least 20 characters; otherwise ESCALATE.
pub struct RollbackPlanCheck;

impl Checker for RollbackPlanCheck {
    fn name(&self) -> &'static str {
        "rollback_plan"
    }

    fn check(&self, request: &ActionRequest) -> CheckResult {
        let action = request.action_name.to_lowercase();
        let is_critical = CRITICAL_ACTION_PATTERNS.iter().any(|p| action.contains(p));
        if !is_critical {
            return CheckResult::approved();
        }
        let rollback_len = plan_str(&request.plan, "rollback_plan").map(|s| s.len()).unwrap_or(0);
        if rollback_len >= 20 {
            CheckResult::approved()
        } else {
            CheckResult::escalate(
                format!("critical action '{}' requires a rollback_plan of at least 20 characters", request.action_name),
                "critical_action_no_rollback",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(action: &str, sites: usize, plan: Value) -> ActionRequest {
        ActionRequest {
            action_name: action.to_string(),
            target_sites: (0..sites).map(|i| format!("site-{i}")).collect(),
            target_devices: Vec::new(),
            plan,
            user: "alice".to_string(),
            metadata: json!({}),
        }
    }

    #[test]
    fn bulk_operation_under_threshold_is_approved() {
        let checker = CompositeChecker::with_builtin_checks();
        let result = checker.evaluate(&request("restart devices", 5, json!({})));
        assert_eq!(result.level, RiskLevel::Approved);
    }

    #[test]
    fn bulk_operation_over_threshold_without_confirmation_escalates() {
        let checker = CompositeChecker::with_builtin_checks();
        let result = checker.evaluate(&request("restart devices", 11, json!({})));
        assert_eq!(result.level, RiskLevel::Escalate);
        assert!(result.risk_flags.contains(&"bulk_operation".to_string()));
    }

    #[test]
    fn bulk_operation_over_threshold_with_confirmation_and_rollback_is_approved() {
        let checker = CompositeChecker::with_builtin_checks();
        let plan = json!({ "bulk_confirmed": true, "rollback_plan": "revert via saved config snapshot" });
        let result = checker.evaluate(&request("restart devices", 11, plan));
        assert_eq!(result.level, RiskLevel::Approved);
    }

    #[test]
    fn critical_action_without_rollback_plan_escalates() {
        let checker = CompositeChecker::with_builtin_checks();
        let result = checker.evaluate(&request("perform firmware upgrade", 1, json!({})));
        assert_eq!(result.level, RiskLevel::Escalate);
    }

    #[test]
    fn critical_action_with_short_rollback_plan_still_escalates() {
        let checker = CompositeChecker::with_builtin_checks();
        let plan = json!({ "rollback_plan": "undo it" });
        let result = checker.evaluate(&request("vlan change on core switch", 1, plan));
        assert_eq!(result.level, RiskLevel::Escalate);
    }

    #[test]
    fn critical_action_with_adequate_rollback_plan_is_approved() {
        let checker = CompositeChecker::with_builtin_checks();
        let plan = json!({ "rollback_plan": "reapply the previously exported firewall ruleset" });
        let result = checker.evaluate(&request("firewall rule change", 1, plan));
        assert_eq!(result.level, RiskLevel::Approved);
    }

    #[test]
    fn worst_result_wins_when_multiple_checks_fire() {
        let checker = CompositeChecker::with_builtin_checks();
        let result = checker.evaluate(&request("factory reset", 20, json!({})));
        assert_eq!(result.level, RiskLevel::Escalate);
        assert_eq!(result.risk_flags.len(), 2);
    }
}
