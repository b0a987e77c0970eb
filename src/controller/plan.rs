//! # Plan
//!
//! Diffs the declared parameter against the last observed state and decides
//! whether to create, update in place, replace, or leave it alone.
//!
//! Replacement is required when:
//! - the name changes (the name is the parameter's identity)
//! - the tier goes from Advanced to Standard (SSM refuses the downgrade)

use crate::state::ParameterState;
use crate::{ParameterSpec, Tier};
use std::fmt;

/// Why an in-place update is not possible
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceReason {
    NameChanged { from: String, to: String },
    TierDowngrade,
}

impl fmt::Display for ReplaceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplaceReason::NameChanged { from, to } => write!(f, "name changed from {from} to {to}"),
            ReplaceReason::TierDowngrade => write!(
                f,
                "tier changed from {} to {}",
                Tier::Advanced,
                Tier::Standard
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    Replace(Vec<ReplaceReason>),
    NoChange,
}

/// Planned action plus the fields that differ
///
/// Field names only; values are never included so ciphertext and stale
/// markers stay out of plan output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub name: String,
    pub action: PlanAction,
    pub changed_fields: Vec<&'static str>,
}

impl Plan {
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.action != PlanAction::NoChange
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            PlanAction::Create => write!(f, "+ create {}", self.name),
            PlanAction::Update => write!(
                f,
                "~ update {} ({})",
                self.name,
                self.changed_fields.join(", ")
            ),
            PlanAction::Replace(reasons) => {
                let reasons = reasons.iter().map(ToString::to_string).collect::<Vec<_>>();
                write!(f, "-/+ replace {} ({})", self.name, reasons.join("; "))
            }
            PlanAction::NoChange => write!(f, "  {} is up to date", self.name),
        }
    }
}

fn optional_str(value: Option<&String>) -> &str {
    value.map_or("", String::as_str)
}

/// Fields of `current` that `desired` would change
#[must_use]
pub fn changed_fields(desired: &ParameterSpec, current: &ParameterState) -> Vec<&'static str> {
    let mut fields = Vec::new();

    if desired.name != current.name {
        fields.push("name");
    }
    if optional_str(desired.description.as_ref()) != optional_str(current.description.as_ref()) {
        fields.push("description");
    }
    if desired.tier != current.tier {
        fields.push("tier");
    }
    if desired.r#type != current.r#type {
        fields.push("type");
    }
    // A stale-value marker in state never equals a real ciphertext
    if desired.encrypted_value != current.encrypted_value {
        fields.push("encrypted_value");
    }
    if desired.encryption_key != current.encryption_key {
        fields.push("encryption_key");
    }
    // Unset data type is filled in by the store; only a declared one is compared
    if desired.data_type.is_some() && desired.data_type != current.data_type {
        fields.push("data_type");
    }
    if desired.overwrite != current.overwrite {
        fields.push("overwrite");
    }
    if optional_str(desired.allowed_pattern.as_ref())
        != optional_str(current.allowed_pattern.as_ref())
    {
        fields.push("allowed_pattern");
    }
    if desired.tags != current.tags {
        fields.push("tags");
    }

    fields
}

/// Plan the change from `current` (`None` when nothing exists) to `desired`
#[must_use]
pub fn plan(desired: &ParameterSpec, current: Option<&ParameterState>) -> Plan {
    let Some(current) = current else {
        return Plan {
            name: desired.name.clone(),
            action: PlanAction::Create,
            changed_fields: Vec::new(),
        };
    };

    let changed = changed_fields(desired, current);

    let mut reasons = Vec::new();
    if desired.name != current.name {
        reasons.push(ReplaceReason::NameChanged {
            from: current.name.clone(),
            to: desired.name.clone(),
        });
    }
    if current.tier == Tier::Advanced && desired.tier == Tier::Standard {
        reasons.push(ReplaceReason::TierDowngrade);
    }

    let action = if !reasons.is_empty() {
        PlanAction::Replace(reasons)
    } else if changed.is_empty() {
        PlanAction::NoChange
    } else {
        PlanAction::Update
    };

    Plan {
        name: desired.name.clone(),
        action,
        changed_fields: changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::OUTDATED_VALUE_SENTINEL;
    use crate::{DataType, ParameterType};
    use std::collections::BTreeMap;

    fn desired() -> ParameterSpec {
        ParameterSpec {
            name: "/app/key".to_string(),
            description: None,
            tier: Tier::Standard,
            r#type: ParameterType::SecureString,
            encrypted_value: "Y2lwaGVy".to_string(),
            encryption_key: "alias/app".to_string(),
            data_type: None,
            overwrite: None,
            allowed_pattern: None,
            tags: BTreeMap::from([("env".to_string(), "prod".to_string())]),
        }
    }

    fn observed() -> ParameterState {
        ParameterState {
            id: "/app/key".to_string(),
            name: "/app/key".to_string(),
            description: Some(String::new()),
            tier: Tier::Standard,
            r#type: ParameterType::SecureString,
            encrypted_value: "Y2lwaGVy".to_string(),
            encryption_key: "alias/app".to_string(),
            key_id: Some("alias/app".to_string()),
            arn: Some("arn:aws:ssm:us-east-1:111122223333:parameter/app/key".to_string()),
            data_type: Some(DataType::Text),
            overwrite: None,
            allowed_pattern: Some(String::new()),
            version: 1,
            tags: BTreeMap::from([("env".to_string(), "prod".to_string())]),
        }
    }

    #[test]
    fn test_nothing_observed_plans_create() {
        assert_eq!(plan(&desired(), None).action, PlanAction::Create);
    }

    #[test]
    fn test_matching_state_plans_nothing() {
        let result = plan(&desired(), Some(&observed()));
        assert_eq!(result.action, PlanAction::NoChange);
        assert!(!result.has_changes());
    }

    #[test]
    fn test_stale_value_plans_update() {
        let mut current = observed();
        current.encrypted_value = OUTDATED_VALUE_SENTINEL.to_string();
        let result = plan(&desired(), Some(&current));
        assert_eq!(result.action, PlanAction::Update);
        assert_eq!(result.changed_fields, vec!["encrypted_value"]);
    }

    #[test]
    fn test_tier_upgrade_updates_in_place() {
        let mut wanted = desired();
        wanted.tier = Tier::Advanced;
        let result = plan(&wanted, Some(&observed()));
        assert_eq!(result.action, PlanAction::Update);
        assert_eq!(result.changed_fields, vec!["tier"]);
    }

    #[test]
    fn test_tier_downgrade_replaces() {
        let mut current = observed();
        current.tier = Tier::Advanced;
        let result = plan(&desired(), Some(&current));
        assert_eq!(
            result.action,
            PlanAction::Replace(vec![ReplaceReason::TierDowngrade])
        );
    }

    #[test]
    fn test_rename_replaces() {
        let mut wanted = desired();
        wanted.name = "/app/other".to_string();
        let result = plan(&wanted, Some(&observed()));
        assert!(matches!(
            result.action,
            PlanAction::Replace(ref reasons) if reasons.len() == 1
        ));
        assert!(result.to_string().contains("name changed from /app/key to /app/other"));
    }

    #[test]
    fn test_undeclared_data_type_is_not_a_change() {
        let mut wanted = desired();
        assert!(!changed_fields(&wanted, &observed()).contains(&"data_type"));

        wanted.data_type = Some(DataType::Ec2Image);
        assert_eq!(changed_fields(&wanted, &observed()), vec!["data_type"]);
    }

    #[test]
    fn test_tag_changes_are_updates() {
        let mut wanted = desired();
        wanted.tags.insert("team".to_string(), "core".to_string());
        let result = plan(&wanted, Some(&observed()));
        assert_eq!(result.action, PlanAction::Update);
        assert_eq!(result.changed_fields, vec!["tags"]);
        assert_eq!(result.to_string(), "~ update /app/key (tags)");
    }
}
