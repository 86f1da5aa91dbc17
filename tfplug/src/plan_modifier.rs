//! Built-in attribute plan modifiers
//!
//! Plan modifiers run after defaults and computed-unknown marking and can:
//! - Modify the planned value
//! - Mark an attribute as requiring replacement
//! - Add warnings or errors to the plan

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::Dynamic;

/// Marks an attribute as requiring replacement when it changes (ForceNew)
pub struct RequiresReplace;

impl RequiresReplace {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this value forces a new resource".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let requires_replace = !request.creating && value_changed(
            &request.state_value.value,
            &request.plan_value.value,
        );

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Signature for conditional replacement: (prior value, planned value)
pub type ReplacePredicate = fn(&Dynamic, &Dynamic) -> bool;

/// Requires replacement only when the value changed and the predicate agrees
pub struct RequiresReplaceIf {
    predicate: ReplacePredicate,
    description: String,
}

impl RequiresReplaceIf {
    pub fn create(description: &str, predicate: ReplacePredicate) -> Box<dyn PlanModifier> {
        Box::new(Self {
            predicate,
            description: description.to_string(),
        })
    }
}

impl PlanModifier for RequiresReplaceIf {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let requires_replace = !request.creating
            && value_changed(&request.state_value.value, &request.plan_value.value)
            && (self.predicate)(&request.state_value.value, &request.plan_value.value);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Uses the current state value when the planned value is unknown
///
/// Keeps computed attributes such as keys and endpoints stable across
/// updates that do not touch them.
pub struct UseStateForUnknown;

impl UseStateForUnknown {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "once set, the value of this attribute in state will not change".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = if request.plan_value.is_unknown() && !request.state_value.is_null() {
            request.state_value.clone()
        } else {
            request.plan_value
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

/// A change is only certain when both sides are known and differ
pub fn value_changed(prior: &Dynamic, planned: &Dynamic) -> bool {
    if prior.contains_unknown() || planned.contains_unknown() {
        return planned.is_unknown() && !prior.is_null();
    }
    !values_equal(prior, planned)
}

/// Structural equality with numeric tolerance
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Unknown, Dynamic::Unknown) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).map(|bv| values_equal(v, bv)).unwrap_or(false))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(state: Dynamic, plan: Dynamic, creating: bool) -> PlanModifierRequest {
        PlanModifierRequest {
            config_value: DynamicValue::new(plan.clone()),
            state_value: DynamicValue::new(state),
            plan_value: DynamicValue::new(plan),
            path: AttributePath::new("location"),
            creating,
        }
    }

    #[test]
    fn requires_replace_on_change() {
        let response = RequiresReplace.modify(request(
            Dynamic::String("westeurope".into()),
            Dynamic::String("northeurope".into()),
            false,
        ));
        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_ignores_equal_and_create() {
        let same = RequiresReplace.modify(request(
            Dynamic::String("westeurope".into()),
            Dynamic::String("westeurope".into()),
            false,
        ));
        assert!(!same.requires_replace);

        let create = RequiresReplace.modify(request(
            Dynamic::Null,
            Dynamic::String("westeurope".into()),
            true,
        ));
        assert!(!create.requires_replace);
    }

    #[test]
    fn requires_replace_if_consults_predicate() {
        fn leaving_none(prior: &Dynamic, _planned: &Dynamic) -> bool {
            prior.as_str() != Some("None")
        }
        let modifier = RequiresReplaceIf::create("only from None", leaving_none);

        let from_none = modifier.modify(request(
            Dynamic::String("None".into()),
            Dynamic::String("Internal".into()),
            false,
        ));
        assert!(!from_none.requires_replace);

        let from_internal = modifier.modify(request(
            Dynamic::String("Internal".into()),
            Dynamic::String("External".into()),
            false,
        ));
        assert!(from_internal.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_restores_prior_value() {
        let response = UseStateForUnknown.modify(request(
            Dynamic::String("key".into()),
            Dynamic::Unknown,
            false,
        ));
        assert_eq!(response.plan_value.value, Dynamic::String("key".into()));

        let create = UseStateForUnknown.modify(request(Dynamic::Null, Dynamic::Unknown, true));
        assert!(create.plan_value.is_unknown());
    }
}
