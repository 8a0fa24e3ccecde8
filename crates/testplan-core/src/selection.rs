//! Selection rule deciding how broad the plan is.

use crate::trigger::TriggerContext;
use std::fmt;

/// Label whose presence on a reviewable change forces broad mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionRule {
    ci_condition_label: String,
}

impl SelectionRule {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            ci_condition_label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.ci_condition_label
    }
}

/// How much of each gated axis the plan keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionMode {
    /// Every candidate of every axis.
    Broad,

    /// Only essential candidates on gated axes.
    Narrow,
}

impl SelectionMode {
    /// Pick the mode for a trigger.
    pub fn select(context: &TriggerContext, rule: &SelectionRule) -> Self {
        if should_include_all(context, rule) {
            SelectionMode::Broad
        } else {
            SelectionMode::Narrow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Broad => "broad",
            SelectionMode::Narrow => "narrow",
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the plan includes every candidate.
///
/// True for anything that is not a reviewable change (push, manual run,
/// schedule) and for reviewable changes labelled with the rule's label.
pub fn should_include_all(context: &TriggerContext, rule: &SelectionRule) -> bool {
    !context.is_reviewable_change || context.has_label(rule.label())
}
