use super::Acl;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Whether a rule grants or refuses.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RuleType {
    /// The rule grants the query
    Allow,

    /// The rule refuses the query
    Deny,
}

impl RuleType {
    pub(crate) fn inverted(self) -> Self {
        match self {
            RuleType::Allow => RuleType::Deny,
            RuleType::Deny => RuleType::Allow,
        }
    }
}

/// Whether a rule edit adds or removes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RuleOp {
    /// Install the rule, overwriting any existing one
    Add,

    /// Remove existing rules of the matching type
    Remove,
}

/// A predicate gating whether a rule applies to a query.
pub trait Assertion {
    /// Whether the rule holding this assertion applies to the query.
    fn assert(
        &self,
        acl: &Acl,
        role: Option<&str>,
        resource: Option<&str>,
        privilege: Option<&str>,
    ) -> bool;
}

/// One allow/deny rule with an optional assertion.
#[derive(Clone)]
pub(crate) struct Rule {
    pub(crate) rule_type: RuleType,
    pub(crate) assertion: Option<Rc<dyn Assertion>>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("rule_type", &self.rule_type)
            .field("has_assertion", &self.assertion.is_some())
            .finish()
    }
}

/// The rules attached to one (resource, role) pair.
#[derive(Debug, Clone, Default)]
pub(crate) struct RuleSet {
    /// The rule answering queries with no privilege named
    pub(crate) all_privileges: Option<Rule>,

    /// Rules answering queries about one privilege
    pub(crate) by_privilege: HashMap<String, Rule>,
}
