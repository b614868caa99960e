//! The access-control engine.
//!
//! Roles form a DAG, resources form a tree, and rules attach to
//! (resource, role) pairs, either for all privileges or per privilege.
//! `is_allowed` walks resources from the named one up to the implicit
//! all-resources node; at each resource it searches the role DAG depth
//! first, most-recently-added parent first. The engine is a whitelist: the
//! global default rule always exists and starts as a deny.

mod resource;
mod role;
mod rule;

pub use resource::ResourceRegistry;
pub use role::RoleRegistry;
pub use rule::{Assertion, RuleOp, RuleType};

use crate::errors::AclError;
use rule::{Rule, RuleSet};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

type RuleTable = HashMap<Option<String>, HashMap<Option<String>, RuleSet>>;

/// The access-control list.
pub struct Acl {
    roles: RoleRegistry,
    resources: ResourceRegistry,
    rules: RuleTable,
}

impl Default for Acl {
    fn default() -> Self {
        Self::new()
    }
}

impl Acl {
    /// An empty ACL holding only the default deny rule.
    pub fn new() -> Self {
        let mut rules: RuleTable = HashMap::new();
        rules.entry(None).or_default().entry(None).or_default().all_privileges = Some(Rule {
            rule_type: RuleType::Deny,
            assertion: None,
        });

        Self {
            roles: RoleRegistry::default(),
            resources: ResourceRegistry::default(),
            rules,
        }
    }

    /// Register a role under its parents; the last-listed parent gets the
    /// highest search priority.
    pub fn add_role(&mut self, id: &str, parents: &[&str]) -> Result<(), AclError> {
        self.roles.add(id, parents)
    }

    /// Register a resource under an optional parent resource.
    pub fn add_resource(&mut self, id: &str, parent: Option<&str>) -> Result<(), AclError> {
        self.resources.add(id, parent)
    }

    /// Whether a role is registered.
    pub fn has_role(&self, id: &str) -> bool {
        self.roles.has(id)
    }

    /// Whether a resource is registered.
    pub fn has_resource(&self, id: &str) -> bool {
        self.resources.has(id)
    }

    /// Install an allow rule; `None` buckets mean all roles, all resources
    /// or all privileges.
    pub fn allow(
        &mut self,
        roles: Option<&[&str]>,
        resources: Option<&[&str]>,
        privileges: Option<&[&str]>,
    ) {
        self.set_rule(RuleOp::Add, RuleType::Allow, roles, resources, privileges, None);
    }

    /// Install a deny rule; `None` buckets mean all roles, all resources or
    /// all privileges.
    pub fn deny(
        &mut self,
        roles: Option<&[&str]>,
        resources: Option<&[&str]>,
        privileges: Option<&[&str]>,
    ) {
        self.set_rule(RuleOp::Add, RuleType::Deny, roles, resources, privileges, None);
    }

    /// Edit the rule table.
    ///
    /// `Add` overwrites the targeted slots; `Remove` clears slots whose
    /// current type matches `rule_type`. Removing the global default does
    /// not delete it but resets it to an assertion-free deny.
    pub fn set_rule(
        &mut self,
        op: RuleOp,
        rule_type: RuleType,
        roles: Option<&[&str]>,
        resources: Option<&[&str]>,
        privileges: Option<&[&str]>,
        assertion: Option<Rc<dyn Assertion>>,
    ) {
        let resource_keys: Vec<Option<String>> = match resources {
            Some(ids) => ids.iter().map(|r| Some((*r).to_string())).collect(),
            None => vec![None],
        };
        let role_keys: Vec<Option<String>> = match roles {
            Some(ids) => ids.iter().map(|r| Some((*r).to_string())).collect(),
            None => vec![None],
        };

        for resource_key in &resource_keys {
            for role_key in &role_keys {
                let set = self
                    .rules
                    .entry(resource_key.clone())
                    .or_default()
                    .entry(role_key.clone())
                    .or_default();

                match (op, privileges) {
                    (RuleOp::Add, None) => {
                        set.all_privileges = Some(Rule {
                            rule_type,
                            assertion: assertion.clone(),
                        });
                    }
                    (RuleOp::Add, Some(privileges)) => {
                        for privilege in privileges {
                            set.by_privilege.insert(
                                (*privilege).to_string(),
                                Rule {
                                    rule_type,
                                    assertion: assertion.clone(),
                                },
                            );
                        }
                    }
                    (RuleOp::Remove, None) => {
                        let matches = set
                            .all_privileges
                            .as_ref()
                            .map(|r| r.rule_type == rule_type)
                            .unwrap_or(false);
                        if matches {
                            if resource_key.is_none() && role_key.is_none() {
                                // the global default survives edits
                                set.all_privileges = Some(Rule {
                                    rule_type: RuleType::Deny,
                                    assertion: None,
                                });
                            } else {
                                set.all_privileges = None;
                            }
                        }
                    }
                    (RuleOp::Remove, Some(privileges)) => {
                        for privilege in privileges {
                            let matches = set
                                .by_privilege
                                .get(*privilege)
                                .map(|r| r.rule_type == rule_type)
                                .unwrap_or(false);
                            if matches {
                                set.by_privilege.remove(*privilege);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Whether `role` may exercise `privilege` on `resource`.
    ///
    /// `None` means all roles, all resources or all privileges. With no
    /// applicable rule anywhere on the walk the answer is `false`.
    pub fn is_allowed(
        &self,
        role: Option<&str>,
        resource: Option<&str>,
        privilege: Option<&str>,
    ) -> bool {
        let mut cursor = resource;
        loop {
            if let Some(result) = self.role_search(role, cursor, privilege) {
                return result;
            }
            match cursor {
                Some(id) => cursor = self.resources.parent_of(id).flatten(),
                // the all-resources node was just searched; the walk ends
                None => return false,
            }
        }
    }

    /// Search the role DAG at one fixed resource.
    fn role_search(
        &self,
        role: Option<&str>,
        resource: Option<&str>,
        privilege: Option<&str>,
    ) -> Option<bool> {
        if let Some(role) = role {
            let mut visited: HashSet<&str> = HashSet::new();
            let mut stack: Vec<&str> = vec![role];

            while let Some(node) = stack.pop() {
                if !visited.insert(node) {
                    continue;
                }
                if let Some(result) = self.visit_role(resource, Some(node), privilege) {
                    return Some(result);
                }
                if let Some(parents) = self.roles.parents(node) {
                    // pushed in registration order, so the last-added
                    // parent pops first
                    for parent in parents {
                        stack.push(parent.as_str());
                    }
                }
            }
        }

        // the all-roles bucket answers after the DAG is exhausted
        self.visit_role(resource, None, privilege)
    }

    /// Consult the rules at one (resource, role) node.
    fn visit_role(
        &self,
        resource: Option<&str>,
        role: Option<&str>,
        privilege: Option<&str>,
    ) -> Option<bool> {
        match privilege {
            Some(privilege) => {
                if let Some(rule_type) = self.rule_type(resource, role, Some(privilege)) {
                    return Some(rule_type == RuleType::Allow);
                }
                if let Some(rule_type) = self.rule_type(resource, role, None) {
                    return Some(rule_type == RuleType::Allow);
                }
                None
            }
            None => {
                let rules = self.rule_set(resource, role)?;
                // any applicable per-privilege deny refuses the broad query
                for privilege in rules.by_privilege.keys() {
                    if self.rule_type(resource, role, Some(privilege)) == Some(RuleType::Deny) {
                        return Some(false);
                    }
                }
                self.rule_type(resource, role, None)
                    .map(|rule_type| rule_type == RuleType::Allow)
            }
        }
    }

    fn rule_set(&self, resource: Option<&str>, role: Option<&str>) -> Option<&RuleSet> {
        self.rules
            .get(&resource.map(str::to_string))?
            .get(&role.map(str::to_string))
    }

    /// The effective type of the rule at one slot, gated by its assertion.
    fn rule_type(
        &self,
        resource: Option<&str>,
        role: Option<&str>,
        privilege: Option<&str>,
    ) -> Option<RuleType> {
        let rules = self.rule_set(resource, role)?;
        let rule = match privilege {
            None => rules.all_privileges.as_ref()?,
            Some(privilege) => rules.by_privilege.get(privilege)?,
        };

        match &rule.assertion {
            None => Some(rule.rule_type),
            Some(assertion) => {
                if assertion.assert(self, role, resource, privilege) {
                    Some(rule.rule_type)
                } else if resource.is_none() && role.is_none() && privilege.is_none() {
                    // a failed assertion flips only the global default
                    Some(rule.rule_type.inverted())
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_acl_denies_everything() {
        let acl = Acl::new();
        assert!(!acl.is_allowed(None, None, None));
        assert!(!acl.is_allowed(Some("anyone"), Some("anything"), Some("anyhow")));
    }

    #[test]
    fn last_added_parent_wins() {
        let mut acl = Acl::new();
        acl.add_role("a", &[]).unwrap();
        acl.add_role("b", &[]).unwrap();
        acl.add_role("c", &["a", "b"]).unwrap();
        acl.add_resource("r", None).unwrap();

        acl.deny(Some(&["a"]), Some(&["r"]), Some(&["read"]));
        acl.allow(Some(&["b"]), Some(&["r"]), Some(&["read"]));

        assert!(acl.is_allowed(Some("c"), Some("r"), Some("read")));
    }

    #[test]
    fn deny_on_later_parent_refuses() {
        let mut acl = Acl::new();
        acl.add_role("guest", &[]).unwrap();
        acl.add_role("admin", &[]).unwrap();
        acl.add_role("user", &["guest", "admin"]).unwrap();
        acl.add_resource("r", None).unwrap();

        acl.allow(Some(&["guest"]), Some(&["r"]), Some(&["read"]));
        acl.deny(Some(&["admin"]), Some(&["r"]), Some(&["read"]));

        assert!(!acl.is_allowed(Some("user"), Some("r"), Some("read")));
    }

    #[test]
    fn resources_inherit_from_parents() {
        let mut acl = Acl::new();
        acl.add_role("user", &[]).unwrap();
        acl.add_resource("area", None).unwrap();
        acl.add_resource("page", Some("area")).unwrap();

        acl.allow(Some(&["user"]), Some(&["area"]), None);

        assert!(acl.is_allowed(Some("user"), Some("page"), Some("view")));
        assert!(!acl.is_allowed(Some("other"), Some("page"), Some("view")));
    }

    struct Never;
    impl Assertion for Never {
        fn assert(&self, _: &Acl, _: Option<&str>, _: Option<&str>, _: Option<&str>) -> bool {
            false
        }
    }

    #[test]
    fn failed_default_assertion_inverts() {
        let mut acl = Acl::new();
        acl.set_rule(
            RuleOp::Add,
            RuleType::Allow,
            None,
            None,
            None,
            Some(Rc::new(Never)),
        );
        assert!(!acl.is_allowed(None, None, None));
    }

    #[test]
    fn failed_assertion_elsewhere_is_not_applicable() {
        let mut acl = Acl::new();
        acl.add_role("user", &[]).unwrap();
        acl.add_resource("r", None).unwrap();
        acl.set_rule(
            RuleOp::Add,
            RuleType::Allow,
            Some(&["user"]),
            Some(&["r"]),
            None,
            Some(Rc::new(Never)),
        );
        // falls through to the global default deny
        assert!(!acl.is_allowed(Some("user"), Some("r"), Some("read")));
    }

    #[test]
    fn per_privilege_deny_refuses_broad_queries() {
        let mut acl = Acl::new();
        acl.add_role("user", &[]).unwrap();
        acl.add_resource("r", None).unwrap();
        acl.allow(Some(&["user"]), Some(&["r"]), None);
        acl.deny(Some(&["user"]), Some(&["r"]), Some(&["delete"]));

        assert!(acl.is_allowed(Some("user"), Some("r"), Some("read")));
        assert!(!acl.is_allowed(Some("user"), Some("r"), None));
    }

    #[test]
    fn removing_the_default_resets_it() {
        let mut acl = Acl::new();
        acl.allow(None, None, None);
        assert!(acl.is_allowed(None, None, None));

        acl.set_rule(RuleOp::Remove, RuleType::Allow, None, None, None, None);
        assert!(!acl.is_allowed(None, None, None));
    }

    #[test]
    fn remove_only_matches_same_type() {
        let mut acl = Acl::new();
        acl.add_role("user", &[]).unwrap();
        acl.add_resource("r", None).unwrap();
        acl.allow(Some(&["user"]), Some(&["r"]), Some(&["read"]));

        acl.set_rule(
            RuleOp::Remove,
            RuleType::Deny,
            Some(&["user"]),
            Some(&["r"]),
            Some(&["read"]),
            None,
        );
        assert!(acl.is_allowed(Some("user"), Some("r"), Some("read")));
    }
}
