// patch/roles.rs - Role document reconciliation (allowedNames + permission grants)

use super::Patched;
use serde_json::{json, Value};
use tracing::info;

pub const WILDCARD: &str = "*";

/// Names that must be grantable for the elevated service, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredNames(Vec<String>);

impl RequiredNames {
    /// Build from a list, dropping empty entries and repeats.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names.into_iter().map(Into::into) {
            if !name.is_empty() && !out.contains(&name) {
                out.push(name);
            }
        }
        RequiredNames(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for RequiredNames {
    fn default() -> Self {
        RequiredNames::new(["*", "com.webos.service.capture.client*"])
    }
}

/// The permission record written for a name that has none yet.
fn open_grant(service: &str) -> Value {
    json!({ "service": service, "inbound": [WILDCARD], "outbound": [WILDCARD] })
}

fn contains_str(list: &[Value], needle: &str) -> bool {
    list.iter().any(|v| v.as_str() == Some(needle))
}

/// Append every required name missing from `list`. Returns true if anything was added.
fn append_missing(list: &mut Vec<Value>, required: &RequiredNames) -> bool {
    let mut changed = false;
    for name in required.iter() {
        if !contains_str(list, name) {
            list.push(Value::String(name.to_string()));
            changed = true;
        }
    }
    changed
}

/// Merge `required` into a role document, append-only.
///
/// Both `role.allowedNames` (ls2-dev / legacy shape) and top-level
/// `allowedNames` (luna-service2 shape) are extended when present. When the
/// document carries `permissions`, every grant's outbound list gains `*`, and
/// required names with no grant of their own get a fully open one.
///
/// Fields that are absent are never created.
pub fn reconcile_roles(doc: &Value, required: &RequiredNames) -> Patched<Value> {
    let mut out = doc.clone();
    let mut changed = false;

    if let Some(list) = out
        .pointer_mut("/role/allowedNames")
        .and_then(Value::as_array_mut)
    {
        changed |= append_missing(list, required);
    }

    if let Some(list) = out.get_mut("allowedNames").and_then(Value::as_array_mut) {
        changed |= append_missing(list, required);
    }

    if let Some(grants) = out.get_mut("permissions").and_then(Value::as_array_mut) {
        let mut missing: Vec<&str> = required.iter().collect();

        for grant in grants.iter_mut() {
            if let Some(service) = grant.get("service").and_then(Value::as_str) {
                missing.retain(|name| *name != service);
            }
            // Applies to every grant, not only the required ones.
            if let Some(outbound) = grant.get_mut("outbound").and_then(Value::as_array_mut) {
                if !contains_str(outbound, WILDCARD) {
                    outbound.push(Value::String(WILDCARD.to_string()));
                    changed = true;
                }
            }
        }

        for name in missing {
            info!("Adding permission for name: {}", name);
            grants.push(open_grant(name));
            changed = true;
        }
    }

    Patched { value: out, changed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> RequiredNames {
        RequiredNames::new(list.iter().copied())
    }

    fn strings(value: &Value) -> Vec<String> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_open_grant_shape() {
        assert_eq!(
            serde_json::to_string(&open_grant("bar*")).unwrap(),
            r#"{"service":"bar*","inbound":["*"],"outbound":["*"]}"#
        );
    }

    #[test]
    fn test_required_names_dedup_keeps_order() {
        let set = RequiredNames::new(["b", "*", "b", "", "a"]);
        assert_eq!(set.iter().collect::<Vec<_>>(), ["b", "*", "a"]);
    }

    #[test]
    fn test_top_level_allowed_names_appended() {
        let doc = json!({"allowedNames": ["foo"]});
        let patched = reconcile_roles(&doc, &names(&["*", "bar*"]));
        assert!(patched.changed);
        assert_eq!(patched.value, json!({"allowedNames": ["foo", "*", "bar*"]}));
        assert_eq!(
            serde_json::to_string(&patched.value).unwrap(),
            r#"{"allowedNames":["foo","*","bar*"]}"#
        );
    }

    #[test]
    fn test_nested_role_allowed_names_appended() {
        let doc = json!({"role": {"exeName": "/bin/x", "allowedNames": ["*"]}});
        let patched = reconcile_roles(&doc, &names(&["*", "bar*"]));
        assert!(patched.changed);
        assert_eq!(
            patched.value,
            json!({"role": {"exeName": "/bin/x", "allowedNames": ["*", "bar*"]}})
        );
    }

    #[test]
    fn test_both_shapes_updated_independently() {
        let doc = json!({"role": {"allowedNames": ["bar*"]}, "allowedNames": ["*"]});
        let patched = reconcile_roles(&doc, &names(&["*", "bar*"]));
        assert_eq!(strings(&patched.value["role"]["allowedNames"]), ["bar*", "*"]);
        assert_eq!(strings(&patched.value["allowedNames"]), ["*", "bar*"]);
    }

    #[test]
    fn test_absent_fields_not_created() {
        let doc = json!({"role": {"exeName": "/bin/x"}});
        let patched = reconcile_roles(&doc, &RequiredNames::default());
        assert!(!patched.changed);
        assert_eq!(patched.value, doc);
    }

    #[test]
    fn test_missing_grants_added_with_wildcards() {
        let doc = json!({"allowedNames": ["*"], "permissions": []});
        let patched = reconcile_roles(&doc, &names(&["*", "bar*"]));
        assert_eq!(
            patched.value["permissions"],
            json!([
                {"service": "*", "inbound": ["*"], "outbound": ["*"]},
                {"service": "bar*", "inbound": ["*"], "outbound": ["*"]}
            ])
        );
    }

    #[test]
    fn test_outbound_broadened_on_unrelated_grants() {
        let doc = json!({
            "permissions": [
                {"service": "com.other", "inbound": ["a"], "outbound": ["b"]},
                {"service": "*", "inbound": ["*"], "outbound": []},
                {"service": "bar*", "inbound": ["*"], "outbound": ["*"]}
            ]
        });
        let patched = reconcile_roles(&doc, &names(&["*", "bar*"]));
        assert!(patched.changed);

        let grants = patched.value["permissions"].as_array().unwrap();
        assert_eq!(grants.len(), 3, "satisfied names must not be re-added");
        for grant in grants {
            assert!(strings(&grant["outbound"]).contains(&"*".to_string()));
        }
        assert_eq!(strings(&grants[0]["outbound"]), ["b", "*"]);
        assert_eq!(strings(&grants[0]["inbound"]), ["a"]);
    }

    #[test]
    fn test_grant_without_outbound_left_alone() {
        let doc = json!({"permissions": [{"service": "com.other", "inbound": ["a"]}]});
        let patched = reconcile_roles(&doc, &names(&["*"]));
        let grants = patched.value["permissions"].as_array().unwrap();
        assert_eq!(grants[0], json!({"service": "com.other", "inbound": ["a"]}));
        assert_eq!(grants.len(), 2);
    }

    #[test]
    fn test_required_name_coverage() {
        let doc = json!({
            "permissions": [{"service": "com.other", "inbound": [], "outbound": []}]
        });
        let required = RequiredNames::default();
        let patched = reconcile_roles(&doc, &required);

        let grants = patched.value["permissions"].as_array().unwrap();
        for name in required.iter() {
            let grant = grants
                .iter()
                .find(|g| g["service"].as_str() == Some(name))
                .unwrap_or_else(|| panic!("no grant for {}", name));
            assert!(!grant["inbound"].as_array().unwrap().is_empty());
            assert!(!grant["outbound"].as_array().unwrap().is_empty());
        }
    }

    #[test]
    fn test_reconcile_is_monotonic_and_leaves_input_alone() {
        let doc = json!({
            "allowedNames": ["x", "y"],
            "permissions": [{"service": "x", "inbound": ["i"], "outbound": ["o"]}]
        });
        let before = doc.clone();
        let patched = reconcile_roles(&doc, &RequiredNames::default());

        assert_eq!(doc, before);
        let after_names = strings(&patched.value["allowedNames"]);
        for name in strings(&before["allowedNames"]) {
            assert!(after_names.contains(&name));
        }
        let after_grants = patched.value["permissions"].as_array().unwrap();
        assert!(!after_grants.is_empty());
        assert_eq!(after_grants[0]["service"], "x");
        assert_eq!(strings(&after_grants[0]["inbound"]), ["i"]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let doc = json!({
            "role": {"allowedNames": ["foo"]},
            "permissions": [{"service": "foo", "inbound": ["*"], "outbound": ["bar"]}]
        });
        let first = reconcile_roles(&doc, &RequiredNames::default());
        assert!(first.changed);
        let second = reconcile_roles(&first.value, &RequiredNames::default());
        assert!(!second.changed);
        assert_eq!(second.value, first.value);
    }
}
