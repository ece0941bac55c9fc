// patch/permission_files.rs - Default client/API permission files

use crate::document::{is_file, parent_exists, to_compact};
use serde_json::{json, Map, Value};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionFileKind {
    /// `client-permissions.d/<service>.root.json`
    Client,
    /// `api-permissions.d/<service>.api.public.json`
    Api,
}

impl PermissionFileKind {
    pub fn label(&self) -> &'static str {
        match self {
            PermissionFileKind::Client => "client permissions",
            PermissionFileKind::Api => "API permissions",
        }
    }

    pub fn default_contents(&self, service: &str) -> Value {
        match self {
            PermissionFileKind::Client => {
                let mut obj = Map::new();
                obj.insert(format!("{}*", service), json!(["all"]));
                Value::Object(obj)
            }
            PermissionFileKind::Api => json!({ "public": [format!("{}/*", service)] }),
        }
    }
}

/// Decide whether a permission file needs creating and with what contents.
///
/// Returns `None` when the file already exists, or when its directory is
/// missing (the layout does not support that permission category).
pub fn provision_permission_file(
    path: &Path,
    kind: PermissionFileKind,
    service: &str,
) -> Option<String> {
    if !parent_exists(path) || is_file(path) {
        return None;
    }
    Some(to_compact(&kind.default_contents(service)))
}
