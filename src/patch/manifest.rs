// patch/manifest.rs - Linking permission files into an app manifest

use super::Patched;
use serde_json::Value;
use tracing::info;

const CLIENT_FIELD: &str = "clientPermissionFiles";
const API_FIELD: &str = "apiPermissionFiles";

/// Ensure the manifest's permission file lists reference our files.
///
/// Only lists the manifest already declares are touched; a manifest without
/// `clientPermissionFiles` / `apiPermissionFiles` predates that mechanism and
/// stays as it is.
pub fn link_permission_files(
    manifest: &Value,
    client_file: &str,
    api_file: &str,
) -> Patched<Value> {
    let mut out = manifest.clone();
    let mut changed = false;

    for (field, file) in [(CLIENT_FIELD, client_file), (API_FIELD, api_file)] {
        let Some(list) = out.get_mut(field).and_then(Value::as_array_mut) else {
            continue;
        };
        if !list.iter().any(|v| v.as_str() == Some(file)) {
            info!("manifest - adding {} entry {}", field, file);
            list.push(Value::String(file.to_string()));
            changed = true;
        }
    }

    Patched { value: out, changed }
}
