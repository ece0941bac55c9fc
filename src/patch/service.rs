// patch/service.rs - Service definition classification and Exec= rewriting

use super::Patched;
use crate::error::{ElevateError, Result};
use std::path::Path;

const JS_LAUNCHER_MARKER: &str = "/run-js-service";
const JAILER_MARKER: &str = "/jailer";
const MEDIA_EXEC_MARKER: &str = "Exec=/media";

const JS_LAUNCHER_EXEC: &str = "Exec=/usr/bin/run-js-service";
const JAILER_EXEC: &str = "Exec=/usr/bin/jailer ";

pub const JS_LAUNCHER_NAME: &str = "run-js-service";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Launched through the JS service runner.
    Scripted,
    /// Launched through the jailer sandbox.
    Native,
    /// Already runs from developer media; nothing to do.
    MediaMounted,
    Unknown,
}

/// Classify a service definition. Rules are checked in order, first match wins:
///
/// 1. mentions `/run-js-service` → [`ServiceKind::Scripted`]
/// 2. mentions `/jailer` → [`ServiceKind::Native`]
/// 3. contains `Exec=/media` → [`ServiceKind::MediaMounted`]
/// 4. otherwise [`ServiceKind::Unknown`]
pub fn classify(text: &str) -> ServiceKind {
    if text.contains(JS_LAUNCHER_MARKER) {
        ServiceKind::Scripted
    } else if text.contains(JAILER_MARKER) {
        ServiceKind::Native
    } else if text.contains(MEDIA_EXEC_MARKER) {
        ServiceKind::MediaMounted
    } else {
        ServiceKind::Unknown
    }
}

/// Apply `rewrite` to the body of every line, keeping line terminators intact.
fn map_lines(text: &str, rewrite: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (body, ending) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        match rewrite(body) {
            Some(new_body) => out.push_str(&new_body),
            None => out.push_str(body),
        }
        out.push_str(ending);
    }
    out
}

/// Point every `Exec=/usr/bin/run-js-service...` line at `launcher` instead.
pub fn rewrite_scripted(text: &str, launcher: &Path) -> String {
    let replacement = format!("Exec={}", launcher.display());
    map_lines(text, |line| {
        line.strip_prefix(JS_LAUNCHER_EXEC)
            .map(|rest| format!("{}{}", replacement, rest))
    })
}

/// Strip the jailer and its arguments, keeping only the final token.
///
/// `Exec=/usr/bin/jailer -t native -i id /opt/bin/svc` becomes `Exec=/opt/bin/svc`.
/// A jailer line without at least one argument before the binary is left alone.
pub fn rewrite_native(text: &str) -> String {
    map_lines(text, |line| {
        let args = line.strip_prefix(JAILER_EXEC)?;
        let (_, binary) = args.rsplit_once(' ')?;
        Some(format!("Exec={}", binary))
    })
}

/// Classify `text` and rewrite its launch directive for elevated execution.
///
/// `launcher` is the co-located `run-js-service` used for scripted services;
/// if it is missing the definition is left untouched and
/// [`ElevateError::MissingDependency`] is returned.
pub fn patch_service_definition(
    text: &str,
    launcher: &Path,
) -> Result<(ServiceKind, Patched<String>)> {
    let kind = classify(text);
    let patched = match kind {
        ServiceKind::Scripted => {
            if !launcher.exists() {
                return Err(ElevateError::MissingDependency {
                    name: JS_LAUNCHER_NAME,
                    path: launcher.to_path_buf(),
                });
            }
            rewrite_scripted(text, launcher)
        }
        ServiceKind::Native => rewrite_native(text),
        ServiceKind::MediaMounted | ServiceKind::Unknown => text.to_string(),
    };
    let changed = patched != text;
    Ok((
        kind,
        Patched {
            value: patched,
            changed,
        },
    ))
}
