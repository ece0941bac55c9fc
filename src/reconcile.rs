// reconcile.rs - Per-layout reconciliation and change aggregation

use crate::document::{atomic_write, read_object, read_text, to_compact};
use crate::error::Result;
use crate::layout::{
    applicable_layouts, Artifact, Identity, LayoutArtifacts, LegacyArtifacts, ModernArtifacts,
    Sysroot,
};
use crate::patch::manifest::link_permission_files;
use crate::patch::permission_files::{provision_permission_file, PermissionFileKind};
use crate::patch::roles::{reconcile_roles, RequiredNames};
use crate::patch::service::{patch_service_definition, ServiceKind};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Everything a reconciliation pass needs. Shared by every layout.
pub struct ReconcileContext<'a> {
    pub identity: &'a Identity,
    pub sysroot: &'a Sysroot,
    /// Co-located `run-js-service` that scripted services are pointed at.
    pub launcher: &'a Path,
    pub required_names: &'a RequiredNames,
    pub dry_run: bool,
}

/// Summary of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub layouts: Vec<&'static str>,
    pub updated: Vec<PathBuf>,
    pub created: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl RunSummary {
    /// True once any artifact was rewritten or created.
    pub fn changed(&self) -> bool {
        !self.updated.is_empty() || !self.created.is_empty()
    }

    pub fn merge(mut self, other: RunSummary) -> RunSummary {
        self.layouts.extend(other.layouts);
        self.updated.extend(other.updated);
        self.created.extend(other.created);
        self.failed.extend(other.failed);
        self
    }
}

impl ReconcileContext<'_> {
    fn write(&self, artifact: &Artifact, contents: &str) -> Result<()> {
        if self.dry_run {
            info!("> Would write {}", artifact.physical.display());
            return Ok(());
        }
        atomic_write(&artifact.physical, contents)
    }

    /// Write a changed artifact back, logging the before/after at debug level.
    fn persist(&self, artifact: &Artifact, what: &str, before: &str, after: &str) -> Result<()> {
        info!("Updating {}: {}", what, artifact.physical.display());
        debug!("- {}", before);
        debug!("+ {}", after);
        self.write(artifact, after)
    }
}

fn patch_service_file(
    ctx: &ReconcileContext,
    artifact: &Artifact,
    summary: &mut RunSummary,
) -> Result<()> {
    let original = read_text(&artifact.physical)?;
    let (kind, patched) = match patch_service_definition(&original, ctx.launcher) {
        Ok(result) => result,
        Err(e) if e.is_artifact_scoped() => {
            error!("{}: {}", artifact.physical.display(), e);
            summary.failed.push((artifact.physical.clone(), e.to_string()));
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let shown = artifact.physical.display();
    match kind {
        ServiceKind::Scripted => info!("{} is a JS service", shown),
        ServiceKind::Native => info!("{} is a native service", shown),
        ServiceKind::MediaMounted => debug!("{} already runs from /media", shown),
        ServiceKind::Unknown => {
            warn!("{}: unknown service type, this may cause some troubles", shown)
        }
    }

    if patched.changed {
        ctx.persist(artifact, "service definition", &original, &patched.value)?;
        summary.updated.push(artifact.physical.clone());
    }
    Ok(())
}

fn provision(
    ctx: &ReconcileContext,
    artifact: &Artifact,
    kind: PermissionFileKind,
    summary: &mut RunSummary,
) -> Result<()> {
    if let Some(contents) =
        provision_permission_file(&artifact.physical, kind, &ctx.identity.service)
    {
        info!("Creating {} file: {}", kind.label(), artifact.physical.display());
        ctx.write(artifact, &contents)?;
        summary.created.push(artifact.physical.clone());
    }
    Ok(())
}

fn patch_roles_file(
    ctx: &ReconcileContext,
    artifact: &Artifact,
    summary: &mut RunSummary,
) -> Result<()> {
    if !artifact.exists() {
        return Ok(());
    }
    let (raw, doc) = read_object(&artifact.physical)?;
    let patched = reconcile_roles(&doc, ctx.required_names);
    if patched.changed {
        ctx.persist(artifact, "roles definition", &raw, &to_compact(&patched.value))?;
        summary.updated.push(artifact.physical.clone());
    }
    Ok(())
}

fn link_manifest(
    ctx: &ReconcileContext,
    manifest: &Artifact,
    client_file: &Artifact,
    api_file: &Artifact,
    summary: &mut RunSummary,
) -> Result<()> {
    if !manifest.exists() {
        return Ok(());
    }
    info!("Found webOS 4.x+ manifest file: {}", manifest.physical.display());
    let (raw, doc) = read_object(&manifest.physical)?;
    // Manifests reference files by their on-device path, not the sysroot path.
    let patched = link_permission_files(
        &doc,
        &client_file.logical_str(),
        &api_file.logical_str(),
    );
    if patched.changed {
        ctx.persist(manifest, "manifest file", &raw, &to_compact(&patched.value))?;
        summary.updated.push(manifest.physical.clone());
    }
    Ok(())
}

/// Reconcile a webOS 3.x+ layout: one service file plus role, permission and manifest files.
pub fn reconcile_modern(ctx: &ReconcileContext, m: &ModernArtifacts) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    if !m.service.exists() {
        return Ok(summary);
    }

    info!("Found webOS 3.x+ service file: {}", m.service.physical.display());
    patch_service_file(ctx, &m.service, &mut summary)?;
    provision(ctx, &m.client_permissions, PermissionFileKind::Client, &mut summary)?;
    provision(ctx, &m.api_permissions, PermissionFileKind::Api, &mut summary)?;
    patch_roles_file(ctx, &m.role, &mut summary)?;
    link_manifest(ctx, &m.manifest, &m.client_permissions, &m.api_permissions, &mut summary)?;
    Ok(summary)
}

/// Reconcile a webOS <3.x layout with split public/private files.
pub fn reconcile_legacy(ctx: &ReconcileContext, l: &LegacyArtifacts) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    if !l.public_service.exists() {
        return Ok(summary);
    }

    info!(
        "Found legacy webOS <3.x service file: {}",
        l.public_service.physical.display()
    );
    patch_service_file(ctx, &l.public_service, &mut summary)?;

    if l.private_service.exists() {
        patch_service_file(ctx, &l.private_service, &mut summary)?;
    } else {
        warn!(
            "Did not find legacy private service file: {}",
            l.private_service.physical.display()
        );
    }

    patch_roles_file(ctx, &l.public_role, &mut summary)?;
    patch_roles_file(ctx, &l.private_role, &mut summary)?;
    Ok(summary)
}

/// Reconcile every applicable layout in order and fold the results.
///
/// A malformed JSON document aborts the whole pass; a missing launcher only
/// fails the service file it was needed for.
pub fn reconcile_all(ctx: &ReconcileContext) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    for (layout, artifacts) in applicable_layouts(ctx.identity, ctx.sysroot) {
        debug!(
            "Processing {} ({:?}, {:?})",
            layout.root, layout.generation, layout.visibility
        );
        let layout_summary = match &artifacts {
            LayoutArtifacts::Modern(m) => reconcile_modern(ctx, m)?,
            LayoutArtifacts::Legacy(l) => reconcile_legacy(ctx, l)?,
        };
        summary = summary.merge(RunSummary {
            layouts: vec![layout.root],
            ..layout_summary
        });
    }
    Ok(summary)
}
