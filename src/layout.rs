// layout.rs - Service identity and platform directory layouts

use crate::document::is_file;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVICE_ID: &str = "org.webosbrew.hbchannel.service";
const LEGACY_ALIAS: &str = "org.webosbrew.hbchannel";

/// Service and app identifiers the artifact file names are derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub service: String,
    pub app: String,
}

impl Identity {
    /// Resolve identifiers from the optional positional arguments.
    ///
    /// The app id defaults to the service id minus its last dot-segment. The
    /// legacy alias always maps onto the fixed service/app pair.
    pub fn resolve(service: Option<&str>, app: Option<&str>) -> Identity {
        let service = service.unwrap_or(DEFAULT_SERVICE_ID);
        if service == LEGACY_ALIAS {
            return Identity {
                service: DEFAULT_SERVICE_ID.to_string(),
                app: LEGACY_ALIAS.to_string(),
            };
        }
        let app = match app {
            Some(a) => a.to_string(),
            None => service
                .rsplit_once('.')
                .map(|(prefix, _)| prefix.to_string())
                .unwrap_or_default(),
        };
        Identity {
            service: service.to_string(),
            app,
        }
    }
}

/// Maps platform-absolute paths onto the tree actually being edited.
#[derive(Debug, Clone)]
pub struct Sysroot(PathBuf);

impl Sysroot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Sysroot(root.into())
    }

    pub fn physical(&self, logical: &Path) -> PathBuf {
        let relative = logical.strip_prefix("/").unwrap_or(logical);
        self.0.join(relative)
    }
}

/// One file a layout may contain.
///
/// `logical` is the path as the platform sees it (what manifests reference);
/// `physical` is where it lives under the sysroot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub logical: PathBuf,
    pub physical: PathBuf,
}

impl Artifact {
    fn new(sysroot: &Sysroot, logical: PathBuf) -> Self {
        let physical = sysroot.physical(&logical);
        Artifact { logical, physical }
    }

    pub fn exists(&self) -> bool {
        is_file(&self.physical)
    }

    pub fn logical_str(&self) -> String {
        self.logical.to_string_lossy().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// webOS 3.x+ (`/var/luna-service2*`)
    Modern,
    /// webOS <3.x (`/var/palm/ls2*`), split public/private files
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryLayout {
    pub root: &'static str,
    pub generation: Generation,
    pub visibility: Visibility,
}

/// Every layout worth probing, in processing order.
pub const CANDIDATE_LAYOUTS: [DirectoryLayout; 4] = [
    DirectoryLayout {
        root: "/var/luna-service2-dev",
        generation: Generation::Modern,
        visibility: Visibility::Dev,
    },
    DirectoryLayout {
        root: "/var/luna-service2",
        generation: Generation::Modern,
        visibility: Visibility::Prod,
    },
    DirectoryLayout {
        root: "/var/palm/ls2-dev",
        generation: Generation::Legacy,
        visibility: Visibility::Dev,
    },
    DirectoryLayout {
        root: "/var/palm/ls2",
        generation: Generation::Legacy,
        visibility: Visibility::Prod,
    },
];

#[derive(Debug, Clone)]
pub struct ModernArtifacts {
    pub service: Artifact,
    pub client_permissions: Artifact,
    pub api_permissions: Artifact,
    pub role: Artifact,
    pub manifest: Artifact,
}

#[derive(Debug, Clone)]
pub struct LegacyArtifacts {
    pub public_service: Artifact,
    pub private_service: Artifact,
    pub public_role: Artifact,
    pub private_role: Artifact,
}

#[derive(Debug, Clone)]
pub enum LayoutArtifacts {
    Modern(ModernArtifacts),
    Legacy(LegacyArtifacts),
}

impl LayoutArtifacts {
    /// The service file whose presence makes the layout applicable.
    pub fn primary(&self) -> &Artifact {
        match self {
            LayoutArtifacts::Modern(m) => &m.service,
            LayoutArtifacts::Legacy(l) => &l.public_service,
        }
    }
}

impl DirectoryLayout {
    pub fn artifacts(&self, id: &Identity, sysroot: &Sysroot) -> LayoutArtifacts {
        let root = Path::new(self.root);
        let at = |rel: String| Artifact::new(sysroot, root.join(rel));
        let svc = &id.service;

        match self.generation {
            Generation::Modern => LayoutArtifacts::Modern(ModernArtifacts {
                service: at(format!("services.d/{}.service", svc)),
                client_permissions: at(format!("client-permissions.d/{}.root.json", svc)),
                api_permissions: at(format!("api-permissions.d/{}.api.public.json", svc)),
                role: at(format!("roles.d/{}.service.json", svc)),
                manifest: at(format!("manifests.d/{}.json", id.app)),
            }),
            Generation::Legacy => LayoutArtifacts::Legacy(LegacyArtifacts {
                public_service: at(format!("services/pub/{}.service", svc)),
                private_service: at(format!("services/prv/{}.service", svc)),
                public_role: at(format!("roles/pub/{}.json", svc)),
                private_role: at(format!("roles/prv/{}.json", svc)),
            }),
        }
    }
}

/// Resolve every candidate layout and keep those whose primary service file exists.
pub fn applicable_layouts(
    id: &Identity,
    sysroot: &Sysroot,
) -> Vec<(DirectoryLayout, LayoutArtifacts)> {
    CANDIDATE_LAYOUTS
        .iter()
        .map(|layout| (*layout, layout.artifacts(id, sysroot)))
        .filter(|(_, artifacts)| artifacts.primary().exists())
        .collect()
}
