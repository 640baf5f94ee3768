// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Export-service (`ganesha.conf`) renderer.

use serde::Serialize;
use std::path::{Component, Path};

use super::{single_line, ConfigTemplate, RenderError};
use crate::domain::export::Export;

const TEMPLATE_NAME: &str = "ganesha.conf";

const GANESHA_CONF_TEMPLATE: &str = r#"NFS_CORE_PARAM {
        mount_path_pseudo = true;
        Protocols = 3,4,9P;
        NFS_Port_Check = false;
}

EXPORT_DEFAULTS {
        Access_Type = None;
        Squash = all_squash;
        Anonymous_Uid = {{anonymous_uid}};
        Anonymous_Gid = {{anonymous_gid}};
}

MDCACHE {
        Entries_HWMark = 100000;
}

LOG {
        Default_Log_Level = WARN;
        Components {
                FSAL = INFO;
                NFS4 = EVENT;
        }

        Facility {
                name = FILE;
                destination = "/var/log/ganesha.log";
                enable = active;
        }
}
{{#each exports}}

EXPORT
{
        # Export {{name}}
        Export_Id = {{export_id}};
        Path = {{path}};
        Pseudo = {{pseudo}};
        Protocols = 3,4;
        Access_Type = {{access_type}};

        FSAL {
                Name = VFS;
        }
{{#each clients}}

        CLIENT {
                Clients = {{clients}};
                Access_Type = {{access_type}};
        }
{{/each}}
}
{{/each}}
"#;

/// Uid/gid squashed anonymous clients map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnonymousIds {
    pub uid: u32,
    pub gid: u32,
}

impl Default for AnonymousIds {
    fn default() -> Self {
        Self { uid: 0, gid: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientView {
    pub clients: String,
    pub access_type: &'static str,
}

/// One `EXPORT` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportView {
    pub export_id: i64,
    pub name: String,
    /// Absolute path under the mount root.
    pub path: String,
    pub pseudo: String,
    pub access_type: &'static str,
    pub clients: Vec<ClientView>,
}

impl ExportView {
    pub fn from_export(export: &Export, mount_root: &str) -> Result<Self, RenderError> {
        let id = export.id.to_string();
        let pseudo = export.pseudo.trim();
        if pseudo.is_empty() {
            return Err(RenderError::invalid("export", &id, "pseudo path is empty"));
        }
        if !pseudo.starts_with('/') {
            return Err(RenderError::invalid("export", &id, "pseudo path must start with '/'"));
        }
        single_line("export", &id, "name", &export.name)?;
        single_line("export", &id, "pseudo path", pseudo)?;
        single_line("export", &id, "path", &export.path)?;

        let path = resolve_under(mount_root, &export.path)
            .ok_or_else(|| RenderError::invalid("export", &id, format!("invalid path '{}'", export.path)))?;

        let mut clients = Vec::with_capacity(export.acls.len());
        for acl in &export.acls {
            let range = acl.ip_range.trim();
            if range.is_empty() {
                return Err(RenderError::invalid("export", &id, "client range is empty"));
            }
            single_line("export", &id, "client range", range)?;
            clients.push(ClientView {
                clients: range.to_string(),
                access_type: acl.permission.as_str(),
            });
        }

        Ok(Self {
            export_id: export.id.0,
            name: export.name.clone(),
            path,
            pseudo: pseudo.to_string(),
            access_type: export.default_access.as_str(),
            clients,
        })
    }
}

/// Joins `path` under `root`. Empty paths and parent-directory components
/// are rejected.
pub fn resolve_under(root: &str, path: &str) -> Option<String> {
    let relative = path.trim().trim_start_matches('/');
    if relative.is_empty() {
        return None;
    }
    let mut joined = Path::new(root).to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(joined.to_string_lossy().into_owned())
}

#[derive(Serialize)]
struct GaneshaConfView<'a> {
    anonymous_uid: u32,
    anonymous_gid: u32,
    exports: &'a [ExportView],
}

pub struct ExportConfigRenderer {
    template: ConfigTemplate,
    mount_root: String,
}

impl ExportConfigRenderer {
    pub fn new(mount_root: impl Into<String>) -> Result<Self, RenderError> {
        Ok(Self {
            template: ConfigTemplate::compile(TEMPLATE_NAME, GANESHA_CONF_TEMPLATE)?,
            mount_root: mount_root.into(),
        })
    }

    pub fn mount_root(&self) -> &str {
        &self.mount_root
    }

    /// Render the whole file for `exports`, in the given order.
    pub fn render(&self, exports: &[Export], ids: AnonymousIds) -> Result<String, RenderError> {
        let views = exports
            .iter()
            .map(|e| ExportView::from_export(e, &self.mount_root))
            .collect::<Result<Vec<_>, _>>()?;
        self.template.render(&GaneshaConfView {
            anonymous_uid: ids.uid,
            anonymous_gid: ids.gid,
            exports: &views,
        })
    }
}
