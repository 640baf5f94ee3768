// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Share-service (`smb.conf`) renderer.
//!
//! Permission mapping: a share whose permission list is exactly one
//! `everyone` entry is rendered as a guest share, read only unless that entry
//! is `rw`. Any other list is rendered as a private share with explicit
//! `valid users` and `write list` (sorted, de-duplicated, space-joined).

use serde::Serialize;
use std::collections::BTreeSet;

use super::{single_line, ConfigTemplate, RenderError};
use crate::domain::share::Share;

const TEMPLATE_NAME: &str = "smb.conf";

const SMB_CONF_TEMPLATE: &str = r#"[global]
    workgroup = SAMBA
    security = user

    passdb backend = tdbsam

    kernel share modes = no
    posix locking = no
    kernel oplocks = yes
{{#each shares}}

[{{share_id}}]
    path = {{path}}
    writeable = yes
    read only = {{#if read_only}}yes{{else}}no{{/if}}
{{#if public}}
    guest ok = yes
    browseable = yes
    public = yes
{{else}}
    guest ok = no
    valid users = {{valid_users}}
    write list = {{write_users}}
{{/if}}
    create mask = 0644
    directory mask = 0755
{{/each}}
"#;

/// One `[share]` stanza.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareView {
    pub share_id: String,
    pub path: String,
    pub read_only: bool,
    pub public: bool,
    pub valid_users: String,
    pub write_users: String,
}

impl ShareView {
    pub fn from_share(share: &Share) -> Result<Self, RenderError> {
        let id = share.id.to_string();
        let pseudo = share.pseudo.trim();
        if pseudo.trim_matches('/').is_empty() {
            return Err(RenderError::invalid("share", &id, "pseudo path is empty"));
        }
        if share.path.trim().is_empty() {
            return Err(RenderError::invalid("share", &id, "path is empty"));
        }
        if share.permissions.is_empty() {
            return Err(RenderError::invalid("share", &id, "no user permissions"));
        }
        single_line("share", &id, "pseudo path", pseudo)?;
        single_line("share", &id, "path", &share.path)?;

        let mut valid = BTreeSet::new();
        let mut write = BTreeSet::new();
        for entry in &share.permissions {
            let username = entry.username.trim();
            if username.is_empty() || username.contains(char::is_whitespace) {
                return Err(RenderError::invalid(
                    "share",
                    &id,
                    format!("invalid username '{}'", entry.username),
                ));
            }
            valid.insert(username);
            if entry.permission.is_writable() {
                write.insert(username);
            }
        }

        let public = share.is_public();
        let read_only = public && !share.permissions[0].permission.is_writable();

        let share_id = if pseudo.starts_with('/') {
            pseudo.to_string()
        } else {
            format!("/{}", pseudo)
        };

        Ok(Self {
            share_id,
            path: share.path.trim().to_string(),
            read_only,
            public,
            valid_users: valid.into_iter().collect::<Vec<_>>().join(" "),
            write_users: write.into_iter().collect::<Vec<_>>().join(" "),
        })
    }
}

#[derive(Serialize)]
struct SmbConfView<'a> {
    shares: &'a [ShareView],
}

pub struct ShareConfigRenderer {
    template: ConfigTemplate,
}

impl ShareConfigRenderer {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self {
            template: ConfigTemplate::compile(TEMPLATE_NAME, SMB_CONF_TEMPLATE)?,
        })
    }

    /// Render the whole file for `shares`, in the given order.
    pub fn render(&self, shares: &[Share]) -> Result<String, RenderError> {
        let views = shares
            .iter()
            .map(ShareView::from_share)
            .collect::<Result<Vec<_>, _>>()?;
        self.template.render(&SmbConfView { shares: &views })
    }
}
