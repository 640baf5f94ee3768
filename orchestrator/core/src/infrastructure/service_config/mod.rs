// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Service Config Rendering
//!
//! Pure renderers that turn share and export records into the full text of
//! the share-service (`smb.conf`) and export-service (`ganesha.conf`) files.
//! Records are first converted into typed view models and validated; only
//! then is the Handlebars template executed, so a malformed record never
//! yields a partially valid file.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Config file generation and content checksums

pub mod ganesha;
pub mod samba;

pub use ganesha::{AnonymousIds, ExportConfigRenderer};
pub use samba::ShareConfigRenderer;

use handlebars::Handlebars;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("error compiling {template} template: {message}")]
    Compile { template: &'static str, message: String },

    #[error("error executing {template} template: {message}")]
    Execute { template: &'static str, message: String },

    #[error("invalid {kind} '{id}': {reason}")]
    Invalid {
        kind: &'static str,
        id: String,
        reason: String,
    },
}

impl RenderError {
    pub(crate) fn invalid(kind: &'static str, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Hex SHA-256 of config content.
pub fn checksum(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Handlebars engine holding exactly one compiled template.
///
/// Config files are not HTML, so escaping is disabled. Strict mode turns a
/// missing view-model field into an execution error.
pub(crate) struct ConfigTemplate {
    name: &'static str,
    handlebars: Handlebars<'static>,
}

impl ConfigTemplate {
    pub(crate) fn compile(name: &'static str, source: &str) -> Result<Self, RenderError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string(name, source)
            .map_err(|e| RenderError::Compile {
                template: name,
                message: e.to_string(),
            })?;
        Ok(Self { name, handlebars })
    }

    pub(crate) fn render<T: Serialize>(&self, data: &T) -> Result<String, RenderError> {
        self.handlebars
            .render(self.name, data)
            .map_err(|e| RenderError::Execute {
                template: self.name,
                message: e.to_string(),
            })
    }
}

/// Rejects values that would break out of a single config line.
pub(crate) fn single_line(
    kind: &'static str,
    id: &str,
    field: &str,
    value: &str,
) -> Result<(), RenderError> {
    if value.contains(['\n', '\r']) {
        return Err(RenderError::invalid(kind, id, format!("{} contains a line break", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_stable() {
        let a = checksum(b"[global]\n");
        let b = checksum(b"[global]\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, checksum(b"[global]"));
    }

    #[test]
    fn test_compile_error_reported() {
        let err = ConfigTemplate::compile("broken", "{{#each items}}").err().unwrap();
        assert!(matches!(err, RenderError::Compile { template: "broken", .. }));
    }

    #[test]
    fn test_missing_field_is_execution_error() {
        let tpl = ConfigTemplate::compile("strict", "value = {{missing}}").unwrap();
        let err = tpl.render(&serde_json::json!({})).unwrap_err();
        assert!(matches!(err, RenderError::Execute { .. }));
    }

    #[test]
    fn test_no_html_escaping() {
        let tpl = ConfigTemplate::compile("plain", "{{v}}").unwrap();
        let out = tpl.render(&serde_json::json!({"v": "a&b <c>"})).unwrap();
        assert_eq!(out, "a&b <c>");
    }
}
