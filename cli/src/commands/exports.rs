// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Export configuration dry run
//!
//! Renders candidate exports and runs the export daemon's validator on the
//! controller host without touching the live configuration.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

use nas_core::domain::controller_config::ControllerConfigManifest;
use nas_core::domain::export::{ConfigTestResult, Export};

use crate::controller::Controller;

pub async fn test_exports(config: ControllerConfigManifest, file: PathBuf, json: bool) -> Result<()> {
    let candidates = load_candidates(&file)?;
    let controller = Controller::open(config).await?;

    let result = controller.exports.test_config(&candidates).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if !result.valid {
        anyhow::bail!("Export configuration is invalid");
    }
    Ok(())
}

/// Candidate exports from a YAML list.
pub fn load_candidates(file: &Path) -> Result<Vec<Export>> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {:?}", file))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse exports in {:?}", file))
}

fn print_result(result: &ConfigTestResult) {
    if result.valid {
        println!("{}", format!("✓ {}", result.message).green());
    } else {
        println!("{}", format!("✗ {}", result.message).red());
        for error in &result.errors {
            println!("    {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nas_core::domain::export::{AccessType, ExportStatus};

    #[test]
    fn test_load_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("exports.yaml");
        std::fs::write(
            &file,
            r#"
- id: 1
  host_id: ""
  name: media
  path: media
  pseudo: /media
  status: enabled
  acls:
    - ip_range: 10.0.0.0/24
      permission: RW
"#,
        )
        .unwrap();

        let exports = load_candidates(&file).unwrap();
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].status, ExportStatus::Enabled);
        assert_eq!(exports[0].default_access, AccessType::NoAccess);
        assert_eq!(exports[0].acls[0].permission, AccessType::ReadWrite);
    }
}
