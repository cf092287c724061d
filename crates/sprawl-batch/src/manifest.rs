use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sprawl_engine::ControlRecord;
use std::fs;
use std::path::Path;

/// Summary written next to the campaign's log files so downstream
/// tooling can pick up the sweep outcome without parsing the text logs.
#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignManifest {
    pub created_at: DateTime<Utc>,
    pub mode: String,
    pub total_runs: usize,
    pub runs_completed: usize,
    pub monte_carlo_iterations: usize,
    pub random_seed: i64,
    pub best: Option<ControlRecord>,
}

pub fn write_campaign_manifest(path: &Path, manifest: &CampaignManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(manifest).context("serializing campaign manifest to JSON")?;
    fs::write(path, json)
        .with_context(|| format!("writing campaign manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_campaign_manifest(path: &Path) -> Result<CampaignManifest> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening campaign manifest '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing campaign manifest '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn manifest_writes_and_reads_back() {
        let manifest = CampaignManifest {
            created_at: Utc::now(),
            mode: "calibrate".into(),
            total_runs: 32,
            runs_completed: 32,
            monte_carlo_iterations: 4,
            random_seed: 42,
            best: None,
        };
        let tmp = NamedTempFile::new().unwrap();
        write_campaign_manifest(tmp.path(), &manifest).unwrap();
        let parsed = load_campaign_manifest(tmp.path()).unwrap();
        assert_eq!(parsed.mode, "calibrate");
        assert_eq!(parsed.total_runs, 32);
        assert!(parsed.best.is_none());
    }
}
