//! Assembled output of a finished analysis run.

use crate::gateway::UploadReceipt;
use crate::select::SelectedFile;
use anyhow::Result;
use chrono::{DateTime, Utc};
use queue::AnalysisKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Everything the presentation layer needs from one completed run. Rendering
/// (tables, PDF, text) happens elsewhere; this is data only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub upload_id: String,
    pub file_name: String,
    pub file_size_bytes: u64,
    pub analysis_kind: AnalysisKind,
    pub focus_areas: Vec<String>,
    pub player_tracking: Option<Value>,
    pub crowd_analysis: Option<Value>,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub(crate) fn assemble(
        receipt: &UploadReceipt,
        file: &SelectedFile,
        analysis_kind: AnalysisKind,
        focus_areas: Vec<String>,
        player_tracking: Option<Value>,
        crowd_analysis: Option<Value>,
    ) -> Self {
        Self {
            upload_id: receipt.id.clone(),
            file_name: file.name.clone(),
            file_size_bytes: file.size_bytes,
            analysis_kind,
            focus_areas,
            player_tracking,
            crowd_analysis,
            generated_at: Utc::now(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn serializes_service_payloads() {
        let receipt = UploadReceipt {
            id: "u-1".to_string(),
            original_filename: "final.mp4".to_string(),
            created_at: Utc::now(),
        };
        let file = SelectedFile {
            path: PathBuf::from("/tmp/final.mp4"),
            name: "final.mp4".to_string(),
            mime: "video/mp4".to_string(),
            size_bytes: 42,
        };
        let report = AnalysisReport::assemble(
            &receipt,
            &file,
            AnalysisKind::CrowdAnalysis,
            vec!["crowd".to_string()],
            None,
            Some(serde_json::json!({ "peak_density": 0.9 })),
        );

        let json = report.to_json_pretty().unwrap();
        assert!(json.contains("\"upload_id\": \"u-1\""));
        assert!(json.contains("peak_density"));

        let back: AnalysisReport = serde_json::from_str(&json).unwrap();
        assert!(back.player_tracking.is_none());
        assert_eq!(back.file_size_bytes, 42);
    }
}
