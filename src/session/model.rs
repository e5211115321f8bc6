//! Project-scoped data carried by a workflow session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Scene analysis output; shape is owned by the analysis service
pub type AnalysisResult = Value;

/// Advanced (ortho/3D) report payload
pub type AdvancedData = Value;

/// An uploaded inspection image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Detection output for one image. Fields the session does not interpret are
/// kept in `extra` and survive a round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub issues: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DetectionResult {
    /// True if this result belongs to `key` by result id or image id
    pub fn matches(&self, key: &str) -> bool {
        self.id.as_deref() == Some(key) || self.image_id.as_deref() == Some(key)
    }

    /// Shallow merge: every top-level key of `patch` replaces the same key
    /// here. Returns the merged result, or `None` if the merge produced an
    /// invalid record (e.g. a non-numeric confidence).
    pub fn merged(&self, patch: &Map<String, Value>) -> Option<DetectionResult> {
        let mut current = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => return None,
        };
        for (key, value) in patch {
            current.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(current)).ok()
    }
}

/// Report metadata used on export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub location: String,
    pub inspection_date: String,
    pub inspector: String,
    pub company: String,
    pub logo: Option<String>,
}

/// Partial update for [`ProjectInfo`]; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfoPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub inspection_date: Option<String>,
    pub inspector: Option<String>,
    pub company: Option<String>,
    pub logo: Option<String>,
}

impl ProjectInfo {
    pub fn apply(&mut self, patch: ProjectInfoPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(date) = patch.inspection_date {
            self.inspection_date = date;
        }
        if let Some(inspector) = patch.inspector {
            self.inspector = inspector;
        }
        if let Some(company) = patch.company {
            self.company = company;
        }
        if patch.logo.is_some() {
            self.logo = patch.logo;
        }
    }
}

/// Which remote data sets have already been fetched for this project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLoadedFlags {
    pub analysis: bool,
    pub detection: bool,
    pub advanced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKey {
    Analysis,
    Detection,
    Advanced,
}

impl DataLoadedFlags {
    pub fn get(&self, key: DataKey) -> bool {
        match key {
            DataKey::Analysis => self.analysis,
            DataKey::Detection => self.detection,
            DataKey::Advanced => self.advanced,
        }
    }

    pub fn set(&mut self, key: DataKey, loaded: bool) {
        match key {
            DataKey::Analysis => self.analysis = loaded,
            DataKey::Detection => self.detection = loaded,
            DataKey::Advanced => self.advanced = loaded,
        }
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataKey::Analysis => "analysis",
            DataKey::Detection => "detection",
            DataKey::Advanced => "advanced",
        };
        f.write_str(s)
    }
}

impl FromStr for DataKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "analysis" => Ok(DataKey::Analysis),
            "detection" => Ok(DataKey::Detection),
            "advanced" => Ok(DataKey::Advanced),
            other => Err(format!("unknown data key '{}'", other)),
        }
    }
}

/// Aggregates over the detection results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_images: usize,
    pub images_with_issues: usize,
    pub issue_count: usize,
    /// Mean confidence rounded to two decimals; 0 with no results
    pub avg_confidence: f64,
}

impl Statistics {
    pub fn from_results(results: &[DetectionResult]) -> Self {
        let total = results.len();
        let avg_confidence = if total == 0 {
            0.0
        } else {
            let sum: f64 = results.iter().map(|r| r.confidence).sum();
            ((sum / total as f64) * 100.0).round() / 100.0
        };
        Self {
            total_images: total,
            images_with_issues: results.iter().filter(|r| !r.issues.is_empty()).count(),
            issue_count: results.iter().map(|r| r.issues.len()).sum(),
            avg_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(id: &str, confidence: f64, issues: usize) -> DetectionResult {
        DetectionResult {
            id: Some(id.to_string()),
            confidence,
            issues: (0..issues).map(|i| json!({ "kind": format!("crack-{}", i) })).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_statistics() {
        let stats = Statistics::from_results(&[
            result("a", 0.9, 2),
            result("b", 0.8, 0),
            result("c", 0.755, 1),
        ]);
        assert_eq!(stats.total_images, 3);
        assert_eq!(stats.images_with_issues, 2);
        assert_eq!(stats.issue_count, 3);
        assert_eq!(stats.avg_confidence, 0.82);
    }

    #[test]
    fn test_statistics_empty() {
        let stats = Statistics::from_results(&[]);
        assert_eq!(stats.total_images, 0);
        assert_eq!(stats.avg_confidence, 0.0);
    }

    #[test]
    fn test_detection_merge_keeps_unknown_fields() {
        let base: DetectionResult = serde_json::from_value(json!({
            "id": "r1",
            "image_id": "img-1",
            "confidence": 0.5,
            "issues": [],
            "reviewed": false
        }))
        .unwrap();

        let patch = json!({ "reviewed": true, "confidence": 0.7 });
        let merged = base.merged(patch.as_object().unwrap()).unwrap();
        assert_eq!(merged.confidence, 0.7);
        assert_eq!(merged.extra.get("reviewed"), Some(&json!(true)));
        assert_eq!(merged.image_id.as_deref(), Some("img-1"));
        assert!(merged.matches("img-1"));
        assert!(merged.matches("r1"));
    }

    #[test]
    fn test_detection_merge_rejects_invalid_patch() {
        let base = result("r1", 0.5, 0);
        let patch = json!({ "confidence": "high" });
        assert!(base.merged(patch.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_project_info_patch() {
        let mut info = ProjectInfo {
            name: "Bridge A".into(),
            inspector: "Lee".into(),
            ..Default::default()
        };
        info.apply(ProjectInfoPatch {
            location: Some("North span".into()),
            ..Default::default()
        });
        assert_eq!(info.name, "Bridge A");
        assert_eq!(info.inspector, "Lee");
        assert_eq!(info.location, "North span");
    }

    #[test]
    fn test_data_flags() {
        let mut flags = DataLoadedFlags::default();
        flags.set(DataKey::Detection, true);
        assert!(flags.get(DataKey::Detection));
        assert!(!flags.get(DataKey::Analysis));
        assert_eq!("advanced".parse::<DataKey>().unwrap(), DataKey::Advanced);
    }
}
