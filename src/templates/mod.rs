//! Report templates and their credit prices.
//!
//! Templates are totally ordered `basic < ortho < 3d < full`; once advanced
//! processing has run, a project may only move up that order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Credit prices for paid workflow actions
pub mod prices {
    pub const SCENE_ANALYSIS: u64 = 20;
    pub const SCENE_REANALYSIS: u64 = 20;
    pub const TEMPLATE_BASIC: u64 = 0;
    pub const TEMPLATE_ORTHO: u64 = 99;
    pub const TEMPLATE_3D: u64 = 199;
    pub const TEMPLATE_FULL: u64 = 299;
}

/// Template identifier; declaration order is the upgrade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TemplateId {
    #[serde(rename = "basic")]
    Basic,
    #[serde(rename = "ortho")]
    Ortho,
    #[serde(rename = "3d")]
    ThreeD,
    #[serde(rename = "full")]
    Full,
}

impl TemplateId {
    pub fn all() -> &'static [TemplateId] {
        &[
            TemplateId::Basic,
            TemplateId::Ortho,
            TemplateId::ThreeD,
            TemplateId::Full,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::Basic => "basic",
            TemplateId::Ortho => "ortho",
            TemplateId::ThreeD => "3d",
            TemplateId::Full => "full",
        }
    }

    /// Credits charged for this template
    pub fn credits(&self) -> u64 {
        match self {
            TemplateId::Basic => prices::TEMPLATE_BASIC,
            TemplateId::Ortho => prices::TEMPLATE_ORTHO,
            TemplateId::ThreeD => prices::TEMPLATE_3D,
            TemplateId::Full => prices::TEMPLATE_FULL,
        }
    }

    /// Credits owed when moving from `self` to `target`; never negative
    pub fn upgrade_cost(&self, target: TemplateId) -> u64 {
        target.credits().saturating_sub(self.credits())
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(TemplateId::Basic),
            "ortho" => Ok(TemplateId::Ortho),
            "3d" => Ok(TemplateId::ThreeD),
            "full" => Ok(TemplateId::Full),
            other => Err(format!("unknown template '{}'", other)),
        }
    }
}

/// A report template as chosen by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub include_ortho: bool,
    pub include_3d: bool,
}

impl Template {
    /// Built-in catalog entry for a template id
    pub fn builtin(id: TemplateId) -> Self {
        let (name, description, include_ortho, include_3d) = match id {
            TemplateId::Basic => (
                "Basic inspection report",
                "Per-image issue detection, descriptions and remediation advice",
                false,
                false,
            ),
            TemplateId::Ortho => (
                "Orthophoto report",
                "Basic report plus an orthophoto with issues mapped onto it",
                true,
                false,
            ),
            TemplateId::ThreeD => (
                "3D model report",
                "Basic report plus a reconstructed 3D model with issue markers",
                false,
                true,
            ),
            TemplateId::Full => (
                "Full professional report",
                "Orthophoto and 3D model with professional layout",
                true,
                true,
            ),
        };
        Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
            include_ortho,
            include_3d,
        }
    }

    /// Whether this template needs the advanced processing pipeline
    pub fn needs_advanced_processing(&self) -> bool {
        self.include_ortho || self.include_3d
    }
}

/// Outcome of a template switch check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchDecision {
    pub allowed: bool,
    pub reason: String,
}

impl SwitchDecision {
    fn allow(reason: &str) -> Self {
        Self {
            allowed: true,
            reason: reason.to_string(),
        }
    }

    fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: reason.to_string(),
        }
    }
}

/// Decide whether the project may switch from `current` to `target`.
///
/// Free switching until advanced processing has produced results; after
/// that only equal or higher templates are accepted.
pub fn check_switch(
    current: Option<TemplateId>,
    target: TemplateId,
    advanced_processed: bool,
) -> SwitchDecision {
    let current = match current {
        Some(current) => current,
        None => return SwitchDecision::allow(""),
    };
    if !advanced_processed {
        return SwitchDecision::allow("");
    }
    if target >= current {
        SwitchDecision::allow("upgrade")
    } else {
        SwitchDecision::deny(
            "Advanced report already generated; cannot switch to a lower template",
        )
    }
}
