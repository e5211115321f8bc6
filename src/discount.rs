//! Discounts and skippable stages earned by supplementary materials.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::processing::ProcessingStage;
use crate::uploads::{SupplementaryFile, TransferState};

/// Ceiling on the combined supplementary discount, in percent
pub const MAX_DISCOUNT_PERCENT: u32 = 70;

/// Kind of externally produced data a user can supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialType {
    /// Camera position (POS) data
    Pos,
    /// Structure-from-motion output
    Sfm,
    /// Pre-made orthophoto
    Ortho,
    /// Pre-made 3D model
    Model3d,
}

impl MaterialType {
    pub fn all() -> &'static [MaterialType] {
        &[
            MaterialType::Pos,
            MaterialType::Sfm,
            MaterialType::Ortho,
            MaterialType::Model3d,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialType::Pos => "pos",
            MaterialType::Sfm => "sfm",
            MaterialType::Ortho => "ortho",
            MaterialType::Model3d => "model3d",
        }
    }

    /// Catalog entry for this material
    pub fn discount_config(&self) -> DiscountConfig {
        use ProcessingStage::*;
        match self {
            MaterialType::Pos => DiscountConfig {
                discount_percent: 10,
                skip_stages: &[],
                time_saved: "10-15 minutes",
            },
            MaterialType::Sfm => DiscountConfig {
                discount_percent: 30,
                skip_stages: &[AerialTriangulation, DenseMatching],
                time_saved: "30-60 minutes",
            },
            MaterialType::Ortho => DiscountConfig {
                discount_percent: 50,
                skip_stages: &[OrthoGeneration],
                time_saved: "skips orthophoto generation",
            },
            MaterialType::Model3d => DiscountConfig {
                discount_percent: 50,
                skip_stages: &[Model3dReconstruction, TextureMapping],
                time_saved: "skips model reconstruction",
            },
        }
    }
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pos" => Ok(MaterialType::Pos),
            "sfm" => Ok(MaterialType::Sfm),
            "ortho" => Ok(MaterialType::Ortho),
            "model3d" => Ok(MaterialType::Model3d),
            other => Err(format!("unknown material type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountConfig {
    pub discount_percent: u32,
    pub skip_stages: &'static [ProcessingStage],
    pub time_saved: &'static str,
}

fn completed(files: &[SupplementaryFile]) -> impl Iterator<Item = &SupplementaryFile> {
    files
        .iter()
        .filter(|f| f.transfer_state == TransferState::Completed)
}

/// Union of stages covered by completed supplementary files
pub fn skipped_stages(files: &[SupplementaryFile]) -> BTreeSet<ProcessingStage> {
    completed(files)
        .flat_map(|f| f.material_type.discount_config().skip_stages.iter().copied())
        .collect()
}

/// Combined discount of completed files, capped at [`MAX_DISCOUNT_PERCENT`]
pub fn total_discount(files: &[SupplementaryFile]) -> u32 {
    let raw: u32 = completed(files)
        .map(|f| f.material_type.discount_config().discount_percent)
        .sum();
    raw.min(MAX_DISCOUNT_PERCENT)
}

/// Apply a discount percentage to a credit price, rounding down
pub fn discounted_price(price: u64, discount_percent: u32) -> u64 {
    let percent = u64::from(discount_percent.min(100));
    price - price * percent / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(material_type: MaterialType, state: TransferState) -> SupplementaryFile {
        let mut f = SupplementaryFile::new(format!("{}.dat", material_type), 1024, material_type);
        f.transfer_state = state;
        f
    }

    #[test]
    fn test_pos_sfm_ortho_scenario() {
        let files = vec![
            file(MaterialType::Pos, TransferState::Completed),
            file(MaterialType::Sfm, TransferState::Completed),
            file(MaterialType::Ortho, TransferState::Completed),
        ];

        let expected: BTreeSet<_> = [
            ProcessingStage::AerialTriangulation,
            ProcessingStage::DenseMatching,
            ProcessingStage::OrthoGeneration,
        ]
        .into_iter()
        .collect();
        assert_eq!(skipped_stages(&files), expected);
        assert_eq!(total_discount(&files), 70);
    }

    #[test]
    fn test_discount_capped() {
        let files = vec![
            file(MaterialType::Sfm, TransferState::Completed),
            file(MaterialType::Ortho, TransferState::Completed),
            file(MaterialType::Model3d, TransferState::Completed),
        ];
        assert_eq!(total_discount(&files), 70);
    }

    #[test]
    fn test_only_completed_files_count() {
        let files = vec![
            file(MaterialType::Sfm, TransferState::Uploading),
            file(MaterialType::Ortho, TransferState::Error),
            file(MaterialType::Pos, TransferState::Completed),
            file(MaterialType::Model3d, TransferState::Pending),
        ];
        assert_eq!(total_discount(&files), 10);
        assert!(skipped_stages(&files).is_empty());
    }

    #[test]
    fn test_order_independent() {
        let mut files = vec![
            file(MaterialType::Model3d, TransferState::Completed),
            file(MaterialType::Pos, TransferState::Completed),
            file(MaterialType::Sfm, TransferState::Completed),
        ];
        let discount = total_discount(&files);
        let stages = skipped_stages(&files);

        files.reverse();
        assert_eq!(total_discount(&files), discount);
        assert_eq!(skipped_stages(&files), stages);

        files.rotate_left(1);
        assert_eq!(total_discount(&files), discount);
        assert_eq!(skipped_stages(&files), stages);
    }

    #[test]
    fn test_discounted_price() {
        assert_eq!(discounted_price(299, 70), 90);
        assert_eq!(discounted_price(199, 0), 199);
        assert_eq!(discounted_price(99, 100), 0);
    }

    #[test]
    fn test_material_type_parse() {
        assert_eq!("SfM".parse::<MaterialType>().unwrap(), MaterialType::Sfm);
        assert!("lidar".parse::<MaterialType>().is_err());
        assert_eq!(
            serde_json::to_string(&MaterialType::Model3d).unwrap(),
            "\"model3d\""
        );
    }
}
