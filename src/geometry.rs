use crate::transport::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Germanium detectors housed in one reentrance tube.
pub const DEFAULT_DETECTORS_PER_TUBE: i32 = 96;
/// Reentrance tubes in the baseline cryostat.
pub const DEFAULT_TUBE_COUNT: usize = 4;

/// Known cryostat/cavern layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GeometryVariant {
    #[default]
    #[serde(rename = "baseline")]
    Baseline,
    #[serde(rename = "baseline_smaller")]
    BaselineSmaller,
    #[serde(rename = "baseline_large_reentrance_tube")]
    BaselineLargeReentranceTube,
    #[serde(rename = "baseline_large_reentrance_tube_4m_cryo")]
    BaselineLargeReentranceTube4mCryo,
    #[serde(rename = "alternative")]
    Alternative,
    #[serde(rename = "hallA")]
    HallA,
    #[serde(rename = "hallA_wo_ge")]
    HallAWithoutGe,
    #[serde(rename = "hallA_only_WLSR")]
    HallAOnlyWlsr,
}

impl GeometryVariant {
    pub const ALL: [GeometryVariant; 8] = [
        GeometryVariant::Baseline,
        GeometryVariant::BaselineSmaller,
        GeometryVariant::BaselineLargeReentranceTube,
        GeometryVariant::BaselineLargeReentranceTube4mCryo,
        GeometryVariant::Alternative,
        GeometryVariant::HallA,
        GeometryVariant::HallAWithoutGe,
        GeometryVariant::HallAOnlyWlsr,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GeometryVariant::Baseline => "baseline",
            GeometryVariant::BaselineSmaller => "baseline_smaller",
            GeometryVariant::BaselineLargeReentranceTube => "baseline_large_reentrance_tube",
            GeometryVariant::BaselineLargeReentranceTube4mCryo => {
                "baseline_large_reentrance_tube_4m_cryo"
            }
            GeometryVariant::Alternative => "alternative",
            GeometryVariant::HallA => "hallA",
            GeometryVariant::HallAWithoutGe => "hallA_wo_ge",
            GeometryVariant::HallAOnlyWlsr => "hallA_only_WLSR",
        }
    }

    /// Resolves a geometry name; unknown names are fatal configuration errors.
    pub fn from_name(name: &str) -> Result<Self, GeometryError> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.as_str() == name)
            .ok_or_else(|| GeometryError::UnknownGeometry(name.to_string()))
    }

    /// Layouts with a single string housing: every deposit maps to tube 0.
    pub fn single_tube(self) -> bool {
        matches!(
            self,
            GeometryVariant::HallA
                | GeometryVariant::HallAWithoutGe
                | GeometryVariant::HallAOnlyWlsr
                | GeometryVariant::BaselineLargeReentranceTube
                | GeometryVariant::BaselineLargeReentranceTube4mCryo
        )
    }

    /// Layouts whose detector number is the bare copy number.
    fn plain_copy_numbers(self) -> bool {
        matches!(
            self,
            GeometryVariant::BaselineLargeReentranceTube
                | GeometryVariant::BaselineLargeReentranceTube4mCryo
        )
    }
}

impl fmt::Display for GeometryVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeometryVariant {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Geometry lookup failures. Both indicate miswired collaborators and abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("unknown geometry '{0}'")]
    UnknownGeometry(String),
    #[error("volume '{0}' is not in the lookup table")]
    UnknownVolume(String),
}

/// Classifier output for one deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub tube: u32,
    pub detector: i32,
}

/// Pure position/copy-number classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryClassifier {
    variant: GeometryVariant,
    detectors_per_tube: i32,
}

impl GeometryClassifier {
    pub fn new(variant: GeometryVariant, detectors_per_tube: i32) -> Self {
        Self {
            variant,
            detectors_per_tube: detectors_per_tube.max(1),
        }
    }

    pub fn variant(&self) -> GeometryVariant {
        self.variant
    }

    pub fn detectors_per_tube(&self) -> i32 {
        self.detectors_per_tube
    }

    /// Quadrant rule: the axis with the larger magnitude picks the pair of
    /// tubes, its sign picks the tube (+x 0, +y 1, -x 2, -y 3).
    ///
    /// `|x| == |y|` falls back to tube 0.
    pub fn reentrance_tube(&self, x: f64, y: f64) -> u32 {
        if self.variant.single_tube() {
            return 0;
        }
        let (ax, ay) = (x.abs(), y.abs());
        if ax > ay {
            if x > 0.0 {
                0
            } else {
                2
            }
        } else if ay > ax {
            if y > 0.0 {
                1
            } else {
                3
            }
        } else {
            0
        }
    }

    /// Classifies a germanium deposit at `position` inside the detector with
    /// local copy number `copy_number`.
    pub fn classify(&self, position: Vec3, copy_number: i32) -> Placement {
        let tube = self.reentrance_tube(position.x, position.y);
        let detector = if self.variant.plain_copy_numbers() {
            copy_number
        } else {
            copy_number + tube as i32 * self.detectors_per_tube
        };
        Placement { tube, detector }
    }

    /// Tube encoded in a detector-element ID.
    pub fn element_tube(&self, element_id: i32) -> usize {
        (element_id.max(0) / self.detectors_per_tube) as usize
    }
}

/// Coarse material regions used to route step deposits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Germanium,
    LiquidArgon,
    UndergroundArgon,
    Water,
    Other,
}

impl Region {
    /// Classifies a physical or logical volume name (`Ge_phys`, `ULar_log`, ...).
    pub fn from_volume(name: &str) -> Self {
        let stem = name.split('_').next().unwrap_or(name);
        match stem {
            "Ge" => Region::Germanium,
            "Lar" => Region::LiquidArgon,
            "ULar" => Region::UndergroundArgon,
            "Water" => Region::Water,
            _ => Region::Other,
        }
    }

    pub fn is_argon(self) -> bool {
        matches!(self, Region::LiquidArgon | Region::UndergroundArgon)
    }

    /// Integer code written to the per-deposit region columns.
    pub fn code(self) -> i32 {
        match self {
            Region::Other => 0,
            Region::Germanium => 1,
            Region::LiquidArgon => 2,
            Region::UndergroundArgon => 3,
            Region::Water => 4,
        }
    }
}

const VOLUME_TABLE: [(&str, i32); 15] = [
    ("Cavern_log", 0),
    ("Hall_log", 1),
    ("Tank_log", 2),
    ("Water_log", 3),
    ("Cout_log", 4),
    ("Cvac_log", 5),
    ("Cinn_log", 6),
    ("Lar_log", 7),
    ("Lid_log", 8),
    ("Bot_log", 9),
    ("Copper_log", 10),
    ("ULar_log", 11),
    ("Ge_log", 12),
    ("Pu_log", 13),
    ("Membrane_log", 14),
];

/// Translates a logical-volume name into the integer stored in trajectory columns.
pub fn volume_id(name: &str) -> Result<i32, GeometryError> {
    VOLUME_TABLE
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, id)| *id)
        .ok_or_else(|| GeometryError::UnknownVolume(name.to_string()))
}
