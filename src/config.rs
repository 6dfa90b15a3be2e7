use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::annotation::{default_objects, ObjectDescriptor, PixelSize};
use crate::centerline::{FitParams, FrameMethod};

fn default_midline_id() -> String {
    "Midline".to_string()
}

fn default_landmark_ids() -> Vec<String> {
    vec![
        "tether_Atrium".to_string(),
        "tether_Ventricle".to_string(),
        "AVCanal".to_string(),
    ]
}

fn default_reference_id() -> Option<String> {
    Some("AVCanal".to_string())
}

/// Settings shared by the annotation session and the midline analysis.
///
/// Every field is optional in the TOML file:
///
/// ```toml
/// frame_method = "parallel-transport"
///
/// [pixel_size]
/// x = 0.41
/// y = 0.41
/// z = 2.0
///
/// [fit]
/// smoothing = 100.0
/// degree = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub pixel_size: PixelSize,
    #[serde(default)]
    pub fit: FitParams,
    #[serde(default)]
    pub frame_method: FrameMethod,
    #[serde(default = "default_midline_id")]
    pub midline_id: String,
    #[serde(default = "default_landmark_ids")]
    pub landmark_ids: Vec<String>,
    #[serde(default = "default_reference_id")]
    pub reference_id: Option<String>,
    #[serde(default = "default_objects")]
    pub objects: Vec<ObjectDescriptor>,
    /// Midline anchors stepping further than this multiple of the mean xy
    /// step are replaced before every fit, in the aggregator and in anchor
    /// file export alike. Off when unset.
    #[serde(default)]
    pub outlier_threshold: Option<f64>,
    /// Gaussian sigma, in anchors, applied to midline anchors before every
    /// fit. Off when unset.
    #[serde(default)]
    pub anchor_sigma: Option<f64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pixel_size: PixelSize::default(),
            fit: FitParams::default(),
            frame_method: FrameMethod::default(),
            midline_id: default_midline_id(),
            landmark_ids: default_landmark_ids(),
            reference_id: default_reference_id(),
            objects: default_objects(),
            outlier_threshold: None,
            anchor_sigma: None,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("failed to parse analysis config")?;
        config.fit.validate()?;
        if let Some(threshold) = config.outlier_threshold {
            if !(threshold.is_finite() && threshold > 0.0) {
                bail!("outlier_threshold must be positive, got {}", threshold);
            }
        }
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {:?}", path))?;
        Self::from_toml_str(&text).with_context(|| format!("invalid config {:?}", path))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).context("failed to serialize analysis config")
    }
}
