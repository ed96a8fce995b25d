//! Congestion classification from speed ratios.
//!
//! A ratio is `current_speed / free_flow_speed`. Bands are inclusive on the
//! lower bound and exclusive on the upper bound:
//!
//! | ratio        | level      |
//! |--------------|------------|
//! | < 0.3        | very-heavy |
//! | [0.3, 0.5)   | heavy      |
//! | [0.5, 0.7)   | moderate   |
//! | [0.7, 0.9)   | light      |
//! | >= 0.9       | clear      |
//!
//! A missing ratio is `unknown`, never an error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::traffic::TrafficSegment;

pub const VERY_HEAVY_BELOW: f64 = 0.3;
pub const HEAVY_BELOW: f64 = 0.5;
pub const MODERATE_BELOW: f64 = 0.7;
pub const LIGHT_BELOW: f64 = 0.9;

/// Ordered from most to least congested; `Unknown` sorts last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CongestionLevel {
    VeryHeavy,
    Heavy,
    Moderate,
    Light,
    Clear,
    Unknown,
}

impl CongestionLevel {
    /// Total over all inputs. Non-finite and non-positive ratios are unknown.
    pub fn from_ratio(ratio: Option<f64>) -> Self {
        match ratio {
            Some(r) if r.is_finite() && r > 0.0 => {
                if r < VERY_HEAVY_BELOW {
                    CongestionLevel::VeryHeavy
                } else if r < HEAVY_BELOW {
                    CongestionLevel::Heavy
                } else if r < MODERATE_BELOW {
                    CongestionLevel::Moderate
                } else if r < LIGHT_BELOW {
                    CongestionLevel::Light
                } else {
                    CongestionLevel::Clear
                }
            }
            _ => CongestionLevel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CongestionLevel::VeryHeavy => "very-heavy",
            CongestionLevel::Heavy => "heavy",
            CongestionLevel::Moderate => "moderate",
            CongestionLevel::Light => "light",
            CongestionLevel::Clear => "clear",
            CongestionLevel::Unknown => "unknown",
        }
    }

    /// Polyline color for map overlays.
    pub fn color(&self) -> &'static str {
        match self {
            CongestionLevel::VeryHeavy => "#8B0000",
            CongestionLevel::Heavy => "#FF0000",
            CongestionLevel::Moderate => "#FFA500",
            CongestionLevel::Light => "#FFFF00",
            CongestionLevel::Clear => "#00FF00",
            CongestionLevel::Unknown => "#808080",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CongestionLevel::VeryHeavy => "Severe congestion",
            CongestionLevel::Heavy => "Heavy traffic",
            CongestionLevel::Moderate => "Moderate traffic",
            CongestionLevel::Light => "Light traffic",
            CongestionLevel::Clear => "Free flowing",
            CongestionLevel::Unknown => "No traffic data",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, CongestionLevel::Unknown)
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean ratio over segments with a known ratio, if any.
pub fn mean_ratio(segments: &[TrafficSegment]) -> Option<f64> {
    let (sum, count) = segments
        .iter()
        .filter_map(|segment| segment.ratio)
        .fold((0.0, 0usize), |(sum, count), ratio| (sum + ratio, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Aggregate congestion of a sampled route.
pub fn classify(segments: &[TrafficSegment]) -> CongestionLevel {
    CongestionLevel::from_ratio(mean_ratio(segments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::traffic::FlowReading;

    fn segment(reading: Option<FlowReading>) -> TrafficSegment {
        TrafficSegment::new(0, 1, Coordinate::new(6.45, 3.40), reading)
    }

    #[test]
    fn boundaries_are_lower_inclusive() {
        assert_eq!(CongestionLevel::from_ratio(Some(0.3)), CongestionLevel::Heavy);
        assert_eq!(CongestionLevel::from_ratio(Some(0.5)), CongestionLevel::Moderate);
        assert_eq!(CongestionLevel::from_ratio(Some(0.7)), CongestionLevel::Light);
        assert_eq!(CongestionLevel::from_ratio(Some(0.9)), CongestionLevel::Clear);
    }

    #[test]
    fn just_below_boundaries() {
        assert_eq!(CongestionLevel::from_ratio(Some(0.299_999)), CongestionLevel::VeryHeavy);
        assert_eq!(CongestionLevel::from_ratio(Some(0.499_999)), CongestionLevel::Heavy);
        assert_eq!(CongestionLevel::from_ratio(Some(0.699_999)), CongestionLevel::Moderate);
        assert_eq!(CongestionLevel::from_ratio(Some(0.899_999)), CongestionLevel::Light);
        assert_eq!(CongestionLevel::from_ratio(Some(1.4)), CongestionLevel::Clear);
    }

    #[test]
    fn missing_or_degenerate_ratio_is_unknown() {
        assert_eq!(CongestionLevel::from_ratio(None), CongestionLevel::Unknown);
        assert_eq!(CongestionLevel::from_ratio(Some(0.0)), CongestionLevel::Unknown);
        assert_eq!(CongestionLevel::from_ratio(Some(f64::NAN)), CongestionLevel::Unknown);
        assert_eq!(CongestionLevel::from_ratio(Some(-0.4)), CongestionLevel::Unknown);
    }

    #[test]
    fn classify_averages_known_segments_only() {
        let segments = vec![
            segment(Some(FlowReading::new(10.0, 40.0))),
            segment(None),
            segment(Some(FlowReading::new(30.0, 40.0))),
        ];
        // (0.25 + 0.75) / 2 = 0.5
        assert_eq!(mean_ratio(&segments), Some(0.5));
        assert_eq!(classify(&segments), CongestionLevel::Moderate);
    }

    #[test]
    fn classify_without_data_is_unknown() {
        assert_eq!(classify(&[]), CongestionLevel::Unknown);
        assert_eq!(classify(&[segment(None), segment(None)]), CongestionLevel::Unknown);
    }

    #[test]
    fn serializes_kebab_case() {
        let json = serde_json::to_string(&CongestionLevel::VeryHeavy).expect("serialize");
        assert_eq!(json, "\"very-heavy\"");
        assert_eq!(CongestionLevel::VeryHeavy.to_string(), "very-heavy");
    }
}
