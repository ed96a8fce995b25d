//! Offline flow provider: time-of-day speed profile.
//!
//! Speeds are the free-flow speed scaled by an hourly factor. Factor 1.0 is
//! free flow; 0.3 is gridlock on the bridges at peak.

use async_trait::async_trait;
use chrono::Timelike;
use serde::{Deserialize, Serialize};

use super::{FlowProvider, FlowReading};
use crate::clock::lagos_now;
use crate::error::NavError;
use crate::geo::Coordinate;

/// Hourly speed multipliers (index 0 = midnight, local time).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficProfile {
    pub hourly_factors: [f64; 24],
}

impl TrafficProfile {
    /// Typical Lagos weekday pattern.
    ///
    /// - 00–05: 1.0  (free flow)
    /// - 06:    0.75 (early commute)
    /// - 07–09: 0.35 (morning rush onto the Island)
    /// - 10–15: 0.6  (midday)
    /// - 16–19: 0.3  (evening rush back to the Mainland)
    /// - 20–21: 0.6
    /// - 22–23: 0.85
    pub fn lagos() -> Self {
        let mut f = [1.0_f64; 24];
        f[6] = 0.75;
        for slot in &mut f[7..10] {
            *slot = 0.35;
        }
        for slot in &mut f[10..16] {
            *slot = 0.6;
        }
        for slot in &mut f[16..20] {
            *slot = 0.3;
        }
        f[20] = 0.6;
        f[21] = 0.6;
        f[22] = 0.85;
        f[23] = 0.85;
        Self { hourly_factors: f }
    }

    pub fn factor_at_hour(&self, hour: u32) -> f64 {
        self.hourly_factors[(hour % 24) as usize]
    }
}

#[derive(Clone, Debug)]
pub struct ProfileFlowProvider {
    pub profile: TrafficProfile,
    pub free_flow_kmh: f64,
}

impl ProfileFlowProvider {
    pub fn lagos() -> Self {
        Self {
            profile: TrafficProfile::lagos(),
            free_flow_kmh: 50.0,
        }
    }

    pub fn reading_at_hour(&self, hour: u32) -> FlowReading {
        FlowReading::new(
            self.free_flow_kmh * self.profile.factor_at_hour(hour),
            self.free_flow_kmh,
        )
    }
}

#[async_trait]
impl FlowProvider for ProfileFlowProvider {
    fn name(&self) -> &'static str {
        "profile"
    }

    async fn flow_at(&self, _point: Coordinate) -> Result<Option<FlowReading>, NavError> {
        Ok(Some(self.reading_at_hour(lagos_now().hour())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::congestion::CongestionLevel;

    #[test]
    fn lagos_rush_hours_are_slower() {
        let p = TrafficProfile::lagos();
        assert_eq!(p.factor_at_hour(3), 1.0);
        assert!(p.factor_at_hour(8) < 0.5);
        assert!(p.factor_at_hour(17) < 0.5);
        assert!(p.factor_at_hour(12) > 0.5);
        assert!(p.factor_at_hour(12) < 1.0);
    }

    #[test]
    fn morning_rush_reads_as_heavy() {
        let provider = ProfileFlowProvider::lagos();
        let reading = provider.reading_at_hour(8);
        assert_eq!(
            CongestionLevel::from_ratio(reading.ratio()),
            CongestionLevel::Heavy
        );
        let night = provider.reading_at_hour(2);
        assert_eq!(
            CongestionLevel::from_ratio(night.ratio()),
            CongestionLevel::Clear
        );
    }
}
