//! Arrival time estimation along an ordered route
//!
//! Arrivals chain: each stop's arrival is the previous arrival plus the leg's
//! travel time plus the fixed service time.

use chrono::{DateTime, Duration, Utc};

use crate::defaults::{DEFAULT_AVG_SPEED_KMH, DEFAULT_SERVICE_TIME_MINUTES};
use crate::error::{DispatchError, Result};
use crate::services::geo;
use crate::types::RouteStop;

/// Speed and per-stop service time used for estimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtaParams {
    pub avg_speed_kmh: f64,
    pub service_time_minutes: f64,
}

impl Default for EtaParams {
    fn default() -> Self {
        Self {
            avg_speed_kmh: DEFAULT_AVG_SPEED_KMH,
            service_time_minutes: DEFAULT_SERVICE_TIME_MINUTES,
        }
    }
}

impl EtaParams {
    /// Request overrides on top of the configured defaults.
    pub fn with_overrides(self, avg_speed_kmh: Option<f64>, service_time_minutes: Option<f64>) -> Self {
        Self {
            avg_speed_kmh: avg_speed_kmh.unwrap_or(self.avg_speed_kmh),
            service_time_minutes: service_time_minutes.unwrap_or(self.service_time_minutes),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.avg_speed_kmh.is_finite() || self.avg_speed_kmh <= 0.0 {
            return Err(DispatchError::invalid_parameter(
                "avgSpeedKmh",
                format!("must be a positive number, got {}", self.avg_speed_kmh),
            ));
        }
        if !self.service_time_minutes.is_finite() || self.service_time_minutes < 0.0 {
            return Err(DispatchError::invalid_parameter(
                "serviceTimeMinutes",
                format!("must be zero or positive, got {}", self.service_time_minutes),
            ));
        }
        Ok(())
    }
}

fn minutes_to_duration(minutes: f64) -> Duration {
    Duration::milliseconds((minutes * 60_000.0).round() as i64)
}

/// One arrival per leg, chained from `start`.
pub fn estimate(start: DateTime<Utc>, legs_km: &[f64], params: EtaParams) -> Result<Vec<DateTime<Utc>>> {
    params.validate()?;

    let mut elapsed_minutes = 0.0;
    let mut arrivals = Vec::with_capacity(legs_km.len());
    for &leg in legs_km {
        elapsed_minutes += geo::travel_time_minutes(leg, params.avg_speed_kmh)?;
        elapsed_minutes += params.service_time_minutes;
        arrivals.push(start + minutes_to_duration(elapsed_minutes));
    }
    Ok(arrivals)
}

/// Fill `estimated_arrival` on already ordered stops.
pub fn annotate(start: DateTime<Utc>, stops: &mut [RouteStop], params: EtaParams) -> Result<()> {
    let legs: Vec<f64> = stops.iter().map(|s| s.distance_from_previous_km).collect();
    let arrivals = estimate(start, &legs, params)?;
    for (stop, arrival) in stops.iter_mut().zip(arrivals) {
        stop.estimated_arrival = Some(arrival);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 7, 8, 0, 0).unwrap()
    }

    fn params(speed: f64, service: f64) -> EtaParams {
        EtaParams {
            avg_speed_kmh: speed,
            service_time_minutes: service,
        }
    }

    #[test]
    fn test_arrivals_chain_sequentially() {
        // 20 km @ 40 km/h = 30 min, +10 service
        // 10 km @ 40 km/h = 15 min, +10 service
        let arrivals = estimate(start(), &[20.0, 10.0], params(40.0, 10.0)).unwrap();
        assert_eq!(arrivals[0], start() + Duration::minutes(40));
        assert_eq!(arrivals[1], start() + Duration::minutes(65));
    }

    #[test]
    fn test_zero_legs_still_add_service_time() {
        let arrivals = estimate(start(), &[0.0, 0.0, 0.0], params(40.0, 10.0)).unwrap();
        assert_eq!(arrivals[2], start() + Duration::minutes(30));
    }

    #[test]
    fn test_empty_route() {
        assert!(estimate(start(), &[], EtaParams::default()).unwrap().is_empty());
    }

    #[test]
    fn test_fractional_minutes() {
        // 1 km @ 40 km/h = 1.5 min
        let arrivals = estimate(start(), &[1.0], params(40.0, 0.0)).unwrap();
        assert_eq!(arrivals[0], start() + Duration::seconds(90));
    }

    #[test]
    fn test_invalid_speed_rejected() {
        for speed in [0.0, -10.0, f64::NAN] {
            assert!(matches!(
                estimate(start(), &[1.0], params(speed, 10.0)),
                Err(DispatchError::InvalidParameter { name: "avgSpeedKmh", .. })
            ));
        }
        // rejected even without legs
        assert!(estimate(start(), &[], params(0.0, 10.0)).is_err());
    }

    #[test]
    fn test_negative_service_time_rejected() {
        assert!(matches!(
            estimate(start(), &[1.0], params(40.0, -1.0)),
            Err(DispatchError::InvalidParameter { name: "serviceTimeMinutes", .. })
        ));
    }

    #[test]
    fn test_annotate_sets_every_stop() {
        let mut stops: Vec<RouteStop> = [4.0, 8.0]
            .iter()
            .enumerate()
            .map(|(i, &km)| RouteStop {
                task_id: Uuid::new_v4(),
                order: i as i32 + 1,
                distance_from_previous_km: km,
                estimated_arrival: None,
            })
            .collect();
        annotate(start(), &mut stops, params(40.0, 10.0)).unwrap();
        assert_eq!(stops[0].estimated_arrival, Some(start() + Duration::minutes(16)));
        assert_eq!(stops[1].estimated_arrival, Some(start() + Duration::minutes(38)));
    }

    #[test]
    fn test_overrides() {
        let p = EtaParams::default().with_overrides(Some(60.0), None);
        assert_eq!(p.avg_speed_kmh, 60.0);
        assert_eq!(p.service_time_minutes, DEFAULT_SERVICE_TIME_MINUTES);
    }
}
