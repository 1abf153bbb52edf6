//! Derived stats aggregates for the rider, driver and admin dashboards.
//!
//! These are computed on demand from the backing store; nothing here is
//! persisted, so calling a stats query twice with no intervening mutation
//! returns identical results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Ride, RideStatus};
use crate::time_utils::is_today_utc;

/// Rider dashboard aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderStats {
    pub completed_rides: u64,
    pub eco_points: u64,
    pub co2_saved_kg: f64,
    pub badge_count: u64,
}

/// Driver dashboard aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverStats {
    pub total_rides: u64,
    pub total_earnings: f64,
    /// Sum of actual fares of rides completed on the current UTC day
    pub today_earnings: f64,
    pub rating: f64,
    pub available: bool,
}

/// Fleet-wide admin aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub total_drivers: u64,
    pub total_rides: u64,
    pub completed_rides: u64,
    pub total_revenue: f64,
    pub total_co2_saved_kg: f64,
    /// Completed-ride histogram keyed by vehicle type wire name
    pub rides_by_vehicle_type: HashMap<String, u64>,
}

/// Earnings from rides completed today, out of a driver's ride history.
pub fn today_earnings(rides: &[Ride]) -> f64 {
    rides
        .iter()
        .filter(|r| r.status == RideStatus::Completed)
        .filter(|r| {
            r.completed_at
                .as_deref()
                .map(is_today_utc)
                .unwrap_or(false)
        })
        .map(|r| r.actual_fare.unwrap_or(r.estimated_fare))
        .sum()
}

/// Fold completed rides into the fleet-wide aggregate fields.
pub fn fold_admin_totals(stats: &mut AdminStats, rides: &[Ride]) {
    stats.total_rides = rides.len() as u64;
    for ride in rides {
        if ride.status != RideStatus::Completed {
            continue;
        }
        stats.completed_rides += 1;
        stats.total_revenue += ride.actual_fare.unwrap_or(ride.estimated_fare);
        stats.total_co2_saved_kg += ride.co2_saved_kg;
        *stats
            .rides_by_vehicle_type
            .entry(ride.vehicle_type.as_str().to_string())
            .or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationPoint, VehicleType};
    use crate::time_utils::now_rfc3339;

    fn make_ride(id: &str, status: RideStatus, completed_at: Option<String>) -> Ride {
        Ride {
            id: id.to_string(),
            rider_id: "r1".to_string(),
            driver_id: Some("d1".to_string()),
            pickup: LocationPoint {
                address: "A".to_string(),
                lat: 0.0,
                lng: 0.0,
            },
            dropoff: LocationPoint {
                address: "B".to_string(),
                lat: 1.0,
                lng: 1.0,
            },
            vehicle_type: VehicleType::ERickshaw,
            status,
            estimated_fare: 100.0,
            actual_fare: Some(120.0),
            distance_km: 5.0,
            co2_saved_kg: 0.8,
            eco_points: 10,
            requested_at: now_rfc3339(),
            accepted_at: None,
            started_at: None,
            completed_at,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_today_earnings_filters_by_day_and_status() {
        let rides = vec![
            make_ride("1", RideStatus::Completed, Some(now_rfc3339())),
            make_ride(
                "2",
                RideStatus::Completed,
                Some("2020-01-01T00:00:00Z".to_string()),
            ),
            make_ride("3", RideStatus::InProgress, None),
        ];

        assert_eq!(today_earnings(&rides), 120.0);
    }

    #[test]
    fn test_fold_admin_totals_counts_completed_only() {
        let mut stats = AdminStats {
            total_users: 0,
            total_drivers: 0,
            total_rides: 0,
            completed_rides: 0,
            total_revenue: 0.0,
            total_co2_saved_kg: 0.0,
            rides_by_vehicle_type: HashMap::new(),
        };
        let rides = vec![
            make_ride("1", RideStatus::Completed, Some(now_rfc3339())),
            make_ride("2", RideStatus::Cancelled, None),
        ];

        fold_admin_totals(&mut stats, &rides);

        assert_eq!(stats.total_rides, 2);
        assert_eq!(stats.completed_rides, 1);
        assert_eq!(stats.total_revenue, 120.0);
        assert_eq!(stats.rides_by_vehicle_type.get("e_rickshaw"), Some(&1));
    }
}
