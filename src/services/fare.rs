// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fare and eco-impact estimation.
//!
//! The quote is computed once, when a ride is requested, and frozen on
//! the ride record. Later price changes never touch rides already in
//! flight.

use crate::models::{LocationPoint, VehicleType};

/// Everything a ride request needs priced up front.
#[derive(Debug, Clone, PartialEq)]
pub struct FareQuote {
    pub distance_km: f64,
    pub estimated_fare: f64,
    pub co2_saved_kg: f64,
    pub eco_points: u64,
}

/// Pricing seam. The engine never computes money on its own.
pub trait FareCalculator: Send + Sync {
    fn quote(&self, pickup: &LocationPoint, dropoff: &LocationPoint, vehicle: VehicleType)
        -> FareQuote;
}

/// Distance-based pricing with a per-vehicle rate table.
///
/// CO₂ savings are measured against a petrol car baseline of 0.18 kg/km;
/// eco points accrue at 10 points per kg saved, rounded down.
#[derive(Debug, Clone, Default)]
pub struct StandardFareCalculator;

const PETROL_BASELINE_KG_PER_KM: f64 = 0.18;
const POINTS_PER_KG_SAVED: f64 = 10.0;

impl StandardFareCalculator {
    /// (base fare, per-km rate, emissions kg/km) for each vehicle class.
    fn rate_table(vehicle: VehicleType) -> (f64, f64, f64) {
        match vehicle {
            VehicleType::EBike => (10.0, 5.0, 0.0),
            VehicleType::ERickshaw => (15.0, 8.0, 0.02),
            VehicleType::CngAuto => (20.0, 10.0, 0.07),
            VehicleType::ECar => (30.0, 14.0, 0.05),
        }
    }
}

impl FareCalculator for StandardFareCalculator {
    fn quote(
        &self,
        pickup: &LocationPoint,
        dropoff: &LocationPoint,
        vehicle: VehicleType,
    ) -> FareQuote {
        let distance_km = haversine_km(pickup.lat, pickup.lng, dropoff.lat, dropoff.lng);
        let (base, per_km, emissions) = Self::rate_table(vehicle);

        let estimated_fare = round2(base + per_km * distance_km);
        let co2_saved_kg = round2((PETROL_BASELINE_KG_PER_KM - emissions).max(0.0) * distance_km);
        let eco_points = (co2_saved_kg * POINTS_PER_KG_SAVED).floor() as u64;

        FareQuote {
            distance_km: round2(distance_km),
            estimated_fare,
            co2_saved_kg,
            eco_points,
        }
    }
}

/// Great-circle distance between two coordinates in kilometers.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lng: f64) -> LocationPoint {
        LocationPoint {
            address: "test".to_string(),
            lat,
            lng,
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // Connaught Place to India Gate, roughly 2.5 km.
        let d = haversine_km(28.6315, 77.2167, 28.6129, 77.2295);
        assert!(d > 2.0 && d < 3.0, "got {d}");
    }

    #[test]
    fn test_zero_distance_is_base_fare_only() {
        let calc = StandardFareCalculator;
        let p = point(28.6315, 77.2167);
        let quote = calc.quote(&p, &p, VehicleType::ERickshaw);
        assert_eq!(quote.distance_km, 0.0);
        assert_eq!(quote.estimated_fare, 15.0);
        assert_eq!(quote.co2_saved_kg, 0.0);
        assert_eq!(quote.eco_points, 0);
    }

    #[test]
    fn test_quote_is_deterministic() {
        let calc = StandardFareCalculator;
        let a = point(28.6315, 77.2167);
        let b = point(28.5355, 77.3910);
        assert_eq!(
            calc.quote(&a, &b, VehicleType::ECar),
            calc.quote(&a, &b, VehicleType::ECar)
        );
    }

    #[test]
    fn test_cleaner_vehicle_saves_more_co2() {
        let calc = StandardFareCalculator;
        let a = point(28.6315, 77.2167);
        let b = point(28.5355, 77.3910);
        let bike = calc.quote(&a, &b, VehicleType::EBike);
        let auto = calc.quote(&a, &b, VehicleType::CngAuto);
        assert!(bike.co2_saved_kg > auto.co2_saved_kg);
        assert!(bike.eco_points > auto.eco_points);
    }
}
