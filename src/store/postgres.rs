// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgreSQL backing store (sqlx).
//!
//! Uses the runtime query API so the crate builds without a live
//! `DATABASE_URL`. The `accept_ride` race is resolved by a single
//! conditional UPDATE; everything else is ordinary merge-on-write.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::FromRow;

use crate::models::{
    AdminStats, Badge, DriverProfile, DriverProfilePatch, DriverStats, LocationPoint, Payment,
    PaymentStatus, Rating, Referral, Ride, RidePatch, RiderStats, RideStatus, Role, User,
    UserBadge, UserPatch, VehicleDescriptor, VehicleType, VerificationStatus,
};
use crate::store::{Store, StoreError};
use crate::time_utils::now_rfc3339;

/// PostgreSQL store holding a connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and run embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to Postgres: {}", e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("Migration failed: {}", e)))?;

        tracing::info!("Connected to Postgres");
        Ok(Self { pool })
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

// ─── Enum <-> text conversions ───────────────────────────────────

fn role_str(role: Role) -> &'static str {
    match role {
        Role::Rider => "rider",
        Role::Driver => "driver",
        Role::Admin => "admin",
    }
}

fn parse_role(s: &str) -> Result<Role, StoreError> {
    match s {
        "rider" => Ok(Role::Rider),
        "driver" => Ok(Role::Driver),
        "admin" => Ok(Role::Admin),
        other => Err(StoreError::Backend(format!("unknown role '{}'", other))),
    }
}

fn parse_status(s: &str) -> Result<RideStatus, StoreError> {
    match s {
        "pending" => Ok(RideStatus::Pending),
        "accepted" => Ok(RideStatus::Accepted),
        "in_progress" => Ok(RideStatus::InProgress),
        "completed" => Ok(RideStatus::Completed),
        "cancelled" => Ok(RideStatus::Cancelled),
        other => Err(StoreError::Backend(format!("unknown status '{}'", other))),
    }
}

fn parse_vehicle(s: &str) -> Result<VehicleType, StoreError> {
    match s {
        "e_rickshaw" => Ok(VehicleType::ERickshaw),
        "e_bike" => Ok(VehicleType::EBike),
        "e_car" => Ok(VehicleType::ECar),
        "cng_auto" => Ok(VehicleType::CngAuto),
        other => Err(StoreError::Backend(format!(
            "unknown vehicle type '{}'",
            other
        ))),
    }
}

fn verification_str(v: VerificationStatus) -> &'static str {
    match v {
        VerificationStatus::Pending => "pending",
        VerificationStatus::Verified => "verified",
        VerificationStatus::Rejected => "rejected",
    }
}

fn parse_verification(s: &str) -> Result<VerificationStatus, StoreError> {
    match s {
        "pending" => Ok(VerificationStatus::Pending),
        "verified" => Ok(VerificationStatus::Verified),
        "rejected" => Ok(VerificationStatus::Rejected),
        other => Err(StoreError::Backend(format!(
            "unknown verification status '{}'",
            other
        ))),
    }
}

fn payment_status_str(s: PaymentStatus) -> &'static str {
    match s {
        PaymentStatus::Created => "created",
        PaymentStatus::Succeeded => "succeeded",
        PaymentStatus::Failed => "failed",
    }
}

fn parse_payment_status(s: &str) -> Result<PaymentStatus, StoreError> {
    match s {
        "created" => Ok(PaymentStatus::Created),
        "succeeded" => Ok(PaymentStatus::Succeeded),
        "failed" => Ok(PaymentStatus::Failed),
        other => Err(StoreError::Backend(format!(
            "unknown payment status '{}'",
            other
        ))),
    }
}

// ─── Row types ───────────────────────────────────────────────────

#[derive(FromRow)]
struct UserRow {
    id: String,
    external_auth_id: Option<String>,
    email: String,
    display_name: String,
    role: String,
    eco_points: i64,
    co2_saved_kg: f64,
    referral_code: String,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, StoreError> {
        Ok(User {
            role: parse_role(&row.role)?,
            id: row.id,
            external_auth_id: row.external_auth_id,
            email: row.email,
            display_name: row.display_name,
            eco_points: row.eco_points as u64,
            co2_saved_kg: row.co2_saved_kg,
            referral_code: row.referral_code,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct DriverProfileRow {
    user_id: String,
    vehicle_type: String,
    vehicle_model: String,
    vehicle_plate: String,
    license_number: String,
    verification: String,
    rating: f64,
    total_rides: i64,
    total_earnings: f64,
    available: bool,
    updated_at: String,
}

impl TryFrom<DriverProfileRow> for DriverProfile {
    type Error = StoreError;

    fn try_from(row: DriverProfileRow) -> Result<Self, StoreError> {
        Ok(DriverProfile {
            vehicle: VehicleDescriptor {
                vehicle_type: parse_vehicle(&row.vehicle_type)?,
                model: row.vehicle_model,
                plate: row.vehicle_plate,
            },
            verification: parse_verification(&row.verification)?,
            user_id: row.user_id,
            license_number: row.license_number,
            rating: row.rating,
            total_rides: row.total_rides as u64,
            total_earnings: row.total_earnings,
            available: row.available,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct RideRow {
    id: String,
    rider_id: String,
    driver_id: Option<String>,
    pickup_address: String,
    pickup_lat: f64,
    pickup_lng: f64,
    dropoff_address: String,
    dropoff_lat: f64,
    dropoff_lng: f64,
    vehicle_type: String,
    status: String,
    estimated_fare: f64,
    actual_fare: Option<f64>,
    distance_km: f64,
    co2_saved_kg: f64,
    eco_points: i64,
    requested_at: String,
    accepted_at: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
    cancelled_at: Option<String>,
}

impl TryFrom<RideRow> for Ride {
    type Error = StoreError;

    fn try_from(row: RideRow) -> Result<Self, StoreError> {
        Ok(Ride {
            vehicle_type: parse_vehicle(&row.vehicle_type)?,
            status: parse_status(&row.status)?,
            pickup: LocationPoint {
                address: row.pickup_address,
                lat: row.pickup_lat,
                lng: row.pickup_lng,
            },
            dropoff: LocationPoint {
                address: row.dropoff_address,
                lat: row.dropoff_lat,
                lng: row.dropoff_lng,
            },
            id: row.id,
            rider_id: row.rider_id,
            driver_id: row.driver_id,
            estimated_fare: row.estimated_fare,
            actual_fare: row.actual_fare,
            distance_km: row.distance_km,
            co2_saved_kg: row.co2_saved_kg,
            eco_points: row.eco_points as u64,
            requested_at: row.requested_at,
            accepted_at: row.accepted_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    ride_id: String,
    rider_id: String,
    amount: f64,
    method: String,
    status: String,
    provider_ref: String,
    created_at: String,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, StoreError> {
        Ok(Payment {
            status: parse_payment_status(&row.status)?,
            id: row.id,
            ride_id: row.ride_id,
            rider_id: row.rider_id,
            amount: row.amount,
            method: row.method,
            provider_ref: row.provider_ref,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct RatingRow {
    id: String,
    ride_id: String,
    rater_id: String,
    ratee_id: String,
    stars: i16,
    comment: Option<String>,
    created_at: String,
}

impl From<RatingRow> for Rating {
    fn from(row: RatingRow) -> Self {
        Rating {
            id: row.id,
            ride_id: row.ride_id,
            rater_id: row.rater_id,
            ratee_id: row.ratee_id,
            stars: row.stars as u8,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

const RIDE_COLS: &str = "id, rider_id, driver_id, pickup_address, pickup_lat, pickup_lng, \
     dropoff_address, dropoff_lat, dropoff_lng, vehicle_type, status, estimated_fare, \
     actual_fare, distance_km, co2_saved_kg, eco_points, requested_at, accepted_at, \
     started_at, completed_at, cancelled_at";

impl PostgresStore {
    async fn fetch_ride(&self, id: &str) -> Result<Option<Ride>, StoreError> {
        let sql = format!("SELECT {} FROM rides WHERE id = $1", RIDE_COLS);
        sqlx::query_as::<_, RideRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Ride::try_from)
            .transpose()
    }

    async fn write_ride(&self, ride: &Ride) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO rides ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, \
             $13, $14, $15, $16, $17, $18, $19, $20, $21) \
             ON CONFLICT (id) DO UPDATE SET driver_id = EXCLUDED.driver_id, \
             status = EXCLUDED.status, actual_fare = EXCLUDED.actual_fare, \
             accepted_at = EXCLUDED.accepted_at, started_at = EXCLUDED.started_at, \
             completed_at = EXCLUDED.completed_at, cancelled_at = EXCLUDED.cancelled_at",
            RIDE_COLS
        );
        sqlx::query(&sql)
            .bind(&ride.id)
            .bind(&ride.rider_id)
            .bind(&ride.driver_id)
            .bind(&ride.pickup.address)
            .bind(ride.pickup.lat)
            .bind(ride.pickup.lng)
            .bind(&ride.dropoff.address)
            .bind(ride.dropoff.lat)
            .bind(ride.dropoff.lng)
            .bind(ride.vehicle_type.as_str())
            .bind(ride.status.as_str())
            .bind(ride.estimated_fare)
            .bind(ride.actual_fare)
            .bind(ride.distance_km)
            .bind(ride.co2_saved_kg)
            .bind(ride.eco_points as i64)
            .bind(&ride.requested_at)
            .bind(&ride.accepted_at)
            .bind(&ride.started_at)
            .bind(&ride.completed_at)
            .bind(&ride.cancelled_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn query_rides(&self, sql: &str, binds: &[&str]) -> Result<Vec<Ride>, StoreError> {
        let mut query = sqlx::query_as::<_, RideRow>(sql);
        for bind in binds {
            query = query.bind(bind.to_string());
        }
        query
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Ride::try_from)
            .collect()
    }
}

#[async_trait]
impl Store for PostgresStore {
    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(User::try_from)
            .transpose()
    }

    async fn get_user_by_external_auth(&self, subject: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE external_auth_id = $1")
            .bind(subject)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(User::try_from)
            .transpose()
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, external_auth_id, email, display_name, role, eco_points, \
             co2_saved_kg, referral_code, active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&user.id)
        .bind(&user.external_auth_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(role_str(user.role))
        .bind(user.eco_points as i64)
        .bind(user.co2_saved_kg)
        .bind(&user.referral_code)
        .bind(user.active)
        .bind(&user.created_at)
        .bind(&user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<User, StoreError> {
        // SELECT ... FOR UPDATE keeps the merge atomic against concurrent
        // counter increments (two completions for the same rider).
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))?;

        let mut user = User::try_from(row)?;
        user.apply(patch, &now_rfc3339());

        sqlx::query(
            "UPDATE users SET email = $2, display_name = $3, eco_points = $4, \
             co2_saved_kg = $5, active = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.eco_points as i64)
        .bind(user.co2_saved_kg)
        .bind(user.active)
        .bind(&user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(user)
    }

    // ─── Driver Profiles ─────────────────────────────────────────

    async fn get_driver_profile(&self, user_id: &str) -> Result<Option<DriverProfile>, StoreError> {
        sqlx::query_as::<_, DriverProfileRow>("SELECT * FROM driver_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(DriverProfile::try_from)
            .transpose()
    }

    async fn create_driver_profile(&self, profile: &DriverProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO driver_profiles (user_id, vehicle_type, vehicle_model, vehicle_plate, \
             license_number, verification, rating, total_rides, total_earnings, available, \
             updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&profile.user_id)
        .bind(profile.vehicle.vehicle_type.as_str())
        .bind(&profile.vehicle.model)
        .bind(&profile.vehicle.plate)
        .bind(&profile.license_number)
        .bind(verification_str(profile.verification))
        .bind(profile.rating)
        .bind(profile.total_rides as i64)
        .bind(profile.total_earnings)
        .bind(profile.available)
        .bind(&profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_driver_profile(
        &self,
        user_id: &str,
        patch: &DriverProfilePatch,
    ) -> Result<DriverProfile, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query_as::<_, DriverProfileRow>(
            "SELECT * FROM driver_profiles WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StoreError::NotFound(format!("driver profile {}", user_id)))?;

        let mut profile = DriverProfile::try_from(row)?;
        profile.apply(patch, &now_rfc3339());

        sqlx::query(
            "UPDATE driver_profiles SET vehicle_type = $2, vehicle_model = $3, \
             vehicle_plate = $4, license_number = $5, verification = $6, rating = $7, \
             total_rides = $8, total_earnings = $9, available = $10, updated_at = $11 \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(profile.vehicle.vehicle_type.as_str())
        .bind(&profile.vehicle.model)
        .bind(&profile.vehicle.plate)
        .bind(&profile.license_number)
        .bind(verification_str(profile.verification))
        .bind(profile.rating)
        .bind(profile.total_rides as i64)
        .bind(profile.total_earnings)
        .bind(profile.available)
        .bind(&profile.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(profile)
    }

    // ─── Rides ───────────────────────────────────────────────────

    async fn create_ride(&self, ride: &Ride) -> Result<(), StoreError> {
        self.write_ride(ride).await
    }

    async fn get_ride(&self, id: &str) -> Result<Option<Ride>, StoreError> {
        self.fetch_ride(id).await
    }

    async fn get_user_rides(&self, user_id: &str, role: Role) -> Result<Vec<Ride>, StoreError> {
        let column = match role {
            Role::Driver => "driver_id",
            _ => "rider_id",
        };
        let sql = format!(
            "SELECT {} FROM rides WHERE {} = $1 ORDER BY requested_at DESC",
            RIDE_COLS, column
        );
        self.query_rides(&sql, &[user_id]).await
    }

    async fn get_pending_rides(&self) -> Result<Vec<Ride>, StoreError> {
        let sql = format!(
            "SELECT {} FROM rides WHERE status = 'pending' ORDER BY requested_at ASC",
            RIDE_COLS
        );
        self.query_rides(&sql, &[]).await
    }

    async fn get_active_rides(&self) -> Result<Vec<Ride>, StoreError> {
        let sql = format!(
            "SELECT {} FROM rides WHERE status IN ('accepted', 'in_progress') \
             ORDER BY requested_at ASC",
            RIDE_COLS
        );
        self.query_rides(&sql, &[]).await
    }

    async fn transition_ride(
        &self,
        id: &str,
        expected: RideStatus,
        patch: &RidePatch,
    ) -> Result<Ride, StoreError> {
        // The row lock from SELECT ... FOR UPDATE makes the status check
        // and the write one critical section; a competing transition
        // blocks here and then fails the check.
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let sql = format!("SELECT {} FROM rides WHERE id = $1 FOR UPDATE", RIDE_COLS);
        let row = sqlx::query_as::<_, RideRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StoreError::NotFound(format!("ride {}", id)))?;

        let mut ride = Ride::try_from(row)?;
        if ride.status != expected {
            return Err(StoreError::Conflict(format!(
                "ride is {}, not {}",
                ride.status.as_str(),
                expected.as_str()
            )));
        }
        ride.apply(patch);

        sqlx::query(
            "UPDATE rides SET driver_id = $2, status = $3, actual_fare = $4, \
             started_at = $5, completed_at = $6, cancelled_at = $7 WHERE id = $1",
        )
        .bind(id)
        .bind(&ride.driver_id)
        .bind(ride.status.as_str())
        .bind(ride.actual_fare)
        .bind(&ride.started_at)
        .bind(&ride.completed_at)
        .bind(&ride.cancelled_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(ride)
    }

    async fn accept_ride(&self, ride_id: &str, driver_id: &str) -> Result<Ride, StoreError> {
        // One conditional write: only succeeds while the ride is still
        // pending, so concurrent accepts get exactly one winner.
        let sql = format!(
            "UPDATE rides SET driver_id = $2, status = 'accepted', accepted_at = $3 \
             WHERE id = $1 AND status = 'pending' RETURNING {}",
            RIDE_COLS
        );
        let row = sqlx::query_as::<_, RideRow>(&sql)
            .bind(ride_id)
            .bind(driver_id)
            .bind(now_rfc3339())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => Ride::try_from(row),
            None => {
                // Disambiguate: gone entirely vs. taken by someone else.
                match self.fetch_ride(ride_id).await? {
                    Some(_) => Err(StoreError::Conflict("ride no longer available".to_string())),
                    None => Err(StoreError::NotFound(format!("ride {}", ride_id))),
                }
            }
        }
    }

    // ─── Satellite Records ───────────────────────────────────────

    async fn create_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payments (id, ride_id, rider_id, amount, method, status, provider_ref, \
             created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&payment.id)
        .bind(&payment.ride_id)
        .bind(&payment.rider_id)
        .bind(payment.amount)
        .bind(&payment.method)
        .bind(payment_status_str(payment.status))
        .bind(&payment.provider_ref)
        .bind(&payment.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_payment_status(
        &self,
        id: &str,
        status: PaymentStatus,
    ) -> Result<Payment, StoreError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            "UPDATE payments SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(payment_status_str(status))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StoreError::NotFound(format!("payment {}", id)))?;
        Payment::try_from(row)
    }

    async fn create_rating(&self, rating: &Rating) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO ratings (id, ride_id, rater_id, ratee_id, stars, comment, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&rating.id)
        .bind(&rating.ride_id)
        .bind(&rating.rater_id)
        .bind(&rating.ratee_id)
        .bind(rating.stars as i16)
        .bind(&rating.comment)
        .bind(&rating.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_ride_rating(&self, ride_id: &str) -> Result<Option<Rating>, StoreError> {
        Ok(
            sqlx::query_as::<_, RatingRow>("SELECT * FROM ratings WHERE ride_id = $1 LIMIT 1")
                .bind(ride_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?
                .map(Rating::from),
        )
    }

    async fn get_ratings_for_user(&self, ratee_id: &str) -> Result<Vec<Rating>, StoreError> {
        let rows = sqlx::query_as::<_, RatingRow>("SELECT * FROM ratings WHERE ratee_id = $1")
            .bind(ratee_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Rating::from).collect())
    }

    async fn list_badges(&self) -> Result<Vec<Badge>, StoreError> {
        #[derive(FromRow)]
        struct BadgeRow {
            id: String,
            name: String,
            description: String,
            threshold_points: i64,
        }

        let rows = sqlx::query_as::<_, BadgeRow>(
            "SELECT * FROM badges ORDER BY threshold_points ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|row| Badge {
                id: row.id,
                name: row.name,
                description: row.description,
                threshold_points: row.threshold_points as u64,
            })
            .collect())
    }

    async fn award_badge(&self, user_badge: &UserBadge) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO user_badges (user_id, badge_id, awarded_at) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, badge_id) DO NOTHING",
        )
        .bind(&user_badge.user_id)
        .bind(&user_badge.badge_id)
        .bind(&user_badge.awarded_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_user_badges(&self, user_id: &str) -> Result<Vec<UserBadge>, StoreError> {
        #[derive(FromRow)]
        struct UserBadgeRow {
            user_id: String,
            badge_id: String,
            awarded_at: String,
        }

        let rows = sqlx::query_as::<_, UserBadgeRow>(
            "SELECT * FROM user_badges WHERE user_id = $1 ORDER BY awarded_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|row| UserBadge {
                user_id: row.user_id,
                badge_id: row.badge_id,
                awarded_at: row.awarded_at,
            })
            .collect())
    }

    async fn create_referral(&self, referral: &Referral) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO referrals (code, referrer_id, redeemed_by, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&referral.code)
        .bind(&referral.referrer_id)
        .bind(&referral.redeemed_by)
        .bind(&referral.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_referral(&self, code: &str) -> Result<Option<Referral>, StoreError> {
        #[derive(FromRow)]
        struct ReferralRow {
            code: String,
            referrer_id: String,
            redeemed_by: Option<String>,
            created_at: String,
        }

        Ok(
            sqlx::query_as::<_, ReferralRow>("SELECT * FROM referrals WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?
                .map(|row| Referral {
                    code: row.code,
                    referrer_id: row.referrer_id,
                    redeemed_by: row.redeemed_by,
                    created_at: row.created_at,
                }),
        )
    }

    // ─── Aggregates ──────────────────────────────────────────────

    async fn rider_stats(&self, user_id: &str) -> Result<RiderStats, StoreError> {
        let user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;

        let completed_rides: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rides WHERE rider_id = $1 AND status = 'completed'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        let badge_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_badges WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(RiderStats {
            completed_rides: completed_rides as u64,
            eco_points: user.eco_points,
            co2_saved_kg: user.co2_saved_kg,
            badge_count: badge_count as u64,
        })
    }

    async fn driver_stats(&self, user_id: &str) -> Result<DriverStats, StoreError> {
        let profile = self
            .get_driver_profile(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("driver profile {}", user_id)))?;

        let rides = self.get_user_rides(user_id, Role::Driver).await?;

        Ok(DriverStats {
            total_rides: profile.total_rides,
            total_earnings: profile.total_earnings,
            today_earnings: crate::models::stats::today_earnings(&rides),
            rating: profile.rating,
            available: profile.available,
        })
    }

    async fn admin_stats(&self) -> Result<AdminStats, StoreError> {
        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let total_drivers: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'driver'")
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;

        let mut stats = AdminStats {
            total_users: total_users as u64,
            total_drivers: total_drivers as u64,
            total_rides: 0,
            completed_rides: 0,
            total_revenue: 0.0,
            total_co2_saved_kg: 0.0,
            rides_by_vehicle_type: Default::default(),
        };

        let sql = format!("SELECT {} FROM rides", RIDE_COLS);
        let rides = self.query_rides(&sql, &[]).await?;
        crate::models::stats::fold_admin_totals(&mut stats, &rides);
        Ok(stats)
    }
}
