//! Core fleet types: Trainset, TrainsetStatus, FitnessCertificate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Trainset Status
// ============================================================================

/// Operational state of a trainset.
///
/// Transitions between states are restricted to the graph enforced by
/// `status_loop::transitions` — strings exist only at the persistence edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainsetStatus {
    #[default]
    Available,
    InService,
    Maintenance,
    Cleaning,
    OutOfOrder,
    Inspection,
}

impl TrainsetStatus {
    /// Get display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            TrainsetStatus::Available => "Available",
            TrainsetStatus::InService => "In Service",
            TrainsetStatus::Maintenance => "Maintenance",
            TrainsetStatus::Cleaning => "Cleaning",
            TrainsetStatus::OutOfOrder => "Out of Order",
            TrainsetStatus::Inspection => "Inspection",
        }
    }

    /// Get short code for logging
    pub fn short_code(&self) -> &'static str {
        match self {
            TrainsetStatus::Available => "AVL",
            TrainsetStatus::InService => "SVC",
            TrainsetStatus::Maintenance => "MNT",
            TrainsetStatus::Cleaning => "CLN",
            TrainsetStatus::OutOfOrder => "OOO",
            TrainsetStatus::Inspection => "INS",
        }
    }

    /// Parse from string (for API/config)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "AVAILABLE" => Some(TrainsetStatus::Available),
            "IN_SERVICE" | "INSERVICE" => Some(TrainsetStatus::InService),
            "MAINTENANCE" => Some(TrainsetStatus::Maintenance),
            "CLEANING" => Some(TrainsetStatus::Cleaning),
            "OUT_OF_ORDER" | "OUTOFORDER" => Some(TrainsetStatus::OutOfOrder),
            "INSPECTION" => Some(TrainsetStatus::Inspection),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrainsetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Trainset
// ============================================================================

/// A single trainset (rake) in the fleet.
///
/// Callers always receive immutable value snapshots from the store; status
/// mutations go through `FleetStore::update_trainset_status` which checks
/// `version` for write conflicts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trainset {
    /// Opaque identifier
    pub id: String,
    /// Unique human-readable label (e.g. "TS-107")
    pub number: String,
    pub manufacturer: String,
    pub model: String,
    pub year_built: i32,
    /// Passenger capacity
    pub capacity: u32,
    /// Maximum speed (km/h)
    pub max_speed_kmh: f64,
    /// Current operational state
    pub status: TrainsetStatus,
    /// Home depot name
    pub depot: String,
    /// Free-text current stabling location
    pub location: String,
    /// Mileage since last maintenance (km)
    pub current_mileage: f64,
    /// Lifetime mileage (km), monotonic non-decreasing
    pub total_mileage: f64,
    /// Lifetime operational hours, monotonic non-decreasing
    pub operational_hours: f64,
    pub last_maintenance_at: Option<DateTime<Utc>>,
    pub next_maintenance_due_at: Option<DateTime<Utc>>,
    pub last_cleaning_at: Option<DateTime<Utc>>,
    pub next_cleaning_at: Option<DateTime<Utc>>,
    /// Fitness certificate expiry, denormalized from the active certificate
    pub fitness_expiry_at: Option<DateTime<Utc>>,
    /// Soft-delete flag; inactive trainsets are excluded from all planning
    pub is_active: bool,
    /// Optimistic-concurrency version, bumped on every write
    #[serde(default)]
    pub version: u64,
}

impl Trainset {
    /// Validate structural invariants.
    ///
    /// Returns a list of violation descriptions; empty when the record is
    /// internally consistent.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.current_mileage > self.total_mileage {
            violations.push(format!(
                "current_mileage {:.0} exceeds total_mileage {:.0}",
                self.current_mileage, self.total_mileage
            ));
        }

        if let (Some(last), Some(next)) = (self.last_maintenance_at, self.next_maintenance_due_at) {
            if last > next {
                violations.push(format!(
                    "last_maintenance_at {} is after next_maintenance_due_at {}",
                    last, next
                ));
            }
        }

        violations
    }

    /// Whether the trainset is parked at its home depot.
    pub fn at_home_depot(&self) -> bool {
        !self.location.is_empty() && self.location == self.depot
    }
}

// ============================================================================
// Fitness Certificate
// ============================================================================

/// Lifecycle state of a fitness certificate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    Valid,
    Expired,
    Suspended,
    Revoked,
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertificateStatus::Valid => write!(f, "Valid"),
            CertificateStatus::Expired => write!(f, "Expired"),
            CertificateStatus::Suspended => write!(f, "Suspended"),
            CertificateStatus::Revoked => write!(f, "Revoked"),
        }
    }
}

/// Fitness certificate issued by a certifying authority.
///
/// At most one VALID certificate per trainset at any time. EXPIRED is a
/// derived state: a certificate whose `expires_at` has passed is treated as
/// expired regardless of its stored status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FitnessCertificate {
    pub id: String,
    pub trainset_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: CertificateStatus,
    pub issuing_authority: String,
}

impl FitnessCertificate {
    /// Effective status at the given instant (EXPIRED is derived).
    pub fn effective_status(&self, now: DateTime<Utc>) -> CertificateStatus {
        if self.status == CertificateStatus::Valid && now > self.expires_at {
            CertificateStatus::Expired
        } else {
            self.status
        }
    }

    /// Whether the certificate is usable for induction at the given instant.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == CertificateStatus::Valid
    }

    /// Whole days until expiry (negative if already expired).
    pub fn days_to_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_trainset() -> Trainset {
        Trainset {
            id: "ts-001".to_string(),
            number: "TS-001".to_string(),
            manufacturer: "Alstom".to_string(),
            model: "Metropolis".to_string(),
            year_built: 2017,
            capacity: 975,
            max_speed_kmh: 80.0,
            status: TrainsetStatus::Available,
            depot: "Muttom".to_string(),
            location: "Muttom".to_string(),
            current_mileage: 1_200.0,
            total_mileage: 182_000.0,
            operational_hours: 14_300.0,
            last_maintenance_at: None,
            next_maintenance_due_at: None,
            last_cleaning_at: None,
            next_cleaning_at: None,
            fitness_expiry_at: None,
            is_active: true,
            version: 0,
        }
    }

    #[test]
    fn mileage_invariant_detected() {
        let mut ts = make_trainset();
        ts.current_mileage = 200_000.0;
        let violations = ts.invariant_violations();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("current_mileage"));
    }

    #[test]
    fn maintenance_ordering_invariant_detected() {
        let mut ts = make_trainset();
        let now = Utc::now();
        ts.last_maintenance_at = Some(now);
        ts.next_maintenance_due_at = Some(now - Duration::days(1));
        assert_eq!(ts.invariant_violations().len(), 1);
    }

    #[test]
    fn certificate_expiry_is_derived() {
        let now = Utc::now();
        let cert = FitnessCertificate {
            id: "fc-1".to_string(),
            trainset_id: "ts-001".to_string(),
            issued_at: now - Duration::days(365),
            expires_at: now - Duration::days(1),
            status: CertificateStatus::Valid,
            issuing_authority: "CMRS".to_string(),
        };
        assert_eq!(cert.effective_status(now), CertificateStatus::Expired);
        assert!(!cert.is_valid_at(now));
        assert!(cert.days_to_expiry(now) < 0);
    }

    #[test]
    fn status_round_trips_through_wire_format() {
        let json = serde_json::to_string(&TrainsetStatus::OutOfOrder).unwrap();
        assert_eq!(json, "\"OUT_OF_ORDER\"");
        let back: TrainsetStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TrainsetStatus::OutOfOrder);
    }
}
