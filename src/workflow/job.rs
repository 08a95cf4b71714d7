use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::photo::PhotoHandle;

/// Coarse lifecycle status of a transport job.
///
/// This is the persisted form: a resumed session derives its starting
/// phase from this field alone. Transitions are monotonic along the
/// phase sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    AwaitingStart,
    Departed,
    PickedUp,
    RoutePlanned,
    Delivering,
    Delivered,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::AwaitingStart => "awaiting-start",
            JobStatus::Departed => "departed",
            JobStatus::PickedUp => "picked-up",
            JobStatus::RoutePlanned => "route-planned",
            JobStatus::Delivering => "delivering",
            JobStatus::Delivered => "delivered",
        };
        write!(f, "{s}")
    }
}

/// Origin classification of an order. Only internal branch-to-branch
/// transfers flow through the driver workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderType {
    Internal,
    External,
}

/// Per-destination delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
}

/// One physical tank section of the truck. Fixed at job creation and
/// read-only for the whole workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compartment {
    pub compartment_number: u32,
    pub oil_type: String,
    pub quantity_litres: f64,
}

/// Departure record stamped by the start-trip commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStart {
    pub departed_at: DateTime<Utc>,
    pub odometer_km: u32,
    #[serde(default)]
    pub photos: Vec<PhotoHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Loading proof stamped by the pickup commit at the source branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupConfirmation {
    pub confirmed_at: DateTime<Utc>,
    pub photos: Vec<PhotoHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odometer_km: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Arrival stamp for one destination. Carries no operator input beyond
/// the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalConfirmation {
    pub arrived_at: DateTime<Utc>,
}

/// Delivery proof for one destination: at least one photo plus an
/// odometer reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryConfirmation {
    pub delivered_at: DateTime<Utc>,
    pub odometer_km: u32,
    pub photos: Vec<PhotoHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Depot-return record stamped by the terminal commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepotArrival {
    pub returned_at: DateTime<Utc>,
    pub odometer_km: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_remaining_litres: Option<f64>,
    #[serde(default)]
    pub photos: Vec<PhotoHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One destination branch on the route. Membership is fixed at job
/// creation; only `status` and the confirmation fields ever change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationBranch {
    pub branch_id: String,
    pub branch_name: String,
    pub address: String,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_confirmation: Option<ArrivalConfirmation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_confirmation: Option<DeliveryConfirmation>,
}

impl DestinationBranch {
    pub fn new(branch_id: &str, branch_name: &str, address: &str) -> Self {
        Self {
            branch_id: branch_id.to_string(),
            branch_name: branch_name.to_string(),
            address: address.to_string(),
            status: DeliveryStatus::Pending,
            arrival_confirmation: None,
            delivery_confirmation: None,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

/// One internal fuel-transport assignment: a single source branch, a
/// fixed compartment load-out, and an ordered set of destination
/// branches visited in `route_order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverJob {
    pub id: String,
    pub transport_number: String,
    pub order_type: OrderType,
    pub source_branch_id: String,
    pub source_branch_name: String,
    pub compartments: Vec<Compartment>,
    pub destination_branches: Vec<DestinationBranch>,
    /// Visiting order over destination branch ids. Defaults to creation
    /// order; a route-planning commit may replace it with any permutation.
    #[serde(default)]
    pub route_order: Vec<String>,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_trip: Option<TripStart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_confirmation: Option<PickupConfirmation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depot_arrival: Option<DepotArrival>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DriverJob {
    /// Create a new internal transport job in `awaiting-start`, with
    /// `route_order` defaulting to destination creation order.
    pub fn new(
        transport_number: &str,
        source_branch_id: &str,
        source_branch_name: &str,
        compartments: Vec<Compartment>,
        destination_branches: Vec<DestinationBranch>,
    ) -> Self {
        let now = Utc::now();
        let route_order = destination_branches
            .iter()
            .map(|d| d.branch_id.clone())
            .collect();
        Self {
            id: Uuid::new_v4().to_string(),
            transport_number: transport_number.to_string(),
            order_type: OrderType::Internal,
            source_branch_id: source_branch_id.to_string(),
            source_branch_name: source_branch_name.to_string(),
            compartments,
            destination_branches,
            route_order,
            status: JobStatus::AwaitingStart,
            start_trip: None,
            pickup_confirmation: None,
            depot_arrival: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The visiting order actually in effect: `route_order` when set,
    /// destination creation order for records persisted before planning.
    pub fn effective_route(&self) -> Vec<String> {
        if self.route_order.is_empty() {
            self.destination_branches
                .iter()
                .map(|d| d.branch_id.clone())
                .collect()
        } else {
            self.route_order.clone()
        }
    }

    pub fn destination(&self, branch_id: &str) -> Option<&DestinationBranch> {
        self.destination_branches
            .iter()
            .find(|d| d.branch_id == branch_id)
    }

    pub fn destination_mut(&mut self, branch_id: &str) -> Option<&mut DestinationBranch> {
        self.destination_branches
            .iter_mut()
            .find(|d| d.branch_id == branch_id)
    }

    /// True iff every destination has been delivered. The job's coarse
    /// status is `delivered` exactly when this holds.
    pub fn all_delivered(&self) -> bool {
        self.destination_branches.iter().all(|d| d.is_delivered())
    }

    /// Check that a candidate visiting order is a permutation of exactly
    /// the destination branch ids: no additions, omissions or duplicates.
    pub fn is_route_permutation(&self, order: &[String]) -> bool {
        if order.len() != self.destination_branches.len() {
            return false;
        }
        let mut seen: Vec<&str> = Vec::with_capacity(order.len());
        for id in order {
            if seen.contains(&id.as_str()) || self.destination(id).is_none() {
                return false;
            }
            seen.push(id);
        }
        true
    }
}

/// Refueling made during the fueling phase. Append-only, linked to the
/// job by transport number, never part of job state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelingRecord {
    pub id: String,
    pub transport_number: String,
    pub station: String,
    pub quantity_litres: f64,
    pub cost: f64,
    pub photo: PhotoHandle,
    pub fueled_at: DateTime<Utc>,
}

impl FuelingRecord {
    pub fn new(
        transport_number: &str,
        station: &str,
        quantity_litres: f64,
        cost: f64,
        photo: PhotoHandle,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            transport_number: transport_number.to_string(),
            station: station.to_string(),
            quantity_litres,
            cost,
            photo,
            fueled_at: Utc::now(),
        }
    }
}

/// Aggregated trip record produced once a job reaches the terminal phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub job_id: String,
    pub transport_number: String,
    pub stops_delivered: usize,
    /// Litres hauled per oil type, summed over compartments.
    pub litres_by_oil_type: BTreeMap<String, f64>,
    pub fueling_count: usize,
    pub fueling_litres: f64,
    pub fueling_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned_at: Option<DateTime<Utc>>,
}

impl TripSummary {
    /// Aggregate a completed (or in-flight) job and its fueling records.
    pub fn from_job(job: &DriverJob, fueling: &[FuelingRecord]) -> Self {
        let mut litres_by_oil_type: BTreeMap<String, f64> = BTreeMap::new();
        for c in &job.compartments {
            *litres_by_oil_type.entry(c.oil_type.clone()).or_insert(0.0) +=
                c.quantity_litres;
        }

        let distance_km = match (&job.start_trip, &job.depot_arrival) {
            (Some(start), Some(end)) => end.odometer_km.checked_sub(start.odometer_km),
            _ => None,
        };

        Self {
            job_id: job.id.clone(),
            transport_number: job.transport_number.clone(),
            stops_delivered: job
                .destination_branches
                .iter()
                .filter(|d| d.is_delivered())
                .count(),
            litres_by_oil_type,
            fueling_count: fueling.len(),
            fueling_litres: fueling.iter().map(|r| r.quantity_litres).sum(),
            fueling_cost: fueling.iter().map(|r| r.cost).sum(),
            distance_km,
            departed_at: job.start_trip.as_ref().map(|s| s.departed_at),
            returned_at: job.depot_arrival.as_ref().map(|d| d.returned_at),
        }
    }
}
