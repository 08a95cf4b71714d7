//! Workflow session and the per-phase commit commands.
//!
//! A [`Session`] is the explicit, serializable screen state of one driver
//! working one job: which phase is active, which stop the delivery cursor
//! points at and whether the driver has arrived there. It is re-derivable
//! from the persisted job, so a session can be resumed after a restart
//! without replaying earlier phases.
//!
//! [`DriverWorkflow`] pairs a session with an injected [`JobStore`] and
//! exposes one validating commit per phase. Every commit follows the same
//! discipline: validate the form, mutate a local copy of the job, persist
//! the full record, then advance the in-memory session. A failed
//! validation leaves both the store and the session untouched.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{TankflowError, ValidationError};
use crate::photo::PhotoHandle;
use crate::store::JobStore;

use super::job::{
    ArrivalConfirmation, DeliveryConfirmation, DeliveryStatus, DepotArrival, DestinationBranch,
    DriverJob, FuelingRecord, JobStatus, PickupConfirmation, TripStart, TripSummary,
};
use super::phase::Phase;

/// Sub-state of the destination currently under the delivery cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopState {
    NotArrived,
    Arrived,
}

/// Serializable state of one in-progress workflow session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub job_id: String,
    pub phase: Phase,
    /// Index into the effective route while in the delivery phase.
    pub cursor: usize,
    pub stop: StopState,
}

impl Session {
    /// Derive a session from a persisted job.
    ///
    /// The phase comes from the coarse status, the cursor is the first
    /// undelivered destination in route order, and the stop sub-state is
    /// `Arrived` when that destination already carries an arrival stamp.
    /// Destination membership is fixed and non-empty at creation, so an
    /// empty destination set or a `route_order` that is not a permutation
    /// of the destination ids is a data-integrity impossibility and fails
    /// the resume.
    pub fn resume(job: &DriverJob) -> Result<Self, TankflowError> {
        if job.destination_branches.is_empty() {
            return Err(TankflowError::NoDestinations(job.id.clone()));
        }
        if !job.route_order.is_empty() && !job.is_route_permutation(&job.route_order) {
            return Err(TankflowError::RouteIntegrity(job.id.clone()));
        }

        let route = job.effective_route();
        let cursor = route
            .iter()
            .position(|id| job.destination(id).is_some_and(|d| !d.is_delivered()))
            .unwrap_or(route.len());

        let mut phase = Phase::for_status(job.status);
        if phase == Phase::Delivery && job.all_delivered() {
            // Every stop is done; the loop has nothing left, continue at
            // fueling.
            phase = Phase::Fueling;
        }

        let stop = if phase == Phase::Delivery
            && route
                .get(cursor)
                .and_then(|id| job.destination(id))
                .is_some_and(|d| d.arrival_confirmation.is_some())
        {
            StopState::Arrived
        } else {
            StopState::NotArrived
        };

        Ok(Self {
            job_id: job.id.clone(),
            phase,
            cursor,
            stop,
        })
    }
}

/// Commit thresholds, sourced from configuration.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    pub min_delivery_photos: usize,
    pub odometer_max_km: u32,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_delivery_photos: 1,
            odometer_max_km: 2_000_000,
        }
    }
}

/// Operator inputs for the start-trip commit.
#[derive(Debug, Default, Clone)]
pub struct StartTripForm {
    pub odometer_km: Option<String>,
    pub photos: Vec<PhotoHandle>,
    pub notes: Option<String>,
}

/// Operator inputs for the pickup commit at the source branch.
#[derive(Debug, Default, Clone)]
pub struct PickupForm {
    pub photos: Vec<PhotoHandle>,
    pub odometer_km: Option<String>,
    pub notes: Option<String>,
}

/// Operator inputs for one destination delivery commit.
#[derive(Debug, Default, Clone)]
pub struct DeliveryForm {
    pub odometer_km: Option<String>,
    pub photos: Vec<PhotoHandle>,
    pub notes: Option<String>,
}

/// Operator inputs for one fueling record.
#[derive(Debug, Default, Clone)]
pub struct FuelingForm {
    pub station: Option<String>,
    pub quantity_litres: Option<String>,
    pub cost: Option<String>,
    pub photo: Option<PhotoHandle>,
}

/// Operator inputs for the depot-return commit.
#[derive(Debug, Default, Clone)]
pub struct DepotForm {
    pub odometer_km: Option<String>,
    pub fuel_remaining_litres: Option<String>,
    pub photos: Vec<PhotoHandle>,
    pub notes: Option<String>,
}

fn require_text(field: &'static str, value: &Option<String>) -> Result<String, ValidationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(ValidationError::MissingField(field))
}

fn require_u32(field: &'static str, value: &Option<String>) -> Result<u32, ValidationError> {
    let raw = require_text(field, value)?;
    raw.parse::<u32>()
        .map_err(|_| ValidationError::NotNumeric { field, value: raw })
}

fn require_f64(field: &'static str, value: &Option<String>) -> Result<f64, ValidationError> {
    let raw = require_text(field, value)?;
    raw.parse::<f64>()
        .map_err(|_| ValidationError::NotNumeric { field, value: raw })
}

fn optional_u32(field: &'static str, value: &Option<String>) -> Result<Option<u32>, ValidationError> {
    match value.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ValidationError::NotNumeric { field, value: raw.to_string() }),
    }
}

fn optional_f64(field: &'static str, value: &Option<String>) -> Result<Option<f64>, ValidationError> {
    match value.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ValidationError::NotNumeric { field, value: raw.to_string() }),
    }
}

struct Active {
    session: Session,
    job: DriverJob,
}

/// Drives one selected job through the phase state machine against an
/// injected store.
pub struct DriverWorkflow<S: JobStore> {
    store: S,
    rules: ValidationRules,
    active: Option<Active>,
}

impl<S: JobStore> DriverWorkflow<S> {
    pub fn new(store: S) -> Self {
        Self::with_rules(store, ValidationRules::default())
    }

    pub fn with_rules(store: S, rules: ValidationRules) -> Self {
        Self {
            store,
            rules,
            active: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self) -> Option<&Session> {
        self.active.as_ref().map(|a| &a.session)
    }

    /// The in-memory snapshot of the selected job.
    pub fn job(&self) -> Result<&DriverJob, TankflowError> {
        self.active
            .as_ref()
            .map(|a| &a.job)
            .ok_or(TankflowError::NoActiveJob)
    }

    /// Select the most recent pending internal job and resume a session
    /// at the phase its status dictates.
    pub fn select_latest(&mut self) -> Result<&DriverJob, TankflowError> {
        let job = self
            .store
            .pending_internal_jobs()?
            .into_iter()
            .next()
            .ok_or(TankflowError::NoJobs)?;
        self.activate(job)
    }

    /// Select one job by id.
    pub fn select(&mut self, job_id: &str) -> Result<&DriverJob, TankflowError> {
        let job = self.store.job(job_id)?;
        self.activate(job)
    }

    fn activate(&mut self, job: DriverJob) -> Result<&DriverJob, TankflowError> {
        let session = Session::resume(&job)?;
        self.active = Some(Active { session, job });
        self.job()
    }

    fn require_phase(&self, expected: Phase, command: &'static str) -> Result<(), TankflowError> {
        let session = self.session().ok_or(TankflowError::NoActiveJob)?;
        if session.phase != expected {
            return Err(TankflowError::PhaseMismatch {
                command,
                phase: session.phase,
            });
        }
        Ok(())
    }

    fn check_odometer(&self, reading: u32) -> Result<(), ValidationError> {
        if reading > self.rules.odometer_max_km {
            return Err(ValidationError::OdometerOutOfRange {
                reading,
                max: self.rules.odometer_max_km,
            });
        }
        Ok(())
    }

    /// Branch id under the delivery cursor.
    fn current_branch_id(&self) -> Result<String, TankflowError> {
        let active = self.active.as_ref().ok_or(TankflowError::NoActiveJob)?;
        active
            .job
            .effective_route()
            .get(active.session.cursor)
            .cloned()
            .ok_or_else(|| TankflowError::RouteIntegrity(active.job.id.clone()))
    }

    /// The destination currently under the cursor.
    pub fn current_stop(&self) -> Result<&DestinationBranch, TankflowError> {
        let branch_id = self.current_branch_id()?;
        let job = self.job()?;
        job.destination(&branch_id)
            .ok_or_else(|| TankflowError::RouteIntegrity(job.id.clone()))
    }

    /// Persist `job` and advance the session to `phase`. The store write
    /// happens first, so a failed write leaves the session where it was.
    fn persist(&mut self, job: DriverJob, phase: Phase) -> Result<(), TankflowError> {
        self.store.update_job(&job.id, &job)?;
        if let Some(active) = self.active.as_mut() {
            active.job = job;
            active.session.phase = phase;
        }
        Ok(())
    }

    /// Phase 1 commit: stamp the departure record and leave the source
    /// region. Requires a numeric odometer reading.
    pub fn commit_start_trip(&mut self, form: StartTripForm) -> Result<(), TankflowError> {
        self.require_phase(Phase::StartTrip, "start-trip")?;
        let odometer_km = require_u32("odometer_km", &form.odometer_km)?;
        self.check_odometer(odometer_km)?;

        let mut job = self.job()?.clone();
        job.start_trip = Some(TripStart {
            departed_at: Utc::now(),
            odometer_km,
            photos: form.photos,
            notes: form.notes,
        });
        job.status = JobStatus::Departed;
        job.updated_at = Utc::now();
        self.persist(job, Phase::PickupConfirm)
    }

    /// Phase 2 commit: confirm loading at the source branch. Requires at
    /// least one loading-proof photo.
    pub fn commit_pickup(&mut self, form: PickupForm) -> Result<(), TankflowError> {
        self.require_phase(Phase::PickupConfirm, "pickup-confirm")?;
        if form.photos.is_empty() {
            return Err(ValidationError::NoPhotos { required: 1, got: 0 }.into());
        }
        let odometer_km = optional_u32("odometer_km", &form.odometer_km)?;
        if let Some(reading) = odometer_km {
            self.check_odometer(reading)?;
        }

        let mut job = self.job()?.clone();
        job.pickup_confirmation = Some(PickupConfirmation {
            confirmed_at: Utc::now(),
            photos: form.photos,
            odometer_km,
            notes: form.notes,
        });
        job.status = JobStatus::PickedUp;
        job.updated_at = Utc::now();
        self.persist(job, Phase::RoutePlanning)
    }

    /// Phase 3 commit: fix the visiting order. `order` must be a
    /// permutation of the destination branch ids, and the route cannot be
    /// re-planned once any destination carries delivery activity.
    pub fn commit_route(&mut self, order: Vec<String>) -> Result<(), TankflowError> {
        self.require_phase(Phase::RoutePlanning, "route-planning")?;
        let job = self.job()?;
        if job
            .destination_branches
            .iter()
            .any(|d| d.arrival_confirmation.is_some() || d.delivery_confirmation.is_some())
        {
            return Err(ValidationError::RouteFrozen.into());
        }
        if !job.is_route_permutation(&order) {
            return Err(ValidationError::RouteNotPermutation.into());
        }

        let mut job = job.clone();
        job.route_order = order;
        job.status = JobStatus::RoutePlanned;
        job.updated_at = Utc::now();
        self.persist(job, Phase::Delivery)?;
        if let Some(active) = self.active.as_mut() {
            active.session.cursor = 0;
            active.session.stop = StopState::NotArrived;
        }
        Ok(())
    }

    /// Delivery loop, step 1: stamp arrival at the stop under the cursor.
    /// No operator input beyond the action itself; the destination status
    /// stays `pending` until the delivery commit.
    pub fn commit_arrival(&mut self) -> Result<(), TankflowError> {
        self.require_phase(Phase::Delivery, "confirm-arrival")?;
        let session = self.session().ok_or(TankflowError::NoActiveJob)?;
        if session.stop == StopState::Arrived {
            return Err(ValidationError::AlreadyArrived.into());
        }
        let branch_id = self.current_branch_id()?;

        let mut job = self.job()?.clone();
        if let Some(dest) = job.destination_mut(&branch_id) {
            dest.arrival_confirmation = Some(ArrivalConfirmation {
                arrived_at: Utc::now(),
            });
        }
        job.status = JobStatus::Delivering;
        job.updated_at = Utc::now();
        self.persist(job, Phase::Delivery)?;
        if let Some(active) = self.active.as_mut() {
            active.session.stop = StopState::Arrived;
        }
        Ok(())
    }

    /// Delivery loop, step 2: confirm the delivery at the arrived stop.
    /// Requires the configured number of proof photos and a numeric
    /// odometer reading; only succeeds after [`commit_arrival`].
    ///
    /// When undelivered stops remain the cursor moves to the next one in
    /// route order; after the last stop the job status becomes
    /// `delivered` and the phase advances to fueling.
    pub fn commit_delivery(&mut self, form: DeliveryForm) -> Result<(), TankflowError> {
        self.require_phase(Phase::Delivery, "commit-delivery")?;
        let session = self.session().ok_or(TankflowError::NoActiveJob)?;
        if session.stop != StopState::Arrived {
            return Err(ValidationError::NotArrived.into());
        }
        if form.photos.len() < self.rules.min_delivery_photos {
            return Err(ValidationError::NoPhotos {
                required: self.rules.min_delivery_photos,
                got: form.photos.len(),
            }
            .into());
        }
        let odometer_km = require_u32("odometer_km", &form.odometer_km)?;
        self.check_odometer(odometer_km)?;
        let branch_id = self.current_branch_id()?;

        let mut job = self.job()?.clone();
        if let Some(dest) = job.destination_mut(&branch_id) {
            dest.delivery_confirmation = Some(DeliveryConfirmation {
                delivered_at: Utc::now(),
                odometer_km,
                photos: form.photos,
                notes: form.notes,
            });
            dest.status = DeliveryStatus::Delivered;
        }
        job.updated_at = Utc::now();

        let route = job.effective_route();
        let next = route
            .iter()
            .position(|id| job.destination(id).is_some_and(|d| !d.is_delivered()));

        match next {
            Some(idx) => {
                job.status = JobStatus::Delivering;
                self.persist(job, Phase::Delivery)?;
                if let Some(active) = self.active.as_mut() {
                    active.session.cursor = idx;
                    active.session.stop = StopState::NotArrived;
                }
            }
            None => {
                job.status = JobStatus::Delivered;
                let past_end = route.len();
                self.persist(job, Phase::Fueling)?;
                if let Some(active) = self.active.as_mut() {
                    active.session.cursor = past_end;
                    active.session.stop = StopState::NotArrived;
                }
            }
        }
        Ok(())
    }

    /// Fueling phase: append one fueling record. Does not advance the
    /// phase and does not touch the job record.
    pub fn add_fueling_record(&mut self, form: FuelingForm) -> Result<FuelingRecord, TankflowError> {
        self.require_phase(Phase::Fueling, "add-fueling-record")?;
        let station = require_text("station", &form.station)?;
        let quantity_litres = require_f64("quantity_litres", &form.quantity_litres)?;
        let cost = require_f64("cost", &form.cost)?;
        let photo = form.photo.ok_or(ValidationError::MissingField("photo"))?;

        let (job_id, transport_number) = {
            let job = self.job()?;
            (job.id.clone(), job.transport_number.clone())
        };
        let record = FuelingRecord::new(&transport_number, &station, quantity_litres, cost, photo);
        self.store.add_fueling_record(&job_id, &record)?;
        Ok(record)
    }

    /// Leave the fueling phase. Valid with zero records appended.
    pub fn proceed_to_depot(&mut self) -> Result<(), TankflowError> {
        self.require_phase(Phase::Fueling, "proceed-to-depot")?;
        if let Some(active) = self.active.as_mut() {
            active.session.phase = Phase::ArriveDepot;
        }
        Ok(())
    }

    /// Terminal commit: stamp the depot-return record. Requires a numeric
    /// odometer reading; fuel remaining, photos and notes are optional.
    pub fn commit_depot_return(&mut self, form: DepotForm) -> Result<(), TankflowError> {
        self.require_phase(Phase::ArriveDepot, "arrive-depot")?;
        let odometer_km = require_u32("odometer_km", &form.odometer_km)?;
        self.check_odometer(odometer_km)?;
        let fuel_remaining_litres =
            optional_f64("fuel_remaining_litres", &form.fuel_remaining_litres)?;

        let mut job = self.job()?.clone();
        job.depot_arrival = Some(DepotArrival {
            returned_at: Utc::now(),
            odometer_km,
            fuel_remaining_litres,
            photos: form.photos,
            notes: form.notes,
        });
        job.status = JobStatus::Delivered;
        job.updated_at = Utc::now();
        self.persist(job, Phase::Completed)
    }

    /// Step the session back to the previous phase. Navigation only: the
    /// persisted job is never touched, and the terminal phase has no way
    /// back.
    pub fn go_back(&mut self) -> Result<Phase, TankflowError> {
        let session = self.session().ok_or(TankflowError::NoActiveJob)?;
        let prev = session.phase.prev().ok_or(TankflowError::PhaseMismatch {
            command: "go-back",
            phase: session.phase,
        })?;
        if prev == Phase::Delivery && self.job()?.all_delivered() {
            // The loop is exhausted; there is no stop to navigate back to,
            // and the depot return must still be reachable going forward.
            return Err(TankflowError::PhaseMismatch {
                command: "go-back",
                phase: session.phase,
            });
        }
        if let Some(active) = self.active.as_mut() {
            active.session.phase = prev;
            if prev == Phase::Delivery {
                // Re-derive the cursor when stepping back into the loop.
                let route = active.job.effective_route();
                active.session.cursor = route
                    .iter()
                    .position(|id| active.job.destination(id).is_some_and(|d| !d.is_delivered()))
                    .unwrap_or(route.len());
                active.session.stop = StopState::NotArrived;
            }
        }
        Ok(prev)
    }

    /// Aggregate the active job and its fueling records.
    pub fn summary(&self) -> Result<TripSummary, TankflowError> {
        let job = self.job()?;
        let fueling = self.store.fueling_records(&job.id)?;
        Ok(TripSummary::from_job(job, &fueling))
    }

    /// Release the completed job so a new one can be selected. Only valid
    /// in the terminal phase.
    pub fn release(&mut self) -> Result<(), TankflowError> {
        self.require_phase(Phase::Completed, "release-job")?;
        self.active = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::workflow::job::tests::sample_job;

    fn photo() -> PhotoHandle {
        PhotoHandle::synthetic("proof.jpg")
    }

    fn workflow() -> (DriverWorkflow<MemoryStore>, String) {
        let mut store = MemoryStore::new();
        let job = sample_job();
        let id = job.id.clone();
        store.insert_job(job);
        let mut wf = DriverWorkflow::new(store);
        wf.select_latest().unwrap();
        (wf, id)
    }

    fn start_form() -> StartTripForm {
        StartTripForm {
            odometer_km: Some("120000".into()),
            ..Default::default()
        }
    }

    fn delivery_form() -> DeliveryForm {
        DeliveryForm {
            odometer_km: Some("120050".into()),
            photos: vec![photo()],
            notes: None,
        }
    }

    fn drive_to_delivery(wf: &mut DriverWorkflow<MemoryStore>, order: Vec<&str>) {
        wf.commit_start_trip(start_form()).unwrap();
        wf.commit_pickup(PickupForm {
            photos: vec![photo()],
            ..Default::default()
        })
        .unwrap();
        wf.commit_route(order.into_iter().map(String::from).collect())
            .unwrap();
    }

    fn deliver_current(wf: &mut DriverWorkflow<MemoryStore>) {
        wf.commit_arrival().unwrap();
        wf.commit_delivery(delivery_form()).unwrap();
    }

    #[test]
    fn happy_path_walks_all_phases() {
        let (mut wf, _) = workflow();
        assert_eq!(wf.session().unwrap().phase, Phase::StartTrip);

        wf.commit_start_trip(start_form()).unwrap();
        assert_eq!(wf.session().unwrap().phase, Phase::PickupConfirm);
        assert_eq!(wf.job().unwrap().status, JobStatus::Departed);

        wf.commit_pickup(PickupForm {
            photos: vec![photo()],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(wf.session().unwrap().phase, Phase::RoutePlanning);
        assert_eq!(wf.job().unwrap().status, JobStatus::PickedUp);

        wf.commit_route(vec!["BR-B".into(), "BR-A".into(), "BR-C".into()])
            .unwrap();
        assert_eq!(wf.session().unwrap().phase, Phase::Delivery);
        assert_eq!(wf.job().unwrap().status, JobStatus::RoutePlanned);

        for _ in 0..3 {
            deliver_current(&mut wf);
        }
        assert_eq!(wf.session().unwrap().phase, Phase::Fueling);
        assert_eq!(wf.job().unwrap().status, JobStatus::Delivered);
        assert!(wf.job().unwrap().all_delivered());

        wf.proceed_to_depot().unwrap();
        wf.commit_depot_return(DepotForm {
            odometer_km: Some("120345".into()),
            fuel_remaining_litres: Some("60".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(wf.session().unwrap().phase, Phase::Completed);
        assert_eq!(wf.job().unwrap().status, JobStatus::Delivered);
        assert!(wf.job().unwrap().depot_arrival.is_some());

        wf.release().unwrap();
        assert!(wf.session().is_none());
    }

    #[test]
    fn start_trip_requires_numeric_odometer() {
        let (mut wf, id) = workflow();

        let err = wf.commit_start_trip(StartTripForm::default()).unwrap_err();
        assert!(matches!(
            err,
            TankflowError::Validation(ValidationError::MissingField("odometer_km"))
        ));

        let err = wf
            .commit_start_trip(StartTripForm {
                odometer_km: Some("12k".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            TankflowError::Validation(ValidationError::NotNumeric { .. })
        ));

        // Failed commits never reach the store and never move the phase.
        assert_eq!(wf.session().unwrap().phase, Phase::StartTrip);
        let stored = wf.store().job(&id).unwrap();
        assert_eq!(stored.status, JobStatus::AwaitingStart);
        assert!(stored.start_trip.is_none());
    }

    #[test]
    fn odometer_above_configured_max_is_rejected() {
        let mut store = MemoryStore::new();
        store.insert_job(sample_job());
        let mut wf = DriverWorkflow::with_rules(
            store,
            ValidationRules {
                min_delivery_photos: 1,
                odometer_max_km: 500_000,
            },
        );
        wf.select_latest().unwrap();

        let err = wf
            .commit_start_trip(StartTripForm {
                odometer_km: Some("600000".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            TankflowError::Validation(ValidationError::OdometerOutOfRange { .. })
        ));
    }

    #[test]
    fn pickup_requires_photo_proof() {
        let (mut wf, _) = workflow();
        wf.commit_start_trip(start_form()).unwrap();

        let err = wf.commit_pickup(PickupForm::default()).unwrap_err();
        assert!(matches!(
            err,
            TankflowError::Validation(ValidationError::NoPhotos { .. })
        ));
        assert_eq!(wf.session().unwrap().phase, Phase::PickupConfirm);
    }

    #[test]
    fn route_commit_rejects_non_permutations() {
        let (mut wf, _) = workflow();
        wf.commit_start_trip(start_form()).unwrap();
        wf.commit_pickup(PickupForm {
            photos: vec![photo()],
            ..Default::default()
        })
        .unwrap();

        for bad in [
            vec!["BR-A".to_string(), "BR-B".to_string()],
            vec!["BR-A".to_string(), "BR-A".to_string(), "BR-B".to_string()],
            vec!["BR-A".to_string(), "BR-B".to_string(), "BR-X".to_string()],
        ] {
            let err = wf.commit_route(bad).unwrap_err();
            assert!(matches!(
                err,
                TankflowError::Validation(ValidationError::RouteNotPermutation)
            ));
        }
        assert_eq!(wf.session().unwrap().phase, Phase::RoutePlanning);

        wf.commit_route(vec!["BR-C".into(), "BR-A".into(), "BR-B".into()])
            .unwrap();
        assert_eq!(wf.job().unwrap().route_order, vec!["BR-C", "BR-A", "BR-B"]);
    }

    #[test]
    fn route_is_frozen_once_delivery_begins() {
        let (mut wf, _) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-A", "BR-C", "BR-B"]);
        wf.commit_arrival().unwrap();

        // Navigate back to route planning; re-planning must be refused.
        wf.go_back().unwrap();
        let err = wf
            .commit_route(vec!["BR-B".into(), "BR-A".into(), "BR-C".into()])
            .unwrap_err();
        assert!(matches!(
            err,
            TankflowError::Validation(ValidationError::RouteFrozen)
        ));
    }

    #[test]
    fn delivery_requires_arrival_first() {
        let (mut wf, _) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-B", "BR-A", "BR-C"]);

        let err = wf.commit_delivery(delivery_form()).unwrap_err();
        assert!(matches!(
            err,
            TankflowError::Validation(ValidationError::NotArrived)
        ));
        assert_eq!(wf.current_stop().unwrap().status, DeliveryStatus::Pending);
    }

    #[test]
    fn delivery_without_photos_is_rejected_and_stop_unchanged() {
        // Scenario B: valid odometer, zero photos.
        let (mut wf, id) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-B", "BR-A", "BR-C"]);
        wf.commit_arrival().unwrap();

        let err = wf
            .commit_delivery(DeliveryForm {
                odometer_km: Some("120050".into()),
                photos: vec![],
                notes: None,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            TankflowError::Validation(ValidationError::NoPhotos { required: 1, got: 0 })
        ));

        let stored = wf.store().job(&id).unwrap();
        assert_eq!(
            stored.destination("BR-B").unwrap().status,
            DeliveryStatus::Pending
        );
        assert!(stored.destination("BR-B").unwrap().delivery_confirmation.is_none());
        // The retry succeeds without re-arriving.
        wf.commit_delivery(delivery_form()).unwrap();
    }

    #[test]
    fn arrival_cannot_be_stamped_twice() {
        let (mut wf, _) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-B", "BR-A", "BR-C"]);
        wf.commit_arrival().unwrap();
        let err = wf.commit_arrival().unwrap_err();
        assert!(matches!(
            err,
            TankflowError::Validation(ValidationError::AlreadyArrived)
        ));
    }

    #[test]
    fn delivery_visits_stops_in_route_order() {
        let (mut wf, _) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-A", "BR-C", "BR-B"]);

        assert_eq!(wf.current_stop().unwrap().branch_id, "BR-A");
        deliver_current(&mut wf);
        assert_eq!(wf.current_stop().unwrap().branch_id, "BR-C");
        assert_eq!(wf.job().unwrap().status, JobStatus::Delivering);
        deliver_current(&mut wf);
        assert_eq!(wf.current_stop().unwrap().branch_id, "BR-B");
        deliver_current(&mut wf);
        assert_eq!(wf.session().unwrap().phase, Phase::Fueling);
    }

    #[test]
    fn status_is_delivered_iff_all_stops_delivered() {
        // P4 in both directions, observed along the way.
        let (mut wf, _) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-B", "BR-A", "BR-C"]);

        deliver_current(&mut wf);
        assert_ne!(wf.job().unwrap().status, JobStatus::Delivered);
        assert!(!wf.job().unwrap().all_delivered());

        deliver_current(&mut wf);
        deliver_current(&mut wf);
        assert_eq!(wf.job().unwrap().status, JobStatus::Delivered);
        assert!(wf.job().unwrap().all_delivered());
    }

    #[test]
    fn resume_selects_first_undelivered_in_route_order() {
        // Scenario A: creation order [B, A, C], route [A, C, B]; deliver
        // A and C, resume must select B.
        let (mut wf, id) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-A", "BR-C", "BR-B"]);
        deliver_current(&mut wf); // BR-A
        deliver_current(&mut wf); // BR-C

        let stored = wf.store().job(&id).unwrap();
        let session = Session::resume(&stored).unwrap();
        assert_eq!(session.phase, Phase::Delivery);
        assert_eq!(session.cursor, 2);
        assert_eq!(stored.effective_route()[session.cursor], "BR-B");
        assert_eq!(session.stop, StopState::NotArrived);
    }

    #[test]
    fn resume_restores_arrived_sub_state() {
        let (mut wf, id) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-B", "BR-A", "BR-C"]);
        wf.commit_arrival().unwrap();

        let stored = wf.store().job(&id).unwrap();
        let session = Session::resume(&stored).unwrap();
        assert_eq!(session.phase, Phase::Delivery);
        assert_eq!(session.cursor, 0);
        assert_eq!(session.stop, StopState::Arrived);
    }

    #[test]
    fn resume_maps_each_status_to_its_phase() {
        let (mut wf, id) = workflow();

        let resumed = |wf: &DriverWorkflow<MemoryStore>| {
            Session::resume(&wf.store().job(&id).unwrap()).unwrap().phase
        };

        assert_eq!(resumed(&wf), Phase::StartTrip);
        wf.commit_start_trip(start_form()).unwrap();
        assert_eq!(resumed(&wf), Phase::PickupConfirm);
        wf.commit_pickup(PickupForm {
            photos: vec![photo()],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(resumed(&wf), Phase::RoutePlanning);
        wf.commit_route(vec!["BR-B".into(), "BR-A".into(), "BR-C".into()])
            .unwrap();
        assert_eq!(resumed(&wf), Phase::Delivery);
    }

    #[test]
    fn resume_rejects_corrupt_route_order() {
        let mut job = sample_job();
        job.route_order = vec!["BR-A".into(), "BR-A".into(), "BR-C".into()];
        let err = Session::resume(&job).unwrap_err();
        assert!(matches!(err, TankflowError::RouteIntegrity(_)));
    }

    #[test]
    fn resume_accepts_unplanned_empty_route() {
        let mut job = sample_job();
        job.route_order.clear();
        let session = Session::resume(&job).unwrap();
        assert_eq!(session.cursor, 0);
    }

    #[test]
    fn fueling_is_optional_and_skippable() {
        // Scenario C: zero records, proceed advances without error.
        let (mut wf, id) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-B", "BR-A", "BR-C"]);
        for _ in 0..3 {
            deliver_current(&mut wf);
        }

        assert_eq!(wf.session().unwrap().phase, Phase::Fueling);
        wf.proceed_to_depot().unwrap();
        assert_eq!(wf.session().unwrap().phase, Phase::ArriveDepot);
        assert!(wf.store().fueling_records(&id).unwrap().is_empty());
    }

    #[test]
    fn fueling_records_append_without_touching_the_job() {
        let (mut wf, id) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-B", "BR-A", "BR-C"]);
        for _ in 0..3 {
            deliver_current(&mut wf);
        }
        let before = wf.store().job(&id).unwrap();

        let record = wf
            .add_fueling_record(FuelingForm {
                station: Some("Shell North".into()),
                quantity_litres: Some("85.5".into()),
                cost: Some("140.25".into()),
                photo: Some(photo()),
            })
            .unwrap();
        assert_eq!(record.transport_number, "TRX-0042");
        assert_eq!(record.quantity_litres, 85.5);

        // Appending is phase-neutral and leaves the job record untouched.
        assert_eq!(wf.session().unwrap().phase, Phase::Fueling);
        assert_eq!(wf.store().job(&id).unwrap(), before);
        assert_eq!(wf.store().fueling_records(&id).unwrap().len(), 1);
    }

    #[test]
    fn fueling_record_validates_all_fields() {
        let (mut wf, _) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-B", "BR-A", "BR-C"]);
        for _ in 0..3 {
            deliver_current(&mut wf);
        }

        let err = wf
            .add_fueling_record(FuelingForm {
                station: Some("Shell".into()),
                quantity_litres: Some("eighty".into()),
                cost: Some("10".into()),
                photo: Some(photo()),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            TankflowError::Validation(ValidationError::NotNumeric { field: "quantity_litres", .. })
        ));

        let err = wf
            .add_fueling_record(FuelingForm {
                station: Some("Shell".into()),
                quantity_litres: Some("80".into()),
                cost: Some("10".into()),
                photo: None,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            TankflowError::Validation(ValidationError::MissingField("photo"))
        ));
    }

    #[test]
    fn depot_return_is_terminal() {
        // Scenario D.
        let (mut wf, id) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-B", "BR-A", "BR-C"]);
        for _ in 0..3 {
            deliver_current(&mut wf);
        }
        wf.proceed_to_depot().unwrap();
        wf.commit_depot_return(DepotForm {
            odometer_km: Some("120345".into()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(wf.store().job(&id).unwrap().status, JobStatus::Delivered);
        assert_eq!(wf.session().unwrap().phase, Phase::Completed);

        // Every command except release is refused now.
        assert!(matches!(
            wf.commit_arrival().unwrap_err(),
            TankflowError::PhaseMismatch { .. }
        ));
        assert!(matches!(
            wf.go_back().unwrap_err(),
            TankflowError::PhaseMismatch { command: "go-back", .. }
        ));
        assert!(matches!(
            wf.add_fueling_record(FuelingForm::default()).unwrap_err(),
            TankflowError::PhaseMismatch { .. }
        ));

        wf.release().unwrap();
        assert!(matches!(wf.job().unwrap_err(), TankflowError::NoActiveJob));
    }

    #[test]
    fn depot_return_requires_odometer() {
        let (mut wf, _) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-B", "BR-A", "BR-C"]);
        for _ in 0..3 {
            deliver_current(&mut wf);
        }
        wf.proceed_to_depot().unwrap();

        let err = wf.commit_depot_return(DepotForm::default()).unwrap_err();
        assert!(matches!(
            err,
            TankflowError::Validation(ValidationError::MissingField("odometer_km"))
        ));
        assert_eq!(wf.session().unwrap().phase, Phase::ArriveDepot);
    }

    #[test]
    fn go_back_never_mutates_the_job() {
        // P1: back-navigation is session-only.
        let (mut wf, id) = workflow();
        wf.commit_start_trip(start_form()).unwrap();
        let stored = wf.store().job(&id).unwrap();

        assert_eq!(wf.go_back().unwrap(), Phase::StartTrip);
        assert_eq!(wf.store().job(&id).unwrap(), stored);
        assert_eq!(wf.job().unwrap(), &stored);

        // No predecessor before the first phase.
        assert!(matches!(
            wf.go_back().unwrap_err(),
            TankflowError::PhaseMismatch { command: "go-back", .. }
        ));
    }

    #[test]
    fn go_back_is_refused_once_the_delivery_loop_is_exhausted() {
        let (mut wf, _) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-B", "BR-A", "BR-C"]);
        for _ in 0..3 {
            deliver_current(&mut wf);
        }
        assert_eq!(wf.session().unwrap().phase, Phase::Fueling);

        // With every stop delivered there is nothing to navigate back to;
        // the session must not be stranded in an empty delivery loop.
        let err = wf.go_back().unwrap_err();
        assert!(matches!(
            err,
            TankflowError::PhaseMismatch { command: "go-back", .. }
        ));
        assert_eq!(wf.session().unwrap().phase, Phase::Fueling);

        // The depot return stays reachable: forward through fueling, one
        // step back, forward again, then the terminal commit.
        wf.proceed_to_depot().unwrap();
        assert_eq!(wf.go_back().unwrap(), Phase::Fueling);
        wf.proceed_to_depot().unwrap();
        wf.commit_depot_return(DepotForm {
            odometer_km: Some("120345".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(wf.job().unwrap().depot_arrival.is_some());
        assert_eq!(wf.session().unwrap().phase, Phase::Completed);
    }

    #[test]
    fn jobs_without_destinations_cannot_be_selected() {
        let mut job = sample_job();
        job.destination_branches.clear();
        job.route_order.clear();

        let err = Session::resume(&job).unwrap_err();
        assert!(matches!(err, TankflowError::NoDestinations(_)));

        let mut store = MemoryStore::new();
        store.insert_job(job);
        let mut wf = DriverWorkflow::new(store);
        assert!(matches!(
            wf.select_latest().unwrap_err(),
            TankflowError::NoDestinations(_)
        ));
        assert!(wf.session().is_none());
    }

    #[test]
    fn select_by_id_resumes_that_job() {
        let mut store = MemoryStore::new();
        let target = sample_job();
        let mut newer = sample_job();
        newer.created_at = target.created_at + chrono::Duration::minutes(1);
        let target_id = target.id.clone();
        store.insert_job(target);
        store.insert_job(newer);

        let mut wf = DriverWorkflow::new(store);
        // Explicit selection wins over recency.
        assert_eq!(wf.select(&target_id).unwrap().id, target_id);
        assert_eq!(wf.session().unwrap().phase, Phase::StartTrip);

        assert!(matches!(
            wf.select("missing").unwrap_err(),
            TankflowError::JobNotFound(_)
        ));
    }

    #[test]
    fn commands_are_refused_outside_their_phase() {
        let (mut wf, _) = workflow();
        assert!(matches!(
            wf.commit_delivery(delivery_form()).unwrap_err(),
            TankflowError::PhaseMismatch { command: "commit-delivery", phase: Phase::StartTrip }
        ));
        assert!(matches!(
            wf.proceed_to_depot().unwrap_err(),
            TankflowError::PhaseMismatch { .. }
        ));
        assert!(matches!(
            wf.release().unwrap_err(),
            TankflowError::PhaseMismatch { .. }
        ));
    }

    #[test]
    fn select_latest_prefers_newest_pending_job() {
        let mut store = MemoryStore::new();
        let older = sample_job();
        let mut newer = sample_job();
        newer.created_at = older.created_at + chrono::Duration::minutes(1);
        let newer_id = newer.id.clone();
        store.insert_job(older);
        store.insert_job(newer);

        let mut wf = DriverWorkflow::new(store);
        assert_eq!(wf.select_latest().unwrap().id, newer_id);
    }

    #[test]
    fn select_latest_with_no_jobs() {
        let mut wf = DriverWorkflow::new(MemoryStore::new());
        assert!(matches!(wf.select_latest().unwrap_err(), TankflowError::NoJobs));
    }

    #[test]
    fn commands_require_a_selected_job() {
        let mut wf = DriverWorkflow::new(MemoryStore::new());
        assert!(matches!(
            wf.commit_start_trip(StartTripForm::default()).unwrap_err(),
            TankflowError::NoActiveJob
        ));
    }

    #[test]
    fn session_serialization_roundtrip() {
        let job = sample_job();
        let session = Session::resume(&job).unwrap();
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"phase\":\"start-trip\""));
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn summary_reflects_trip_and_fueling() {
        let (mut wf, _) = workflow();
        drive_to_delivery(&mut wf, vec!["BR-B", "BR-A", "BR-C"]);
        for _ in 0..3 {
            deliver_current(&mut wf);
        }
        wf.add_fueling_record(FuelingForm {
            station: Some("Shell North".into()),
            quantity_litres: Some("90".into()),
            cost: Some("150".into()),
            photo: Some(photo()),
        })
        .unwrap();
        wf.proceed_to_depot().unwrap();
        wf.commit_depot_return(DepotForm {
            odometer_km: Some("120345".into()),
            ..Default::default()
        })
        .unwrap();

        let summary = wf.summary().unwrap();
        assert_eq!(summary.stops_delivered, 3);
        assert_eq!(summary.fueling_count, 1);
        assert_eq!(summary.fueling_litres, 90.0);
        assert_eq!(summary.distance_km, Some(345));
    }
}
