use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::JobStatus;

/// The seven phases of the driver workflow.
///
/// A job flows forward through:
/// START_TRIP → PICKUP_CONFIRM → ROUTE_PLANNING → DELIVERY → FUELING →
/// ARRIVE_DEPOT → COMPLETED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    StartTrip,
    PickupConfirm,
    RoutePlanning,
    Delivery,
    Fueling,
    ArriveDepot,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::StartTrip => write!(f, "START_TRIP"),
            Phase::PickupConfirm => write!(f, "PICKUP_CONFIRM"),
            Phase::RoutePlanning => write!(f, "ROUTE_PLANNING"),
            Phase::Delivery => write!(f, "DELIVERY"),
            Phase::Fueling => write!(f, "FUELING"),
            Phase::ArriveDepot => write!(f, "ARRIVE_DEPOT"),
            Phase::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl Phase {
    /// The immediate successor, or `None` from the terminal phase.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::StartTrip => Some(Phase::PickupConfirm),
            Phase::PickupConfirm => Some(Phase::RoutePlanning),
            Phase::RoutePlanning => Some(Phase::Delivery),
            Phase::Delivery => Some(Phase::Fueling),
            Phase::Fueling => Some(Phase::ArriveDepot),
            Phase::ArriveDepot => Some(Phase::Completed),
            Phase::Completed => None,
        }
    }

    /// The immediate predecessor, or `None` from the first phase.
    /// Stepping back is session-only navigation; it never touches the job.
    pub fn prev(self) -> Option<Phase> {
        match self {
            Phase::StartTrip => None,
            Phase::PickupConfirm => Some(Phase::StartTrip),
            Phase::RoutePlanning => Some(Phase::PickupConfirm),
            Phase::Delivery => Some(Phase::RoutePlanning),
            Phase::Fueling => Some(Phase::Delivery),
            Phase::ArriveDepot => Some(Phase::Fueling),
            Phase::Completed => None,
        }
    }

    /// Entry resolution: the phase a fresh session starts at for a job in
    /// the given persisted status. Fueling and depot return are
    /// session-local stages past the last delivery, so a `delivered`
    /// record resumes straight at the terminal phase.
    pub fn for_status(status: JobStatus) -> Phase {
        match status {
            JobStatus::AwaitingStart => Phase::StartTrip,
            JobStatus::Departed => Phase::PickupConfirm,
            JobStatus::PickedUp => Phase::RoutePlanning,
            JobStatus::RoutePlanned | JobStatus::Delivering => Phase::Delivery,
            JobStatus::Delivered => Phase::Completed,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_order_is_total() {
        let mut phase = Phase::StartTrip;
        let mut walked = vec![phase];
        while let Some(next) = phase.next() {
            phase = next;
            walked.push(phase);
        }
        assert_eq!(
            walked,
            vec![
                Phase::StartTrip,
                Phase::PickupConfirm,
                Phase::RoutePlanning,
                Phase::Delivery,
                Phase::Fueling,
                Phase::ArriveDepot,
                Phase::Completed,
            ]
        );
        assert!(Phase::Completed.is_terminal());
    }

    #[test]
    fn prev_inverts_next() {
        let mut phase = Phase::StartTrip;
        while let Some(next) = phase.next() {
            assert_eq!(next.prev(), Some(phase));
            phase = next;
        }
        assert_eq!(Phase::StartTrip.prev(), None);
        assert_eq!(Phase::Completed.prev(), None);
    }

    #[test]
    fn entry_resolution_from_status() {
        assert_eq!(Phase::for_status(JobStatus::AwaitingStart), Phase::StartTrip);
        assert_eq!(Phase::for_status(JobStatus::Departed), Phase::PickupConfirm);
        assert_eq!(Phase::for_status(JobStatus::PickedUp), Phase::RoutePlanning);
        assert_eq!(Phase::for_status(JobStatus::RoutePlanned), Phase::Delivery);
        assert_eq!(Phase::for_status(JobStatus::Delivering), Phase::Delivery);
        assert_eq!(Phase::for_status(JobStatus::Delivered), Phase::Completed);
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::StartTrip.to_string(), "START_TRIP");
        assert_eq!(Phase::ArriveDepot.to_string(), "ARRIVE_DEPOT");
    }
}
