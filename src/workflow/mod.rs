pub mod job;
mod phase;
mod session;

pub use job::{
    Compartment, DeliveryStatus, DestinationBranch, DriverJob, FuelingRecord, JobStatus,
    OrderType, TripSummary,
};
pub use phase::Phase;
pub use session::{
    DeliveryForm, DepotForm, DriverWorkflow, FuelingForm, PickupForm, Session, StartTripForm,
    StopState, ValidationRules,
};
