//! Admission control: sliding window quotas with progressive blocking.

mod backend;
mod clock;
mod controller;
mod identity;
mod penalty;
mod policy;
mod router;
pub mod sweeper;
mod window;

pub use backend::AdmissionBackend;
pub use clock::{ClockSource, ManualClock, MonotonicClock};
pub use controller::{
    AdmissionController, Decision, DenyReason, IdentitySnapshot, DEFAULT_MAX_TRACKED_IDENTITIES,
};
pub use identity::ClientIdentity;
pub use penalty::{BlockState, EscalationCurve, ProgressiveBlockPolicy};
pub use policy::EndpointPolicy;
pub use router::{endpoint_key, EndpointPolicyRouter, FALLBACK_ENDPOINT};
pub use sweeper::SweeperHandle;
pub use window::WindowCounter;
