//! Admission backend trait for abstracting in-process and shared implementations.

use std::time::Instant;

use super::controller::Decision;
use super::router::EndpointPolicyRouter;

/// Trait for admission backends.
///
/// Request handlers depend on this trait rather than on the router, so the
/// in-process implementation can later be replaced by one backed by shared
/// state without touching call sites.
pub trait AdmissionBackend: Send + Sync {
    /// Decide whether a request from `identity` to `endpoint` may proceed.
    fn admit(&self, endpoint: &str, identity: &str, now: Instant) -> Decision;
}

impl AdmissionBackend for EndpointPolicyRouter {
    fn admit(&self, endpoint: &str, identity: &str, now: Instant) -> Decision {
        EndpointPolicyRouter::admit(self, endpoint, identity, now)
    }
}
