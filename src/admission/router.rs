//! Endpoint to controller routing.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use super::controller::{AdmissionController, Decision};
use super::policy::EndpointPolicy;
use crate::config::AdmissionConfig;
use crate::error::Result;

/// Name the fallback controller reports in logs.
pub const FALLBACK_ENDPOINT: &str = "default";

/// Canonical form of an endpoint name: names are matched case-insensitively.
pub fn endpoint_key(endpoint: &str) -> Cow<'_, str> {
    if endpoint.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(endpoint.to_ascii_lowercase())
    } else {
        Cow::Borrowed(endpoint)
    }
}

/// Maps endpoint names to their admission controllers.
///
/// Built once at startup. Endpoints without an explicit policy share the
/// fallback controller, which is permissive unless a default policy is
/// configured.
#[derive(Debug)]
pub struct EndpointPolicyRouter {
    /// Controllers for explicitly configured endpoints
    controllers: BTreeMap<String, Arc<AdmissionController>>,
    /// Controller for everything else
    fallback: Arc<AdmissionController>,
}

impl EndpointPolicyRouter {
    /// Create a router whose unconfigured endpoints use `fallback`.
    pub fn new(fallback: AdmissionController) -> Self {
        Self {
            controllers: BTreeMap::new(),
            fallback: Arc::new(fallback),
        }
    }

    /// Create a router that admits everything on unconfigured endpoints.
    pub fn permissive() -> Self {
        Self::new(AdmissionController::permissive(FALLBACK_ENDPOINT))
    }

    /// Build the routing table from configuration, validating every policy.
    pub fn from_config(config: &AdmissionConfig) -> Result<Self> {
        config.validate()?;

        let fallback = match &config.default_policy {
            Some(policy) => AdmissionController::new(FALLBACK_ENDPOINT, policy.clone())
                .with_max_tracked(config.max_tracked_identities),
            None => AdmissionController::permissive(FALLBACK_ENDPOINT),
        };

        let mut router = Self::new(fallback);
        for (endpoint, policy) in &config.endpoints {
            router.insert(
                AdmissionController::new(endpoint.as_str(), policy.clone())
                    .with_max_tracked(config.max_tracked_identities),
            );
        }

        info!(
            endpoints = router.controllers.len(),
            fallback_permissive = router.fallback.is_permissive(),
            "Endpoint policies loaded"
        );
        Ok(router)
    }

    /// Add a controller enforcing `policy` on `endpoint`.
    pub fn with_endpoint(mut self, endpoint: &str, policy: EndpointPolicy) -> Self {
        self.insert(AdmissionController::new(endpoint, policy));
        self
    }

    /// Register a controller under its endpoint name, replacing any previous
    /// one with the same name in any case.
    pub fn insert(&mut self, controller: AdmissionController) {
        debug!(
            endpoint = %controller.endpoint(),
            policy = ?controller.policy(),
            "Registering admission controller"
        );
        self.controllers.insert(
            endpoint_key(controller.endpoint()).into_owned(),
            Arc::new(controller),
        );
    }

    /// The controller responsible for `endpoint`.
    pub fn route(&self, endpoint: &str) -> &Arc<AdmissionController> {
        self.controllers
            .get(endpoint_key(endpoint).as_ref())
            .unwrap_or(&self.fallback)
    }

    /// Admit a request from `identity` to `endpoint` at `now`.
    pub fn admit(&self, endpoint: &str, identity: &str, now: Instant) -> Decision {
        self.route(endpoint).admit(identity, now)
    }

    /// Names of explicitly configured endpoints, in order.
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(String::as_str)
    }

    /// The controller used for unconfigured endpoints.
    pub fn fallback(&self) -> &Arc<AdmissionController> {
        &self.fallback
    }

    /// Sweep idle identities from every controller.
    pub fn sweep(&self, now: Instant) -> usize {
        self.controllers
            .values()
            .chain(std::iter::once(&self.fallback))
            .map(|controller| controller.sweep(now))
            .sum()
    }

    /// Identities tracked across all controllers.
    pub fn tracked_identities(&self) -> usize {
        self.controllers
            .values()
            .chain(std::iter::once(&self.fallback))
            .map(|controller| controller.tracked_identities())
            .sum()
    }
}

impl Default for EndpointPolicyRouter {
    fn default() -> Self {
        Self::permissive()
    }
}
