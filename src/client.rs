#[cfg(any(feature = "distribution", feature = "events"))]
use crate::core::SefazError;
use crate::core::{ServiceConfig, Transport};

#[cfg(feature = "distribution")]
use crate::distribution::{self, DistributionQuery, DistributionResult};

#[cfg(feature = "events")]
use crate::events::{self, EventBatchResult, FiscalEventRequest};
#[cfg(feature = "events")]
use crate::xmldsig::CredentialProvider;

/// Configuration and transport bound together.
///
/// Holds no mutable state; one client can serve any number of calls.
#[derive(Debug, Clone)]
pub struct SefazClient<T> {
    config: ServiceConfig,
    transport: T,
    headers: Vec<(String, String)>,
}

impl<T: Transport> SefazClient<T> {
    pub fn new(config: ServiceConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            headers: Vec::new(),
        }
    }

    /// Builder: an extra HTTP header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// One distribution request, decoded and mapped.
    #[cfg(feature = "distribution")]
    pub fn distribute(&self, query: &DistributionQuery) -> Result<DistributionResult, SefazError> {
        if query.environment != self.config.environment {
            return Err(SefazError::Validation(format!(
                "query targets {:?} but the client is configured for {:?}",
                query.environment, self.config.environment
            )));
        }
        distribution::fetch(&self.transport, &self.config, query, &self.headers)
    }

    /// Sign `requests` into one batch, send it and interpret the reply.
    #[cfg(feature = "events")]
    pub fn send_events<C: CredentialProvider + ?Sized>(
        &self,
        batch_id: u64,
        requests: Vec<FiscalEventRequest>,
        credentials: &C,
    ) -> Result<EventBatchResult, SefazError> {
        if let Some(event) = requests
            .iter()
            .find(|e| e.environment != self.config.environment)
        {
            return Err(SefazError::Validation(format!(
                "event {} targets {:?} but the client is configured for {:?}",
                event.event_id(),
                event.environment,
                self.config.environment
            )));
        }
        let credential = credentials.load_signing_material()?;
        let envelope = events::build_envelope(&self.config, batch_id, requests, &credential)?;
        events::submit(&self.transport, &self.config.events, &envelope, &self.headers)
    }
}
