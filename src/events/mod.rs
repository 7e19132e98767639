//! Event submission (`NFeRecepcaoEvento4`): build, sign, send, interpret.
//!
//! | Step | Type |
//! |------|------|
//! | Caller input | [`FiscalEventRequest`] |
//! | Signed `evento` | [`SignedEventRecord`] |
//! | `envEvento` | [`EventBatchBuilder`] → [`SealedEnvelope`] |
//! | `retEnvEvento` | [`EventBatchResult`] |

mod envelope;
mod request;
mod response;

pub use envelope::{
    Building, Empty, EventBatchBuilder, MAX_BATCH_ID, SealedEnvelope, SignedEventRecord,
};
pub use request::{
    EVENT_VERSION, FiscalEventRequest, MAX_EVENTS_PER_BATCH, ManifestationKind,
    NATIONAL_AUTHORITY,
};
pub use response::{
    BATCH_PROCESSED, EVENT_DUPLICATE, EVENT_REGISTERED, EVENT_REGISTERED_UNLINKED,
    EventBatchResult, EventResult, parse_event_response,
};

use crate::core::{Endpoint, SefazError, ServiceConfig, SoapRequest, Transport};
use crate::soap;
use crate::xmldsig::SigningCredential;

/// Sign `events` into one `envEvento`.
pub fn build_envelope(
    config: &ServiceConfig,
    batch_id: u64,
    events: impl IntoIterator<Item = FiscalEventRequest>,
    credential: &SigningCredential,
) -> Result<SealedEnvelope, SefazError> {
    let mut events = events.into_iter();
    let first = events
        .next()
        .ok_or_else(|| SefazError::Validation("an event batch needs at least one event".into()))?;
    let mut builder = EventBatchBuilder::from_config(batch_id, config).push(first, credential)?;
    for event in events {
        builder = builder.push(event, credential)?;
    }
    builder.seal()
}

/// Send a sealed envelope and interpret the reply.
///
/// `headers` are handed to the transport with the request.
pub fn submit<T: Transport + ?Sized>(
    transport: &T,
    endpoint: &Endpoint,
    envelope: &SealedEnvelope,
    headers: &[(String, String)],
) -> Result<EventBatchResult, SefazError> {
    let payload = soap::envelope(envelope.as_bytes(), endpoint)?;
    tracing::debug!(
        url = %endpoint.url,
        batch_id = envelope.batch_id(),
        bytes = payload.len(),
        "sending event envelope"
    );
    let body = transport.send(&SoapRequest::new(&payload, endpoint).with_headers(headers))?;
    tracing::debug!(bytes = body.len(), "received event response");
    parse_event_response(&body)
}
