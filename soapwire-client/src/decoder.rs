// Codec adapter
// Runs the synchronous SOAP engine against a response body that was already
// fetched asynchronously. The engine's transmit step is answered from a
// single-slot buffer instead of the network.

use bytes::Bytes;
use serde_json::Value;
use soapwire_core::{OutboundRequest, ServiceDescription, SoapEngine, SoapError, Transmit};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Decodes SOAP responses through the engine's ordinary call path.
///
/// One decoder serves one decode at a time: arming the slot while a decode
/// is in progress fails with [`SoapError::DecoderBusy`].
#[derive(Debug)]
pub struct ClientDecoder {
    description: Arc<ServiceDescription>,
    location: Option<Arc<str>>,
    pending: Mutex<Option<Bytes>>,
}

/// Clears the slot when the decode finishes, however it finishes.
struct Armed<'a> {
    slot: &'a Mutex<Option<Bytes>>,
}

impl Drop for Armed<'_> {
    fn drop(&mut self) {
        *lock(self.slot) = None;
    }
}

fn lock(slot: &Mutex<Option<Bytes>>) -> MutexGuard<'_, Option<Bytes>> {
    // The slot never holds partial state, so poisoning is ignored.
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ClientDecoder {
    pub fn new(description: Arc<ServiceDescription>, location: Option<Arc<str>>) -> Self {
        Self {
            description,
            location,
            pending: Mutex::new(None),
        }
    }

    /// Decodes `body` as the response to `function(args)`.
    pub fn decode(&self, body: Bytes, function: &str, args: &[Value]) -> Result<Value, SoapError> {
        let _armed = self.arm(body)?;
        let engine = SoapEngine::new(&self.description).with_location(self.location.as_deref());
        engine.soap_call(self, function, args)
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.pending).is_some()
    }

    fn arm(&self, body: Bytes) -> Result<Armed<'_>, SoapError> {
        let mut slot = lock(&self.pending);
        if slot.is_some() {
            return Err(SoapError::DecoderBusy);
        }
        *slot = Some(body);
        Ok(Armed {
            slot: &self.pending,
        })
    }
}

impl Transmit for ClientDecoder {
    fn transmit(&self, request: &OutboundRequest) -> Result<Bytes, SoapError> {
        trace!(
            function = %request.function,
            location = %request.location,
            "answering transmit from stored response"
        );
        lock(&self.pending)
            .clone()
            .ok_or_else(|| SoapError::decode("no response body available for decoding"))
    }
}
