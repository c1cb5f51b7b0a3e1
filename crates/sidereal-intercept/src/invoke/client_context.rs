//! Trace id propagation through the invocation client-context blob.
//!
//! The blob is base64-encoded JSON. The trace id goes into its nested
//! `custom` object, where the receiving runtime looks for it.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{Map, Value};

use crate::context::TraceContext;
use crate::error::InterceptResult;
use crate::reflect::SdkObject;

/// Request member holding the blob.
pub const CLIENT_CONTEXT_MEMBER: &str = "clientContext";

const CUSTOM: &str = "custom";
const TRACE_ID: &str = "trace_id";

/// Adds the current trace id to invocation requests.
#[derive(Debug, Clone, Default)]
pub struct ClientContextInjector {
    fallback_trace_id: Option<String>,
}

impl ClientContextInjector {
    /// `fallback_trace_id` is used when no trace context is bound.
    pub fn new(fallback_trace_id: Option<String>) -> Self {
        Self {
            fallback_trace_id: fallback_trace_id.filter(|id| !id.trim().is_empty()),
        }
    }

    /// Trace id for the current unit of work.
    pub fn resolve_trace_id(&self) -> Option<String> {
        TraceContext::current_trace_id().or_else(|| self.fallback_trace_id.clone())
    }

    /// Copy of `request` with the trace id in its client context.
    ///
    /// Returns `None` when there is no trace id to propagate. `request` is
    /// never modified.
    pub fn inject(&self, request: &SdkObject) -> Option<SdkObject> {
        let trace_id = self.resolve_trace_id()?;
        let existing = request.string(CLIENT_CONTEXT_MEMBER);

        match encode_with_trace(existing.as_deref(), &trace_id) {
            Ok(blob) => Some(
                request
                    .to_builder()
                    .set(CLIENT_CONTEXT_MEMBER, blob)
                    .build(),
            ),
            Err(e) => {
                tracing::debug!(error = %e, "Client context left unchanged");
                None
            }
        }
    }
}

/// Decode a blob into its JSON object. Absent or undecodable blobs yield an
/// empty object.
pub fn decode(blob: Option<&str>) -> Map<String, Value> {
    blob.map(str::trim)
        .filter(|b| !b.is_empty())
        .and_then(|b| STANDARD.decode(b).ok())
        .and_then(|raw| serde_json::from_slice::<Value>(&raw).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default()
}

/// Re-encode `blob` with `custom.trace_id` set, unless it already holds a
/// non-blank value.
pub fn encode_with_trace(blob: Option<&str>, trace_id: &str) -> InterceptResult<String> {
    let mut root = decode(blob);

    let custom = root
        .entry(CUSTOM)
        .or_insert_with(|| Value::Object(Map::new()));
    if !custom.is_object() {
        *custom = Value::Object(Map::new());
    }
    if let Value::Object(custom) = custom {
        let has_trace = custom
            .get(TRACE_ID)
            .and_then(Value::as_str)
            .is_some_and(|existing| !existing.trim().is_empty());
        if !has_trace {
            custom.insert(TRACE_ID.to_owned(), Value::String(trace_id.to_owned()));
        }
    }

    let raw = serde_json::to_vec(&Value::Object(root))?;
    Ok(STANDARD.encode(raw))
}
