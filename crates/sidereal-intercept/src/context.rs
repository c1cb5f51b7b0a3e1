//! Trace context for the unit of work currently being processed.
//!
//! The component that owns the invocation lifecycle binds a [`TraceContext`]
//! around the processing of one inbound trigger. Everything inside that scope
//! (log synthesis, client-context injection, the log sink) reads it through
//! [`TraceContext::current`]. The binding ends with the scope, so nothing is
//! carried over to the next unit of work on a reused thread or task.
//!
//! # Example
//!
//! ```
//! use sidereal_intercept::TraceContext;
//!
//! let ctx = TraceContext::new()
//!     .with_trace_id("Root=1-5759e988-bd862e3fe1be46a994272793")
//!     .with_request_id("c6af9ac6-7b61-11e6-9a41-93e812345678");
//!
//! ctx.sync_scope(|| {
//!     assert!(TraceContext::current_trace_id().is_some());
//! });
//! assert!(TraceContext::current_trace_id().is_none());
//! ```

use std::future::Future;

tokio::task_local! {
    static CURRENT: TraceContext;
}

/// Trace and request ids for one unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: Option<String>,
    request_id: Option<String>,
}

impl TraceContext {
    pub const fn new() -> Self {
        Self {
            trace_id: None,
            request_id: None,
        }
    }

    /// Set the trace id. Blank values are ignored.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = non_blank(trace_id.into());
        self
    }

    /// Set the request id. Blank values are ignored.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = non_blank(request_id.into());
        self
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub const fn is_empty(&self) -> bool {
        self.trace_id.is_none() && self.request_id.is_none()
    }

    /// Run a synchronous unit of work with this context bound.
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(self, f)
    }

    /// Run an asynchronous unit of work with this context bound.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    /// The context bound to the current unit of work, if any.
    pub fn current() -> Option<Self> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// Trace id of the current unit of work, if any.
    pub fn current_trace_id() -> Option<String> {
        CURRENT
            .try_with(|ctx| ctx.trace_id.clone())
            .ok()
            .flatten()
    }

    /// Request id of the current unit of work, if any.
    pub fn current_request_id() -> Option<String> {
        CURRENT
            .try_with(|ctx| ctx.request_id.clone())
            .ok()
            .flatten()
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_bound_outside_scope() {
        assert!(TraceContext::current().is_none());
        assert!(TraceContext::current_trace_id().is_none());
        assert!(TraceContext::current_request_id().is_none());
    }

    #[test]
    fn blank_ids_are_absent() {
        let ctx = TraceContext::new().with_trace_id("  ").with_request_id("");
        assert!(ctx.is_empty());
    }

    #[test]
    fn scope_binds_and_releases() {
        let ctx = TraceContext::new()
            .with_trace_id("trace-1")
            .with_request_id("req-1");

        let seen = ctx.clone().sync_scope(TraceContext::current);
        assert_eq!(seen, Some(ctx));
        assert!(TraceContext::current().is_none());
    }

    #[test]
    fn sequential_scopes_do_not_leak() {
        let first = TraceContext::new().with_trace_id("trace-a");
        let second = TraceContext::new().with_request_id("req-b");

        let a = first.sync_scope(|| {
            (
                TraceContext::current_trace_id(),
                TraceContext::current_request_id(),
            )
        });
        let b = second.sync_scope(|| {
            (
                TraceContext::current_trace_id(),
                TraceContext::current_request_id(),
            )
        });

        assert_eq!(a, (Some("trace-a".to_owned()), None));
        assert_eq!(b, (None, Some("req-b".to_owned())));
    }

    #[tokio::test]
    async fn async_scope_is_task_local() {
        let ctx = TraceContext::new().with_trace_id("trace-async");

        let inner = ctx
            .scope(async {
                tokio::task::yield_now().await;
                TraceContext::current_trace_id()
            })
            .await;

        assert_eq!(inner.as_deref(), Some("trace-async"));
        assert!(TraceContext::current_trace_id().is_none());
    }
}
