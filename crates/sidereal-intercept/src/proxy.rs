//! Wrapping of built clients so that calls reach the interception layer even
//! when no lower-level interception point saw them.

use std::fmt;
use std::sync::Arc;

use crate::call::{Argument, DynClient, Invocation, Reply, ServiceClient};
use crate::guard::Guard;
use crate::invoke::InvokeInterceptor;
use crate::logs::{LogsMock, LogsOperation};
use crate::reflect::SdkObject;
use crate::service::ServiceKind;

/// Guard and mock together: the local path for log service calls.
#[derive(Debug)]
pub struct LogsInterceptor {
    guard: Arc<Guard>,
    mock: Arc<LogsMock>,
}

impl LogsInterceptor {
    pub const fn new(guard: Arc<Guard>, mock: Arc<LogsMock>) -> Self {
        Self { guard, mock }
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    /// Local answer for `invocation`, if the guard allows one.
    pub fn intercept(&self, invocation: &Invocation) -> Option<Reply<SdkObject>> {
        let operation = LogsOperation::from_name(invocation.operation())?;
        let argument = invocation.first_arg();
        if !self
            .guard
            .decide(Some(&invocation.signature), argument)
            .supported
        {
            return None;
        }

        let request = match argument? {
            Argument::Request(request) => request.clone(),
            Argument::Consumer(consumer) => consumer.apply(&operation.request_type()),
        };
        self.mock.handle(&invocation.signature, Some(&request))
    }
}

/// Wraps built clients in intercepting proxies.
#[derive(Debug, Clone)]
pub struct ClientWrapper {
    logs: Arc<LogsInterceptor>,
    invoke: Arc<InvokeInterceptor>,
}

impl ClientWrapper {
    pub const fn new(logs: Arc<LogsInterceptor>, invoke: Arc<InvokeInterceptor>) -> Self {
        Self { logs, invoke }
    }

    /// Wrap `client`, built from a builder of type `builder_type`.
    ///
    /// Clients that already intercept are returned as-is, as are clients of
    /// services with nothing to intercept.
    pub fn wrap<E: 'static>(
        &self,
        builder_type: Option<&str>,
        client: DynClient<E>,
    ) -> DynClient<E> {
        if client.is_intercepting() {
            return client;
        }

        let service = ServiceKind::from_builder_or_client(builder_type, Some(client.type_name()));
        match service {
            ServiceKind::FunctionInvoke => {
                tracing::debug!(client.type = client.type_name(), "Wrapping invocation client");
                Arc::new(InvokeProxy {
                    inner: client,
                    invoke: Arc::clone(&self.invoke),
                })
            }
            ServiceKind::LogService => {
                tracing::debug!(client.type = client.type_name(), "Wrapping log service client");
                Arc::new(LogsProxy {
                    inner: client,
                    logs: Arc::clone(&self.logs),
                })
            }
            ServiceKind::ObjectStorage | ServiceKind::KeyValueStore | ServiceKind::Unknown => {
                client
            }
        }
    }
}

/// Answers log service calls locally when the guard allows it.
pub struct LogsProxy<E> {
    inner: DynClient<E>,
    logs: Arc<LogsInterceptor>,
}

impl<E> ServiceClient for LogsProxy<E> {
    type Error = E;

    fn type_name(&self) -> &str {
        self.inner.type_name()
    }

    fn call(&self, invocation: Invocation) -> Result<Reply<SdkObject>, E> {
        match self.logs.intercept(&invocation) {
            Some(reply) => Ok(reply),
            None => self.inner.call(invocation),
        }
    }

    fn is_intercepting(&self) -> bool {
        true
    }
}

impl<E> fmt::Debug for LogsProxy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogsProxy")
            .field("inner", &self.inner.type_name())
            .finish_non_exhaustive()
    }
}

/// Adds trace propagation and the gateway redirect to invocation calls.
pub struct InvokeProxy<E> {
    inner: DynClient<E>,
    invoke: Arc<InvokeInterceptor>,
}

impl<E> ServiceClient for InvokeProxy<E> {
    type Error = E;

    fn type_name(&self) -> &str {
        self.inner.type_name()
    }

    fn call(&self, invocation: Invocation) -> Result<Reply<SdkObject>, E> {
        if !InvokeInterceptor::handles(&invocation.signature) {
            return self.inner.call(invocation);
        }
        let Some(Argument::Request(request)) = invocation.first_arg() else {
            return self.inner.call(invocation);
        };

        let outcome = self.invoke.intercept(&invocation.signature, request);
        if let Some(reply) = outcome.reply {
            return Ok(reply);
        }
        self.inner
            .call(Invocation::with_request(invocation.signature, outcome.request))
    }

    fn is_intercepting(&self) -> bool {
        true
    }
}

impl<E> fmt::Debug for InvokeProxy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokeProxy")
            .field("inner", &self.inner.type_name())
            .finish_non_exhaustive()
    }
}
