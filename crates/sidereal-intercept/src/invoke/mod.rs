//! Function invocation: trace propagation and the local gateway redirect.

pub mod client_context;
pub mod redirect;

use std::sync::Arc;

use bytes::Bytes;

pub use client_context::ClientContextInjector;
pub use redirect::{GatewayRedirect, GatewayReply};

use crate::call::{MethodSignature, Reply};
use crate::config::{Environment, GatewayConfig};
use crate::reflect::SdkObject;
use crate::tls::ProcessTls;

/// Name of the single-request invocation operation.
pub const INVOKE_OPERATION: &str = "invoke";

/// The parts of an invocation request the redirect needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvokeView {
    pub function_name: Option<String>,
    pub payload: Bytes,
    pub client_context: Option<String>,
}

impl InvokeView {
    pub fn from_request(request: &SdkObject) -> Self {
        Self {
            function_name: request
                .string("functionName")
                .filter(|name| !name.trim().is_empty()),
            payload: request.bytes("payload").unwrap_or_default(),
            client_context: request
                .string(client_context::CLIENT_CONTEXT_MEMBER)
                .filter(|ctx| !ctx.trim().is_empty()),
        }
    }
}

/// Outcome of intercepting one invocation.
#[derive(Debug)]
pub struct InvokeOutcome {
    /// The request to use from here on, trace id included when available.
    pub request: SdkObject,
    /// Local answer, if the gateway produced one.
    pub reply: Option<Reply<SdkObject>>,
}

/// Injects the trace id and tries the gateway, in that order.
#[derive(Debug)]
pub struct InvokeInterceptor {
    injector: ClientContextInjector,
    redirect: GatewayRedirect,
}

impl InvokeInterceptor {
    pub const fn new(injector: ClientContextInjector, redirect: GatewayRedirect) -> Self {
        Self { injector, redirect }
    }

    pub fn from_env(env: &Environment, config: &GatewayConfig, tls: Arc<ProcessTls>) -> Self {
        Self::new(
            ClientContextInjector::new(env.trace_id.clone()),
            GatewayRedirect::new(env.gateway_url.clone(), config.clone(), tls),
        )
    }

    pub const fn injector(&self) -> &ClientContextInjector {
        &self.injector
    }

    pub const fn redirect(&self) -> &GatewayRedirect {
        &self.redirect
    }

    /// Whether `signature` is the operation handled here.
    pub fn handles(signature: &MethodSignature) -> bool {
        signature.name == INVOKE_OPERATION && signature.params.len() == 1
    }

    pub fn intercept(&self, signature: &MethodSignature, request: &SdkObject) -> InvokeOutcome {
        let request = self
            .injector
            .inject(request)
            .unwrap_or_else(|| request.clone());
        let trace_id = self.injector.resolve_trace_id();
        let reply = self.redirect.handle(signature, &request, trace_id.as_deref());
        InvokeOutcome { request, reply }
    }
}
