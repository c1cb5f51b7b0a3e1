//! Local redirect of function invocations to the internal gateway.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::InvokeView;
use crate::call::{MethodSignature, Reply};
use crate::config::GatewayConfig;
use crate::error::{InterceptError, InterceptResult};
use crate::reflect::SdkObject;
use crate::tls::{run_off_runtime, HttpClients, ProcessTls};

/// Type name of synthesised invocation responses.
pub const INVOKE_RESPONSE_TYPE: &str = "lambda::model::InvokeResponse";

pub const HEADER_CLIENT_CONTEXT: &str = "X-Amz-Client-Context";
pub const HEADER_TRACE_ID: &str = "X-Amzn-Trace-Id";

/// Status and body returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    pub status: u16,
    pub payload: Bytes,
}

/// Sends invocations to the gateway instead of the remote service.
#[derive(Debug)]
pub struct GatewayRedirect {
    gateway_url: Option<String>,
    tls: Arc<ProcessTls>,
    clients: HttpClients,
}

impl GatewayRedirect {
    /// Redirect to `gateway_url`. With no URL every call is left unhandled.
    pub fn new(gateway_url: Option<String>, config: GatewayConfig, tls: Arc<ProcessTls>) -> Self {
        Self {
            gateway_url: gateway_url.filter(|url| !url.trim().is_empty()),
            clients: HttpClients::new(
                Arc::clone(&tls),
                config.connect_timeout(),
                config.read_timeout(),
            ),
            tls,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.gateway_url.is_some()
    }

    /// Invoke through the gateway and synthesise the response.
    ///
    /// Any failure yields `None` so the caller can use the real client.
    pub fn handle(
        &self,
        signature: &MethodSignature,
        request: &SdkObject,
        trace_id: Option<&str>,
    ) -> Option<Reply<SdkObject>> {
        let gateway = self.gateway_url.as_deref()?;
        self.tls.ensure_trust_all();

        let view = InvokeView::from_request(request);
        match run_off_runtime(|| self.invoke(gateway, &view, trace_id)) {
            Ok(reply) => {
                tracing::debug!(
                    function.name = view.function_name.as_deref().unwrap_or_default(),
                    http.status_code = reply.status,
                    "Invocation answered by gateway"
                );
                let response = SdkObject::builder(INVOKE_RESPONSE_TYPE)
                    .set("statusCode", reply.status)
                    .set("payload", reply.payload)
                    .build();
                Some(Reply::for_kind(signature.returns, response))
            }
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    error.type = e.error_type(),
                    "Gateway redirect failed, using real client"
                );
                None
            }
        }
    }

    /// POST one invocation to the gateway.
    pub fn invoke(
        &self,
        gateway: &str,
        view: &InvokeView,
        trace_id: Option<&str>,
    ) -> InterceptResult<GatewayReply> {
        let function_name = view
            .function_name
            .as_deref()
            .ok_or(InterceptError::MissingFunctionName)?;
        let url = invocation_url(gateway, function_name)?;
        let client = self.clients.client()?;

        let mut builder = client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(view.payload.to_vec());
        if let Some(ctx) = view.client_context.as_deref() {
            builder = builder.header(HEADER_CLIENT_CONTEXT, ctx);
        }
        if let Some(trace_id) = trace_id.filter(|t| !t.trim().is_empty()) {
            builder = builder.header(HEADER_TRACE_ID, trace_id);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        // Error statuses still carry the function's payload.
        let payload = response.bytes()?;
        Ok(GatewayReply { status, payload })
    }
}

/// `{gateway}/2015-03-31/functions/{name}/invocations`
pub fn invocation_url(gateway: &str, function_name: &str) -> InterceptResult<Url> {
    if function_name.trim().is_empty() {
        return Err(InterceptError::MissingFunctionName);
    }
    let mut url =
        Url::parse(gateway.trim()).map_err(|e| InterceptError::invalid_endpoint(gateway, e))?;
    url.path_segments_mut()
        .map_err(|()| InterceptError::invalid_endpoint(gateway, "cannot be a base URL"))?
        .pop_if_empty()
        .extend(["2015-03-31", "functions", function_name, "invocations"]);
    Ok(url)
}
