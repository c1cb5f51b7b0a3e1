//! Call interception for hosted functions.
//!
//! This crate sits between a function's cloud-service client library and the
//! network. A subset of calls is answered locally:
//!
//! - **Log service**: batch writes become structured JSON records on stdout
//!   (and the remote log store); group and stream administration gets an empty
//!   success response.
//! - **Function invocation**: the current trace id is added to the request's
//!   client context and the call is redirected to the internal gateway.
//!
//! Everything else goes to the real client, which is itself pointed at local
//! endpoints by [`ClientConfigurator`] when overrides are configured.
//!
//! # Boundary
//!
//! The client library is not linked against. Requests and responses cross
//! the boundary as [`SdkObject`] values, clients as [`ServiceClient`] trait
//! objects and builders as [`ClientBuilder`] trait objects. The host adapts its
//! real types to these and forwards calls to an [`Agent`].
//!
//! # Failure model
//!
//! Nothing in the interception path fails visibly. Unsupported shapes,
//! configuration steps that don't apply and transport failures all lead to
//! the real path (or a dropped log line). Only failures raised by the wrapped
//! client reach the caller, unchanged.

pub mod agent;
pub mod call;
pub mod config;
pub mod configure;
pub mod context;
pub mod error;
pub mod guard;
pub mod invoke;
pub mod logs;
pub mod output;
pub mod proxy;
pub mod reflect;
pub mod service;
pub mod telemetry;
pub mod tls;

pub use agent::Agent;
pub use call::{
    Argument, DynClient, Invocation, MethodSignature, ParamType, Reply, RequestConsumer,
    ReturnKind, ServiceClient,
};
pub use config::{Environment, InterceptConfig, RetryMode};
pub use configure::{
    BuilderCapabilities, ClientBuildConfig, ClientBuilder, ClientConfigurator, ConfigureReport,
    ProbedBuilder,
};
pub use context::TraceContext;
pub use error::{InterceptError, InterceptResult};
pub use guard::{Guard, GuardDecision, GuardReason};
pub use invoke::{ClientContextInjector, GatewayRedirect, InvokeInterceptor, InvokeOutcome};
pub use logs::{LogEntry, LogSink, LogsMock, LogsOperation};
pub use output::{BufferedOutput, LineOutput};
pub use proxy::{ClientWrapper, LogsInterceptor};
pub use reflect::{Member, SdkObject, SdkObjectBuilder};
pub use service::ServiceKind;
pub use tls::{ProcessTls, TransportPolicy};
