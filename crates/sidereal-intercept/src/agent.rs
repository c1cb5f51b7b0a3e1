//! Process-level assembly of the interception layer and the hooks a host
//! attaches to its client library.
//!
//! The host calls [`Agent::install`] once at startup and then forwards:
//!
//! - every client builder, just before it is built, to
//!   [`Agent::on_builder_build`];
//! - every built client to [`Agent::on_client_built`], returning the client it
//!   gets back to the application;
//! - calls seen at its own interception points to
//!   [`Agent::intercept_logs_call`] and [`Agent::intercept_invoke_call`].

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::call::{Argument, DynClient, Invocation, Reply};
use crate::config::{Environment, InterceptConfig};
use crate::configure::{ClientBuilder, ClientConfigurator, ConfigureReport};
use crate::error::InterceptResult;
use crate::guard::Guard;
use crate::invoke::{InvokeInterceptor, InvokeOutcome};
use crate::logs::{HookedStdout, LogSink, LogsMock};
use crate::output::{LineOutput, Stdout};
use crate::proxy::{ClientWrapper, LogsInterceptor};
use crate::reflect::SdkObject;
use crate::telemetry;
use crate::tls::ProcessTls;

static INSTALLED: OnceLock<Arc<Agent>> = OnceLock::new();

/// The assembled interception layer.
pub struct Agent {
    env: Environment,
    config: InterceptConfig,
    sink: Arc<LogSink>,
    logs: Arc<LogsInterceptor>,
    invoke: Arc<InvokeInterceptor>,
    configurator: ClientConfigurator,
    wrapper: ClientWrapper,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("env", &self.env)
            .field("sink_enabled", &self.sink.is_enabled())
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Install the process-wide agent from `sidereal-intercept.toml` and the
    /// process environment.
    ///
    /// Only the first call assembles an agent. Later calls, including racing
    /// ones, return that same instance.
    pub fn install() -> InterceptResult<Arc<Self>> {
        if let Some(agent) = INSTALLED.get() {
            return Ok(Arc::clone(agent));
        }

        let config = InterceptConfig::load()?;
        let env = Environment::from_process();
        telemetry::init_tracing(env.diagnostics);

        let installed = INSTALLED.get_or_init(|| {
            let agent = Self::new(config, env, ProcessTls::global(), None);
            tracing::info!(
                function.name = agent.env.function_name.as_deref().unwrap_or_default(),
                logs.shipping = agent.sink.is_enabled(),
                gateway.redirect = agent.invoke.redirect().is_enabled(),
                "Interception layer installed"
            );
            Arc::new(agent)
        });
        Ok(Arc::clone(installed))
    }

    /// The process-wide agent, if installed.
    pub fn installed() -> Option<Arc<Self>> {
        INSTALLED.get().cloned()
    }

    /// Assemble an agent.
    ///
    /// With no `output`, records go to stdout, hooked to the log sink when
    /// log shipping is configured.
    pub fn new(
        config: InterceptConfig,
        env: Environment,
        tls: Arc<ProcessTls>,
        output: Option<Arc<dyn LineOutput>>,
    ) -> Self {
        let sink = Arc::new(LogSink::new(&config.logs, &env, Arc::clone(&tls)));
        let output: Arc<dyn LineOutput> = match output {
            Some(output) => output,
            None if sink.is_enabled() => Arc::new(HookedStdout::new(Arc::clone(&sink))),
            None => Arc::new(Stdout),
        };

        let guard = Arc::new(Guard::new(Arc::clone(&output), env.diagnostics));
        let mock = Arc::new(LogsMock::new(
            &config.logs,
            &env,
            Arc::clone(&sink),
            output,
        ));
        let logs = Arc::new(LogsInterceptor::new(guard, mock));
        let invoke = Arc::new(InvokeInterceptor::from_env(
            &env,
            &config.gateway,
            Arc::clone(&tls),
        ));
        let configurator = ClientConfigurator::new(env.clone(), config.clients.clone(), tls);
        let wrapper = ClientWrapper::new(Arc::clone(&logs), Arc::clone(&invoke));

        Self {
            env,
            config,
            sink,
            logs,
            invoke,
            configurator,
            wrapper,
        }
    }

    pub const fn env(&self) -> &Environment {
        &self.env
    }

    pub const fn config(&self) -> &InterceptConfig {
        &self.config
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub fn guard(&self) -> &Guard {
        self.logs.guard()
    }

    /// Configure a client builder before it is built.
    pub fn on_builder_build(&self, builder: &mut dyn ClientBuilder) -> ConfigureReport {
        self.configurator.configure(builder)
    }

    /// Wrap a freshly built client.
    pub fn on_client_built<E: 'static>(
        &self,
        builder_type: Option<&str>,
        client: DynClient<E>,
    ) -> DynClient<E> {
        self.wrapper.wrap(builder_type, client)
    }

    /// Local answer for a log service call. `None` means "proceed".
    pub fn intercept_logs_call(&self, invocation: &Invocation) -> Option<Reply<SdkObject>> {
        self.logs.intercept(invocation)
    }

    /// Trace injection and gateway redirect for an invocation call.
    ///
    /// `None` means the call is not an invocation and should proceed as-is.
    /// Otherwise the outcome carries either the local answer or the request
    /// to proceed with.
    pub fn intercept_invoke_call(&self, invocation: &Invocation) -> Option<InvokeOutcome> {
        if !InvokeInterceptor::handles(&invocation.signature) {
            return None;
        }
        let request = invocation.first_arg().and_then(Argument::as_request)?;
        Some(self.invoke.intercept(&invocation.signature, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{MethodSignature, RequestConsumer};
    use crate::configure::{BuilderCapabilities, ConfigureStep, ProbedBuilder};
    use crate::invoke::client_context;
    use crate::output::BufferedOutput;

    fn agent(env: Environment) -> (Agent, Arc<BufferedOutput>) {
        let output = Arc::new(BufferedOutput::new());
        let agent = Agent::new(
            InterceptConfig::default(),
            env,
            Arc::new(ProcessTls::new()),
            Some(Arc::clone(&output) as Arc<dyn LineOutput>),
        );
        (agent, output)
    }

    #[test]
    fn builder_hook_configures() {
        let (agent, _) = agent(Environment {
            dynamodb_endpoint: Some("http://ddb:8000".to_owned()),
            ..Environment::default()
        });
        let mut builder = ProbedBuilder::new(
            "aws_sdk_dynamodb::config::Builder",
            BuilderCapabilities::all(),
        );
        let report = agent.on_builder_build(&mut builder);
        assert!(report.applied(ConfigureStep::EndpointOverride));
        assert!(report.applied(ConfigureStep::OverrideConfig));
    }

    #[test]
    fn logs_hook_answers_admin_calls() {
        let (agent, output) = agent(Environment::default());
        let reply = agent.intercept_logs_call(&Invocation::new(
            MethodSignature::consumer("describeLogGroups"),
            vec![Argument::Consumer(RequestConsumer::new(|_| {}))],
        ));
        assert!(reply.is_some());
        assert!(output.lines().is_empty());

        let rejected = agent.intercept_logs_call(&Invocation::new(
            MethodSignature::consumer("putLogEvents"),
            vec![Argument::Consumer(RequestConsumer::new(|_| {}))],
        ));
        assert!(rejected.is_none());
        assert_eq!(agent.guard().warned_count(), 1);
        assert_eq!(output.lines().len(), 1);
    }

    #[test]
    fn invoke_hook_injects_trace() {
        let (agent, _) = agent(Environment::default());
        let request = SdkObject::builder("lambda::model::InvokeRequest")
            .set("functionName", "orders")
            .build();
        let signature = MethodSignature::request("invoke", request.type_name());
        let invocation = Invocation::with_request(signature, request);

        let outcome = crate::TraceContext::new()
            .with_trace_id("Root=1-hook")
            .sync_scope(|| agent.intercept_invoke_call(&invocation))
            .unwrap();
        assert!(outcome.reply.is_none());
        let blob = client_context::decode(outcome.request.string("clientContext").as_deref());
        assert_eq!(blob["custom"]["trace_id"], "Root=1-hook");

        let other = Invocation::new(MethodSignature::new("getFunction", vec![]), vec![]);
        assert!(agent.intercept_invoke_call(&other).is_none());
    }

    #[test]
    fn default_output_without_log_store() {
        let agent = Agent::new(
            InterceptConfig::default(),
            Environment::default(),
            Arc::new(ProcessTls::new()),
            None,
        );
        assert!(!agent.sink().is_enabled());
        assert_eq!(agent.config().logs.job, "lambda");
    }
}
