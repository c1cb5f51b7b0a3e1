//! Client builder configuration: endpoint overrides, TLS trust, path-style
//! addressing and retry/timeout policy.
//!
//! Builders describe what they support once, through [`BuilderCapabilities`].
//! The configurator applies each step the builder is capable of and skips the
//! rest. Nothing here fails: an unsupported or invalid step is recorded in the
//! [`ConfigureReport`] as skipped and the remaining steps still run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::{ClientPolicyConfig, Environment, RetryMode};
use crate::service::ServiceKind;
use crate::tls::ProcessTls;

/// What a client builder can be configured with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct BuilderCapabilities {
    /// Accepts an endpoint URL override.
    pub endpoint_override: bool,
    /// Can use a lightweight HTTP/1.1-only transport.
    pub lightweight_transport: bool,
    /// Can use a pooled transport with custom TLS trust.
    pub pooled_transport: bool,
    /// Has a direct path-style flag.
    pub path_style_flag: bool,
    /// Has the alternate path-style flag name.
    pub path_style_alternate_flag: bool,
    /// Accepts a nested service configuration carrying path-style access.
    pub service_configuration: bool,
    /// Accepts an override configuration (retry, timeouts, advanced options).
    pub override_config: bool,
    /// The override configuration has a trust-all-certificates option.
    pub trust_all_option: bool,
}

impl BuilderCapabilities {
    /// Every capability.
    pub const fn all() -> Self {
        Self {
            endpoint_override: true,
            lightweight_transport: true,
            pooled_transport: true,
            path_style_flag: true,
            path_style_alternate_flag: true,
            service_configuration: true,
            override_config: true,
            trust_all_option: true,
        }
    }

    /// No capabilities.
    pub const fn none() -> Self {
        Self {
            endpoint_override: false,
            lightweight_transport: false,
            pooled_transport: false,
            path_style_flag: false,
            path_style_alternate_flag: false,
            service_configuration: false,
            override_config: false,
            trust_all_option: false,
        }
    }

    fn path_style(&self) -> Option<PathStyleMechanism> {
        if self.path_style_flag {
            Some(PathStyleMechanism::Flag)
        } else if self.path_style_alternate_flag {
            Some(PathStyleMechanism::AlternateFlag)
        } else if self.service_configuration {
            Some(PathStyleMechanism::ServiceConfiguration)
        } else {
            None
        }
    }
}

/// TLS verification carried by the builder itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsTrust {
    /// Use the process default context.
    #[default]
    Default,
    /// Skip certificate and hostname verification.
    TrustAll,
}

/// HTTP transport selected for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpTransport {
    /// Minimal HTTP/1.1 transport.
    Lightweight,
    /// Pooled transport with its own TLS trust managers.
    Pooled { trust_all: bool },
}

/// How path-style addressing was switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyleMechanism {
    Flag,
    AlternateFlag,
    ServiceConfiguration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub mode: RetryMode,
}

/// Override configuration attached to a builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverrideConfig {
    pub retry: Option<RetryPolicy>,
    pub attempt_timeout: Option<Duration>,
    pub call_timeout: Option<Duration>,
    pub trust_all_certificates: bool,
}

/// Mutable configuration of a client that has not been built yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientBuildConfig {
    pub endpoint: Option<Url>,
    pub tls: TlsTrust,
    pub http_transport: Option<HttpTransport>,
    pub path_style: Option<PathStyleMechanism>,
    pub override_config: Option<OverrideConfig>,
}

/// A client builder seen through the boundary.
pub trait ClientBuilder {
    /// Fully-qualified runtime type name of the builder.
    fn type_name(&self) -> &str;

    fn capabilities(&self) -> BuilderCapabilities;

    fn build_config_mut(&mut self) -> &mut ClientBuildConfig;
}

/// A builder whose capabilities were declared once up front.
#[derive(Debug, Clone)]
pub struct ProbedBuilder {
    type_name: String,
    capabilities: BuilderCapabilities,
    config: ClientBuildConfig,
}

impl ProbedBuilder {
    pub fn new(type_name: impl Into<String>, capabilities: BuilderCapabilities) -> Self {
        Self {
            type_name: type_name.into(),
            capabilities,
            config: ClientBuildConfig::default(),
        }
    }

    pub const fn config(&self) -> &ClientBuildConfig {
        &self.config
    }

    pub fn into_config(self) -> ClientBuildConfig {
        self.config
    }
}

impl ClientBuilder for ProbedBuilder {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn capabilities(&self) -> BuilderCapabilities {
        self.capabilities
    }

    fn build_config_mut(&mut self) -> &mut ClientBuildConfig {
        &mut self.config
    }
}

/// One configuration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureStep {
    Transport,
    EndpointOverride,
    TrustAllOption,
    ProcessTrustAll,
    PathStyle,
    OverrideConfig,
}

impl fmt::Display for ConfigureStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transport => "transport",
            Self::EndpointOverride => "endpoint_override",
            Self::TrustAllOption => "trust_all_option",
            Self::ProcessTrustAll => "process_trust_all",
            Self::PathStyle => "path_style",
            Self::OverrideConfig => "override_config",
        })
    }
}

/// What [`ClientConfigurator::configure`] did to one builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureReport {
    pub service: ServiceKind,
    pub applied: Vec<ConfigureStep>,
    pub skipped: Vec<ConfigureStep>,
}

impl ConfigureReport {
    const fn new(service: ServiceKind) -> Self {
        Self {
            service,
            applied: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn applied(&self, step: ConfigureStep) -> bool {
        self.applied.contains(&step)
    }

    pub fn skipped(&self, step: ConfigureStep) -> bool {
        self.skipped.contains(&step)
    }

    fn record(&mut self, step: ConfigureStep, done: bool) {
        if done {
            self.applied.push(step);
        } else {
            self.skipped.push(step);
        }
    }
}

/// Applies environment-driven policy to client builders.
#[derive(Debug, Clone)]
pub struct ClientConfigurator {
    env: Environment,
    policy: ClientPolicyConfig,
    tls: Arc<ProcessTls>,
}

impl ClientConfigurator {
    pub const fn new(env: Environment, policy: ClientPolicyConfig, tls: Arc<ProcessTls>) -> Self {
        Self { env, policy, tls }
    }

    /// Configure `builder` before it is turned into a client.
    pub fn configure(&self, builder: &mut dyn ClientBuilder) -> ConfigureReport {
        let service = ServiceKind::from_type_name(builder.type_name());
        let mut report = ConfigureReport::new(service);
        if service == ServiceKind::Unknown {
            return report;
        }

        let caps = builder.capabilities();
        let config = builder.build_config_mut();

        if service == ServiceKind::FunctionInvoke {
            report.record(ConfigureStep::Transport, Self::apply_transport(config, caps));
        }

        if let Some(endpoint) = self.env.endpoint_for(service) {
            report.record(
                ConfigureStep::EndpointOverride,
                Self::apply_endpoint(config, caps, endpoint),
            );
            if self.apply_trust_all(config, caps) {
                report.record(ConfigureStep::TrustAllOption, true);
            } else {
                report.record(ConfigureStep::ProcessTrustAll, true);
            }
        }

        if service == ServiceKind::ObjectStorage {
            let mechanism = caps.path_style();
            config.path_style = mechanism;
            report.record(ConfigureStep::PathStyle, mechanism.is_some());
        }

        if matches!(
            service,
            ServiceKind::KeyValueStore | ServiceKind::FunctionInvoke
        ) {
            report.record(
                ConfigureStep::OverrideConfig,
                self.apply_override_config(config, caps),
            );
        }

        tracing::debug!(
            client.service = %service,
            configure.applied = report.applied.len(),
            configure.skipped = report.skipped.len(),
            "Client builder configured"
        );
        report
    }

    fn apply_transport(config: &mut ClientBuildConfig, caps: BuilderCapabilities) -> bool {
        config.http_transport = if caps.lightweight_transport {
            Some(HttpTransport::Lightweight)
        } else if caps.pooled_transport {
            Some(HttpTransport::Pooled { trust_all: true })
        } else {
            None
        };
        config.http_transport.is_some()
    }

    fn apply_endpoint(
        config: &mut ClientBuildConfig,
        caps: BuilderCapabilities,
        endpoint: &str,
    ) -> bool {
        if !caps.endpoint_override {
            return false;
        }
        match Url::parse(endpoint) {
            Ok(url) => {
                config.endpoint = Some(url);
                true
            }
            Err(e) => {
                tracing::debug!(endpoint, error = %e, "Endpoint override ignored");
                false
            }
        }
    }

    /// Trust-all on the builder's own override configuration when it has the
    /// option, otherwise process-wide. Returns `true` for the former.
    fn apply_trust_all(&self, config: &mut ClientBuildConfig, caps: BuilderCapabilities) -> bool {
        if caps.override_config && caps.trust_all_option {
            config
                .override_config
                .get_or_insert_with(OverrideConfig::default)
                .trust_all_certificates = true;
            config.tls = TlsTrust::TrustAll;
            true
        } else {
            self.tls.ensure_trust_all();
            false
        }
    }

    fn apply_override_config(
        &self,
        config: &mut ClientBuildConfig,
        caps: BuilderCapabilities,
    ) -> bool {
        if !caps.override_config {
            return false;
        }
        let overrides = config
            .override_config
            .get_or_insert_with(OverrideConfig::default);
        overrides.retry = Some(RetryPolicy {
            max_retries: self.policy.max_retries,
            mode: self.policy.retry_mode,
        });
        overrides.attempt_timeout = Some(self.policy.attempt_timeout());
        overrides.call_timeout = Some(self.policy.call_timeout());
        true
    }
}
