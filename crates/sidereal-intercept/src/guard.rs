//! Eligibility check for answering a log service call locally.
//!
//! The guard is conservative. Anything it is unsure of goes to the real
//! client. The first rejection of each (operation, parameter type, reason)
//! shape is reported once, as a `tracing` warning and as a JSON line on the
//! guard's output. With diagnostics on, every decision is also written out.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashSet;
use serde_json::{json, Value};

use crate::call::{Argument, MethodSignature, ParamType};
use crate::config::ENV_DIAGNOSTICS;
use crate::logs::entry::format_time;
use crate::logs::mock::{LogsOperation, MODEL_PREFIX};
use crate::output::LineOutput;

const GUARD_LOGGER: &str = "sidereal.intercept.guard";
const NONE: &str = "none";

/// Why a call was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardReason {
    NoArgs,
    UnsupportedConsumerOverload,
    UnsupportedRequestType,
    SupportedConsumerOverload,
    SupportedRequestObject,
}

impl GuardReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoArgs => "no_args",
            Self::UnsupportedConsumerOverload => "unsupported_consumer_overload",
            Self::UnsupportedRequestType => "unsupported_request_type",
            Self::SupportedConsumerOverload => "supported_consumer_overload",
            Self::SupportedRequestObject => "supported_request_object",
        }
    }
}

impl fmt::Display for GuardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`Guard::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardDecision {
    pub supported: bool,
    pub reason: GuardReason,
}

impl GuardDecision {
    const fn accept(reason: GuardReason) -> Self {
        Self {
            supported: true,
            reason,
        }
    }

    const fn reject(reason: GuardReason) -> Self {
        Self {
            supported: false,
            reason,
        }
    }
}

type WarnKey = (String, String, GuardReason);

/// Decides whether a log service call can be answered locally.
pub struct Guard {
    warned: DashSet<WarnKey>,
    output: Arc<dyn LineOutput>,
    diagnostics: bool,
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("warned", &self.warned.len())
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

impl Guard {
    pub fn new(output: Arc<dyn LineOutput>, diagnostics: bool) -> Self {
        Self {
            warned: DashSet::new(),
            output,
            diagnostics,
        }
    }

    pub fn decide(
        &self,
        signature: Option<&MethodSignature>,
        argument: Option<&Argument>,
    ) -> GuardDecision {
        let (Some(signature), Some(argument)) = (signature, argument) else {
            let decision = GuardDecision::reject(GuardReason::NoArgs);
            self.diagnose(signature, argument, decision);
            return decision;
        };

        let decision = Self::classify(signature, argument);
        if !decision.supported {
            self.warn_once(signature, argument, decision.reason);
        }
        self.diagnose(Some(signature), Some(argument), decision);
        decision
    }

    /// Number of distinct rejection shapes reported so far.
    pub fn warned_count(&self) -> usize {
        self.warned.len()
    }

    fn classify(signature: &MethodSignature, argument: &Argument) -> GuardDecision {
        let consumer_shape = matches!(signature.first_param(), Some(ParamType::Consumer))
            || matches!(argument, Argument::Consumer(_));

        if consumer_shape {
            let allowed = LogsOperation::from_name(&signature.name)
                .is_some_and(LogsOperation::allows_consumer);
            return if allowed {
                GuardDecision::accept(GuardReason::SupportedConsumerOverload)
            } else {
                GuardDecision::reject(GuardReason::UnsupportedConsumerOverload)
            };
        }

        if signature.params.is_empty() {
            return GuardDecision::reject(GuardReason::NoArgs);
        }

        let type_name = argument.type_name();
        if type_name.starts_with(MODEL_PREFIX) && type_name.ends_with("Request") {
            GuardDecision::accept(GuardReason::SupportedRequestObject)
        } else {
            GuardDecision::reject(GuardReason::UnsupportedRequestType)
        }
    }

    fn warn_once(&self, signature: &MethodSignature, argument: &Argument, reason: GuardReason) {
        if LogsOperation::from_name(&signature.name).is_none() {
            return;
        }
        let first_param = first_param_name(Some(signature));
        let key = (signature.name.clone(), first_param.to_owned(), reason);
        if !self.warned.insert(key) {
            return;
        }

        tracing::warn!(
            logs.operation = %signature.name,
            guard.first_param = first_param,
            guard.reason = %reason,
            "Log service call bypassed the local mock and will use the real client"
        );
        self.emit(
            "WARNING",
            "Log service call bypassed local mock and will use original client path",
            Some(signature),
            Some(argument),
            GuardDecision::reject(reason),
        );
    }

    fn diagnose(
        &self,
        signature: Option<&MethodSignature>,
        argument: Option<&Argument>,
        decision: GuardDecision,
    ) {
        if self.diagnostics {
            self.emit("DEBUG", "Guard decision", signature, argument, decision);
        }
    }

    fn emit(
        &self,
        level: &str,
        message: &str,
        signature: Option<&MethodSignature>,
        argument: Option<&Argument>,
        decision: GuardDecision,
    ) {
        let line: Value = json!({
            "_time": format_time(Utc::now()),
            "level": level,
            "logger": GUARD_LOGGER,
            "message": message,
            "method": signature.map_or("null", |s| s.name.as_str()),
            "first_param": first_param_name(signature),
            "request_type": argument.map_or("null", Argument::type_name),
            "reason": decision.reason.as_str(),
            "diagnostic_env": ENV_DIAGNOSTICS,
            "hint": format!("set {ENV_DIAGNOSTICS}=true for per-call decisions"),
            "supported": decision.supported,
        });
        self.output.write_line(&line.to_string());
    }
}

fn first_param_name(signature: Option<&MethodSignature>) -> &str {
    signature
        .and_then(MethodSignature::first_param)
        .map_or(NONE, ParamType::name)
}
