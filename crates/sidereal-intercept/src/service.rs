//! Target service inference from client and builder type names.

use std::fmt;

/// Service family a client or builder talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    ObjectStorage,
    KeyValueStore,
    FunctionInvoke,
    LogService,
    Unknown,
}

impl ServiceKind {
    /// Infer the service from a fully-qualified type name.
    ///
    /// Matching is done on path segments, so both `sdk.s3.Client` and
    /// `aws_sdk_s3::client::Client` resolve to object storage while
    /// `metrics3::Client` does not.
    pub fn from_type_name(type_name: &str) -> Self {
        type_name
            .split(|c| c == '.' || c == ':')
            .filter(|segment| !segment.is_empty())
            .find_map(Self::from_segment)
            .unwrap_or(Self::Unknown)
    }

    /// Infer from the builder first, then the client.
    pub fn from_builder_or_client(builder: Option<&str>, client: Option<&str>) -> Self {
        let from_builder = builder.map_or(Self::Unknown, Self::from_type_name);
        if from_builder != Self::Unknown {
            return from_builder;
        }
        client.map_or(Self::Unknown, Self::from_type_name)
    }

    fn from_segment(segment: &str) -> Option<Self> {
        let segment = segment.strip_prefix("aws_sdk_").unwrap_or(segment);
        match segment {
            "s3" => Some(Self::ObjectStorage),
            "dynamodb" => Some(Self::KeyValueStore),
            "lambda" => Some(Self::FunctionInvoke),
            "cloudwatchlogs" => Some(Self::LogService),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ObjectStorage => "object_storage",
            Self::KeyValueStore => "key_value_store",
            Self::FunctionInvoke => "function_invoke",
            Self::LogService => "log_service",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
