//! Shape of an intercepted call and the client seen through the boundary.

use std::fmt;
use std::future::Ready;
use std::sync::Arc;

use crate::reflect::{SdkObject, SdkObjectBuilder};

/// Declared type of an operation parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// A callback that fills in a request builder.
    Consumer,
    /// A concrete value of the named type.
    Value(String),
}

impl ParamType {
    pub fn value(type_name: impl Into<String>) -> Self {
        Self::Value(type_name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Consumer => "consumer",
            Self::Value(name) => name,
        }
    }
}

/// Whether an operation answers directly or through a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnKind {
    #[default]
    Sync,
    Future,
}

/// Declared signature of an intercepted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<ParamType>,
    pub returns: ReturnKind,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>, params: Vec<ParamType>) -> Self {
        Self {
            name: name.into(),
            params,
            returns: ReturnKind::Sync,
        }
    }

    /// A single-parameter operation taking a request of the given type.
    pub fn request(name: impl Into<String>, request_type: impl Into<String>) -> Self {
        Self::new(name, vec![ParamType::value(request_type)])
    }

    /// A single-parameter operation taking a builder-consumer callback.
    pub fn consumer(name: impl Into<String>) -> Self {
        Self::new(name, vec![ParamType::Consumer])
    }

    #[must_use]
    pub const fn returning(mut self, returns: ReturnKind) -> Self {
        self.returns = returns;
        self
    }

    pub fn first_param(&self) -> Option<&ParamType> {
        self.params.first()
    }
}

/// Callback that fills in a request builder.
#[derive(Clone)]
pub struct RequestConsumer(Arc<dyn Fn(&mut SdkObjectBuilder) + Send + Sync>);

impl RequestConsumer {
    pub fn new(f: impl Fn(&mut SdkObjectBuilder) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Materialise a request of the given type.
    pub fn apply(&self, type_name: &str) -> SdkObject {
        let mut builder = SdkObject::builder(type_name);
        (self.0)(&mut builder);
        builder.build()
    }
}

impl fmt::Debug for RequestConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestConsumer(..)")
    }
}

/// An actual argument passed to an intercepted operation.
#[derive(Debug, Clone)]
pub enum Argument {
    Request(SdkObject),
    Consumer(RequestConsumer),
}

impl Argument {
    /// The materialised request, if this argument is one.
    pub fn as_request(&self) -> Option<&SdkObject> {
        match self {
            Self::Request(obj) => Some(obj),
            Self::Consumer(_) => None,
        }
    }

    /// Runtime type name of the argument.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Request(obj) => obj.type_name(),
            Self::Consumer(_) => "consumer",
        }
    }
}

/// One call to an operation: its signature and arguments.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub signature: MethodSignature,
    pub args: Vec<Argument>,
}

impl Invocation {
    pub fn new(signature: MethodSignature, args: Vec<Argument>) -> Self {
        Self { signature, args }
    }

    /// Call a single-request operation.
    pub fn with_request(signature: MethodSignature, request: SdkObject) -> Self {
        Self::new(signature, vec![Argument::Request(request)])
    }

    pub fn operation(&self) -> &str {
        &self.signature.name
    }

    pub fn first_arg(&self) -> Option<&Argument> {
        self.args.first()
    }
}

/// Result of an operation, shaped after its declared return kind.
#[derive(Debug)]
pub enum Reply<T> {
    Ready(T),
    /// An already-completed future.
    Completed(Ready<T>),
}

impl<T> Reply<T> {
    /// Wrap a value to match the declared return kind.
    pub fn for_kind(kind: ReturnKind, value: T) -> Self {
        match kind {
            ReturnKind::Sync => Self::Ready(value),
            ReturnKind::Future => Self::Completed(std::future::ready(value)),
        }
    }

    pub const fn is_future(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Ready(value) => value,
            Self::Completed(fut) => fut.into_inner(),
        }
    }
}

/// A client of the wrapped library, seen through the boundary.
///
/// `Error` is the client's own failure type. Wrappers return it unchanged.
pub trait ServiceClient: Send + Sync {
    type Error;

    /// Fully-qualified runtime type name of the client.
    fn type_name(&self) -> &str;

    /// Perform an operation.
    fn call(&self, invocation: Invocation) -> Result<Reply<SdkObject>, Self::Error>;

    /// Whether this client already routes calls through the interception layer.
    fn is_intercepting(&self) -> bool {
        false
    }
}

/// Shared handle to a boundary client.
pub type DynClient<E> = Arc<dyn ServiceClient<Error = E>>;
