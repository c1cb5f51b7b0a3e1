//! Transport policy for outbound HTTP and the process-wide trust-all switch.
//!
//! Redirect targets (local gateway, emulated services) typically present
//! self-signed certificates. Clients built by this crate take an explicit
//! [`TransportPolicy`]. Where a target client cannot carry its own trust-all
//! option, the process-scoped [`ProcessTls`] resource is switched to
//! trust-all instead.
//!
//! # Lifecycle of [`ProcessTls`]
//!
//! The switch starts off and can be turned on exactly once. It is never
//! turned off again. Every policy derived from it after that point (the
//! "default context") skips certificate and hostname verification, and
//! [`HttpClients`] hands out a trust-all client from then on.
//!
//! # Blocking transport
//!
//! Clients are `reqwest` blocking clients, which must not block a thread that
//! drives an async runtime. [`run_off_runtime`] moves the work to a plain
//! thread when called from inside one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{InterceptError, InterceptResult};

static GLOBAL: OnceLock<Arc<ProcessTls>> = OnceLock::new();

/// Process-scoped TLS trust setting.
#[derive(Debug, Default)]
pub struct ProcessTls {
    trust_all: AtomicBool,
}

impl ProcessTls {
    pub const fn new() -> Self {
        Self {
            trust_all: AtomicBool::new(false),
        }
    }

    /// The instance shared by the whole process.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Switch to trust-all. Returns `true` only for the caller that did it.
    pub fn ensure_trust_all(&self) -> bool {
        let installed = self
            .trust_all
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if installed {
            tracing::warn!(
                tls.trust_all = true,
                "Process-wide TLS verification disabled for redirect targets"
            );
        }
        installed
    }

    pub fn trusts_all(&self) -> bool {
        self.trust_all.load(Ordering::Acquire)
    }

    /// Default-context policy with the given timeouts.
    pub fn policy(&self, connect_timeout: Duration, timeout: Duration) -> TransportPolicy {
        TransportPolicy {
            trust_all: self.trusts_all(),
            connect_timeout,
            timeout,
        }
    }
}

/// How an outbound HTTP client is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct TransportPolicy {
    /// Skip certificate and hostname verification.
    pub trust_all: bool,
    pub connect_timeout: Duration,
    /// Upper bound on the whole exchange once connected.
    pub timeout: Duration,
}

impl TransportPolicy {
    /// Build a blocking HTTP client following this policy.
    pub fn blocking_client(&self) -> InterceptResult<Client> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.trust_all)
            .build()
            .map_err(Into::into)
    }
}

/// Lazily built clients for one pair of timeouts, one per trust state.
///
/// The client handed out follows [`ProcessTls`] at the time of the call, so
/// a switch to trust-all after the first request still takes effect.
#[derive(Debug)]
pub struct HttpClients {
    tls: Arc<ProcessTls>,
    connect_timeout: Duration,
    timeout: Duration,
    verifying: OnceLock<Option<Client>>,
    trusting: OnceLock<Option<Client>>,
}

impl HttpClients {
    pub const fn new(tls: Arc<ProcessTls>, connect_timeout: Duration, timeout: Duration) -> Self {
        Self {
            tls,
            connect_timeout,
            timeout,
            verifying: OnceLock::new(),
            trusting: OnceLock::new(),
        }
    }

    /// Client for the current process trust setting.
    pub fn client(&self) -> InterceptResult<&Client> {
        let policy = self.tls.policy(self.connect_timeout, self.timeout);
        let slot = if policy.trust_all {
            &self.trusting
        } else {
            &self.verifying
        };
        slot.get_or_init(|| {
            policy
                .blocking_client()
                .map_err(|e| {
                    tracing::warn!(
                        error = %e,
                        tls.trust_all = policy.trust_all,
                        "HTTP client unavailable"
                    );
                })
                .ok()
        })
        .as_ref()
        .ok_or(InterceptError::ClientUnavailable)
    }
}

/// Run blocking transport work where blocking is allowed.
///
/// Outside an async runtime `work` runs in place. Inside one it runs on a
/// scoped thread and the caller waits for it.
pub fn run_off_runtime<T, F>(work: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    if tokio::runtime::Handle::try_current().is_err() {
        return work();
    }
    std::thread::scope(|scope| match scope.spawn(work).join() {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_winner_installs() {
        let tls = ProcessTls::new();
        assert!(!tls.trusts_all());
        assert!(tls.ensure_trust_all());
        assert!(!tls.ensure_trust_all());
        assert!(tls.trusts_all());
    }

    #[test]
    fn concurrent_first_use_has_one_winner() {
        let tls = Arc::new(ProcessTls::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tls = Arc::clone(&tls);
                std::thread::spawn(move || tls.ensure_trust_all())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn policy_follows_process_setting() {
        let tls = ProcessTls::new();
        let before = tls.policy(Duration::from_millis(500), Duration::from_secs(1));
        assert!(!before.trust_all);

        tls.ensure_trust_all();
        let after = tls.policy(Duration::from_millis(500), Duration::from_secs(1));
        assert!(after.trust_all);
        assert_eq!(after.connect_timeout, Duration::from_millis(500));
    }

    #[test]
    fn builds_client() {
        let policy = ProcessTls::new().policy(Duration::from_secs(3), Duration::from_secs(15));
        assert!(!policy.trust_all);
        assert!(policy.blocking_client().is_ok());
    }

    #[test]
    fn clients_follow_later_trust_switch() {
        let tls = Arc::new(ProcessTls::new());
        let clients = HttpClients::new(
            Arc::clone(&tls),
            Duration::from_millis(500),
            Duration::from_secs(1),
        );

        let verifying: *const Client = clients.client().unwrap();
        assert!(std::ptr::eq(verifying, clients.client().unwrap()));

        tls.ensure_trust_all();
        let trusting: *const Client = clients.client().unwrap();
        assert!(!std::ptr::eq(verifying, trusting));
        assert!(std::ptr::eq(trusting, clients.client().unwrap()));
    }

    #[test]
    fn runs_in_place_without_runtime() {
        let caller = std::thread::current().id();
        assert_eq!(run_off_runtime(|| std::thread::current().id()), caller);
    }

    #[tokio::test]
    async fn leaves_runtime_thread_inside_runtime() {
        let caller = std::thread::current().id();
        let worker = run_off_runtime(|| std::thread::current().id());
        assert_ne!(worker, caller);
        assert_eq!(run_off_runtime(|| 7), 7);
    }
}
