//! Internal diagnostics through `tracing`.

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset.
pub const fn default_directive(diagnostics: bool) -> &'static str {
    if diagnostics {
        "sidereal_intercept=debug"
    } else {
        "sidereal_intercept=info"
    }
}

/// Install a stderr fmt subscriber.
///
/// Stdout carries emitted log records, so diagnostics never go there. Returns
/// `false` when the host already installed a global subscriber, which is then
/// left in place.
pub fn init_tracing(diagnostics: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(diagnostics)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_follows_diagnostics() {
        assert_eq!(default_directive(false), "sidereal_intercept=info");
        assert_eq!(default_directive(true), "sidereal_intercept=debug");
    }

    #[test]
    fn second_init_is_refused() {
        init_tracing(false);
        assert!(!init_tracing(true));
    }
}
