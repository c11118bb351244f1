//! Logging setup.
//!
//! Call [`init`] once at the start of `main`. `RUST_LOG` takes precedence
//! over the filter passed in.

use tracing_subscriber::EnvFilter;

use crate::error::{RuntimeError, RuntimeResult};

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_FILTER: &str = "info";

/// Installs a `fmt` subscriber filtered by `RUST_LOG` or else `filter`.
///
/// # Errors
///
/// [`RuntimeError::Logging`] if `filter` does not parse or a global
/// subscriber is already installed. Callers may ignore the latter.
pub fn init(filter: &str) -> RuntimeResult<()> {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(val) if !val.is_empty() => EnvFilter::try_new(val),
        _ => EnvFilter::try_new(filter),
    }
    .map_err(|e| RuntimeError::Logging(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| RuntimeError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        // The first call may lose to another test in this binary.
        let _ = init("warn");
        assert!(matches!(init("warn"), Err(RuntimeError::Logging(_))));
    }
}
