//! This module provides a built-in logger implementation.
//!
//! The built-in logger implementation uses the `env_logger` crate. It is
//! enabled by the Cargo feature "builtin_env_logger", which is enabled by
//! default. When enabled, a binding can call [`try_init`] once during startup
//! and will see logs of level INFO or lower by default.
//!
//! Some bindings may wish to choose a different implementation, or integrate
//! with their own VM's logging framework. In such cases, disable the Cargo
//! feature "builtin_env_logger" and register a `log` implementation of the
//! binding's own choosing before using this crate.

/// Attempt to init an `env_logger` for this crate.
///
/// Does nothing if the "builtin_env_logger" feature is disabled, or if a
/// logger has already been installed (by this crate or by the host process).
pub fn try_init() {
    cfg_if::cfg_if! {
        if #[cfg(feature = "builtin_env_logger")] {
            let result = env_logger::try_init_from_env(
                env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
            );

            match result {
                Ok(()) => {
                    debug!("gc-forwarding initialized the logger.");
                }
                Err(e) => {
                    debug!("gc-forwarding failed to initialize the built-in env_logger: {e}");
                }
            }
        } else {
            debug!("gc-forwarding didn't initialize the built-in env_logger. The Cargo feature \"builtin_env_logger\" is not enabled.");
        }
    }
}
