// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

mod error_log;
mod shutdown;

pub use error_log::{append_fatal, format_fatal, ERROR_LOG_FILE};
pub use shutdown::ShutdownSignal;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
