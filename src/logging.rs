//! Diagnostics for both binaries via `tracing`, written to stderr.
//!
//! The final report of each binary goes to stdout with `println!` and is not
//! affected by `RUST_LOG`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "importkit=info,warn";
const VERBOSE_FILTER: &str = "importkit=debug,info";

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` if set, otherwise logs this crate at `info` (`debug` when
/// `verbose`) and everything else at `warn`.
pub fn init(verbose: bool) {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}
