use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Console logging for the demo.
///
/// `RUST_LOG` wins when set; otherwise crate logs go out at `info`
/// (`debug` when verbose) and everything else at `warn`.
pub fn init_default_tracing(verbose: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE);

    // A subscriber may already be installed (tests, embedding apps).
    let _ = Registry::default()
        .with(console_filter(verbose))
        .with(fmt_layer)
        .try_init();
}

/// Filter for the stderr layer, shared with the Langfuse setup.
pub(crate) fn console_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,toolcall_demo=debug,tool=debug"
    } else {
        "warn,toolcall_demo=info,tool=info"
    }
}
