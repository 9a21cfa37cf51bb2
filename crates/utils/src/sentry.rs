use tracing_subscriber::{Layer, registry::LookupSpan};

/// Forwards `error!` events to Sentry and records lower levels as breadcrumbs.
///
/// The layer is inert until `sentry::init` has been called with a DSN.
pub fn sentry_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    sentry_tracing::layer()
}
