//! Optional Sentry error tracking integration.
//!
//! Initializes the Sentry SDK with the provided DSN and environment.
//! The returned guard must be held for the lifetime of the application
//! to ensure errors and panics are reported. Upstream failures logged at
//! `warn` and above reach Sentry through the tracing layer installed in
//! [`logging::init`](crate::logging::init).

pub fn init(dsn: &str, environment: Option<&str>) -> sentry::ClientInitGuard {
    let parsed_dsn = match dsn.parse() {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(error = %e, "invalid Sentry DSN, error tracking disabled");
            None
        }
    };

    sentry::init(sentry::ClientOptions {
        dsn: parsed_dsn,
        environment: environment.map(|e| e.to_string().into()),
        release: Some(
            format!(
                "turnstile@{}+{}",
                env!("CARGO_PKG_VERSION"),
                env!("TURNSTILE_GIT_SHORT")
            )
            .into(),
        ),
        ..Default::default()
    })
}
