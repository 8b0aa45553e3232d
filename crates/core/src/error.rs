use thiserror::Error;

/// Failure taxonomy for the outbound API clients. Every call is attempted
/// exactly once; none of these are retried.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A credential or environment value the client needs is absent. Fatal to
    /// the request, not to the process.
    #[error("missing configuration: {0}")]
    Configuration(String),

    /// Transport failure or non-success HTTP status from an upstream API. The
    /// raw status and body ride along for diagnostics.
    #[error("{service} request failed: {detail}")]
    Upstream {
        service: &'static str,
        detail: String,
    },

    /// The directions service answered, but with a non-"OK" status (or an "OK"
    /// payload carrying no routes).
    #[error("directions status '{status}': {message}")]
    NoRouteFound { status: String, message: String },

    /// The response body did not match the expected shape.
    #[error("could not parse {service} response: {detail}")]
    Parse {
        service: &'static str,
        detail: String,
    },
}
