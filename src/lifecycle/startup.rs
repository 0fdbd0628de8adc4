//! Startup orchestration.
//!
//! # Responsibilities
//! - Construct the service, then start it
//! - Report a construction or startup failure to the error stream
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, nothing is retried
//! - The failure stops here; callers only see an [`Outcome`]

use std::future::Future;
use std::io::{self, Write};

use crate::error::JvsError;
use crate::service::JsonValidationService;

/// Anything the entry point can start.
pub trait Service {
    fn start(self) -> impl Future<Output = Result<(), JvsError>> + Send;
}

impl Service for JsonValidationService {
    fn start(self) -> impl Future<Output = Result<(), JvsError>> + Send {
        JsonValidationService::start(self)
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The service started and later shut down cleanly.
    Stopped,
    /// Construction or startup failed; the failure was reported.
    Failed,
}

/// Construct and start the validation service, reporting failure on stderr.
pub async fn run() -> Outcome {
    run_with(JsonValidationService::new, &mut io::stderr()).await
}

/// Construct a service with `construct`, start it, and write any failure to `err_out`.
pub async fn run_with<S, F, W>(construct: F, err_out: &mut W) -> Outcome
where
    S: Service,
    F: FnOnce() -> Result<S, JvsError>,
    W: Write,
{
    let result = match construct() {
        Ok(service) => service.start().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => Outcome::Stopped,
        Err(e) => {
            tracing::error!(error = %e, causes = ?e.chain(), "Service failed");
            report_failure(&e, err_out);
            Outcome::Failed
        }
    }
}

/// Write `err` followed by each of its causes to `out`.
pub fn report_failure<W: Write>(err: &JvsError, out: &mut W) {
    let mut chain = err.chain().into_iter();
    let mut text = String::new();
    if let Some(head) = chain.next() {
        text.push_str(&format!("error: {head}\n"));
    }
    for cause in chain {
        text.push_str(&format!("  caused by: {cause}\n"));
    }

    // Nothing sensible is left to do if stderr itself is gone.
    let _ = out.write_all(text.as_bytes()).and_then(|()| out.flush());
}
