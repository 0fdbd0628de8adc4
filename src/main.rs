//! JSON Validation Service entry point.
//!
//! Constructs the service and starts it. A failure in either step is
//! reported on stderr; it is not retried and does not change the exit code.

#[tokio::main]
async fn main() {
    json_validation_service::run().await;
}
