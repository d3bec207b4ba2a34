use std::{fmt::Display, future::Future, time::Duration};

use tokio_util::sync::CancellationToken;

use super::errors::{AppError, Service};

/// Bounds every call to an external service with a timeout and a
/// cancellation token. No registry lock may be held while awaiting one.
#[derive(Debug, Clone)]
pub struct ExternalCalls {
    timeout: Duration,
}

impl ExternalCalls {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn run<T, E, F>(
        &self,
        service: Service,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, AppError>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                log::info!("{service} call cancelled by caller");
                Err(AppError::Cancelled)
            }

            result = tokio::time::timeout(self.timeout, call) => match result {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => {
                    log::warn!("{service} call failed: {err}");
                    Err(AppError::external(service, err))
                }
                Err(_) => {
                    log::warn!("{service} call timed out after {:?}", self.timeout);
                    Err(AppError::external(
                        service,
                        format!("timed out after {:?}", self.timeout),
                    ))
                }
            },
        }
    }
}
