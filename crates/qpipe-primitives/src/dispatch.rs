//! Backend dispatch with timeout and cancellation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use qpipe_hal::{Backend, Counts};
use qpipe_ir::Circuit;

use crate::cancel::CancellationToken;
use crate::error::{PrimitiveError, PrimitiveResult};

/// How one batch reaches the backend.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    pub backend: Arc<dyn Backend>,
    pub shots: u32,
    pub timeout: Option<Duration>,
}

impl Dispatcher {
    /// Execute one circuit on behalf of input `index`.
    ///
    /// Cancellation is checked before the backend is polled, so an already
    /// cancelled token never reaches the backend.
    pub async fn execute(
        &self,
        index: usize,
        circuit: &Circuit,
        cancel: &CancellationToken,
    ) -> PrimitiveResult<Counts> {
        debug!(
            "Dispatching circuit {index} ('{}') to {} with {} shots",
            circuit.name(),
            self.backend.name(),
            self.shots
        );
        let run = async {
            let result = match self.timeout {
                Some(limit) => tokio::time::timeout(limit, self.backend.execute(circuit, self.shots))
                    .await
                    .map_err(|_| {
                        warn!("Circuit {index} timed out after {limit:?}");
                        PrimitiveError::ExecutionTimeout {
                            index,
                            timeout: limit,
                        }
                    })?,
                None => self.backend.execute(circuit, self.shots).await,
            };
            result
                .map(|r| r.counts)
                .map_err(|source| PrimitiveError::Backend { index, source })
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                warn!("Circuit {index} cancelled");
                Err(PrimitiveError::Cancelled { index })
            }
            result = run => result,
        }
    }
}
