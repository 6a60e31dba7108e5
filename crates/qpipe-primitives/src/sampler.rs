//! Sampling mode.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, instrument};

use qpipe_hal::Backend;
use qpipe_ir::Circuit;

use crate::cancel::CancellationToken;
use crate::dispatch::Dispatcher;
use crate::error::{PrimitiveError, PrimitiveResult};
use crate::quasi::QuasiDistribution;

/// Default shots per circuit.
pub const DEFAULT_SHOTS: u32 = 1024;

/// Runs measured circuits and returns one distribution per circuit.
///
/// ```rust
/// use std::sync::Arc;
/// use qpipe_adapter_sim::SimulatorBackend;
/// use qpipe_ir::Circuit;
/// use qpipe_primitives::Sampler;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sampler = Sampler::new(Arc::new(SimulatorBackend::new().with_seed(7)));
/// let results = sampler.run(&[Circuit::bell()?]).await?;
/// let dist = results[0].as_ref().unwrap();
/// assert!((dist.get("00") + dist.get("11") - 1.0).abs() < 1e-12);
/// # Ok(())
/// # }
/// ```
pub struct Sampler {
    dispatcher: Dispatcher,
}

impl Sampler {
    /// Sample on `backend` with [`DEFAULT_SHOTS`] and no timeout.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            dispatcher: Dispatcher {
                backend,
                shots: DEFAULT_SHOTS,
                timeout: None,
            },
        }
    }

    /// Set the shots per circuit.
    #[must_use]
    pub fn with_shots(mut self, shots: u32) -> Self {
        self.dispatcher.shots = shots;
        self
    }

    /// Give up on any single circuit after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher.timeout = Some(timeout);
        self
    }

    /// Shots per circuit.
    pub fn shots(&self) -> u32 {
        self.dispatcher.shots
    }

    /// Sample every circuit.
    ///
    /// The outer error rejects the whole call; each slot of the returned
    /// vector holds that circuit's distribution or failure, in input order.
    pub async fn run(
        &self,
        circuits: &[Circuit],
    ) -> PrimitiveResult<Vec<PrimitiveResult<QuasiDistribution>>> {
        self.run_cancellable(circuits, &CancellationToken::new())
            .await
    }

    /// [`run`](Self::run), abandoning pending circuits once `cancel` fires.
    #[instrument(skip_all, fields(circuits = circuits.len(), shots = self.dispatcher.shots))]
    pub async fn run_cancellable(
        &self,
        circuits: &[Circuit],
        cancel: &CancellationToken,
    ) -> PrimitiveResult<Vec<PrimitiveResult<QuasiDistribution>>> {
        if self.dispatcher.shots == 0 {
            return Err(PrimitiveError::InvalidShots);
        }
        info!(
            "Sampling {} circuits on {}",
            circuits.len(),
            self.dispatcher.backend.name()
        );

        let shots = self.dispatcher.shots;
        let tasks = circuits.iter().enumerate().map(|(index, circuit)| async move {
            if !circuit.has_measurements() {
                return Err(PrimitiveError::NoMeasurement { index });
            }
            let counts = self.dispatcher.execute(index, circuit, cancel).await?;
            Ok(QuasiDistribution::from_counts(&counts, shots))
        });
        Ok(join_all(tasks).await)
    }
}
