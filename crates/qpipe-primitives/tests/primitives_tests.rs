//! Sampler and estimator behaviour against stub and simulated backends.

use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use qpipe_adapter_sim::SimulatorBackend;
use qpipe_compile::{BasisGates, CompiledCircuit, CouplingMap, Device, Pipeline, PipelineConfig};
use qpipe_hal::{Backend, Capabilities, Counts, ExecutionResult, HalError, HalResult};
use qpipe_ir::{Circuit, CircuitBuilder, ParameterBindings, ParameterExpression, QubitId};
use qpipe_primitives::{CancellationToken, Estimator, Observable, PrimitiveError, Sampler};

/// Answers 512/512 on "00"/"11"; sleeps on circuits named "slow", fails on "bad".
struct Stub {
    capabilities: Capabilities,
}

impl Stub {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            capabilities: Capabilities::simulator(8).with_name("stub"),
        })
    }
}

#[async_trait]
impl Backend for Stub {
    fn name(&self) -> &str {
        &self.capabilities.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn execute(&self, circuit: &Circuit, shots: u32) -> HalResult<ExecutionResult> {
        match circuit.name() {
            "slow" => tokio::time::sleep(Duration::from_secs(3600)).await,
            "bad" => return Err(HalError::JobFailed("queue rejected job".into())),
            _ => {}
        }
        Ok(ExecutionResult::new(
            Counts::from_pairs([("00", 512), ("11", 512)]),
            shots,
        ))
    }
}

fn named(name: &str) -> Circuit {
    let mut b = CircuitBuilder::new(name, 2, 2);
    b.h(QubitId(0))
        .unwrap()
        .cx(QubitId(0), QubitId(1))
        .unwrap()
        .measure_all()
        .unwrap();
    b.build()
}

fn unmeasured_bell() -> Circuit {
    let mut b = CircuitBuilder::new("bell_state", 2, 0);
    b.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();
    b.build()
}

#[tokio::test]
async fn test_scenario_a_sampling() {
    let device = Arc::new(Device::new(
        "pair",
        BasisGates::new(["rz", "sx", "cx"]),
        CouplingMap::linear(2),
    ));
    let pipeline = Pipeline::new(device.clone(), PipelineConfig::default()).unwrap();
    let compiled = pipeline.compile(&Circuit::bell().unwrap()).unwrap();

    for op in compiled.circuit.ops() {
        if op.is_gate() {
            assert!(["rz", "sx", "cx"].contains(&op.name()), "{}", op.name());
        }
        if op.name() == "cx" {
            assert!(device.are_connected(op.qubits[0].0, op.qubits[1].0));
        }
    }

    let sampler = Sampler::new(Stub::new()).with_shots(1024);
    let results = sampler.run(&[compiled.circuit]).await.unwrap();
    let dist = results[0].as_ref().unwrap();
    assert_eq!(dist.len(), 2);
    assert_eq!(dist.get("00"), 0.5);
    assert_eq!(dist.get("11"), 0.5);
}

#[tokio::test]
async fn test_no_measurement_is_per_index() {
    let sampler = Sampler::new(Stub::new());
    let results = sampler
        .run(&[named("ok"), unmeasured_bell()])
        .await
        .unwrap();
    assert!(results[0].is_ok());
    assert_eq!(results[1], Err(PrimitiveError::NoMeasurement { index: 1 }));
}

#[tokio::test]
async fn test_zero_shots_rejects_call() {
    let sampler = Sampler::new(Stub::new()).with_shots(0);
    assert_eq!(
        sampler.run(&[named("ok")]).await,
        Err(PrimitiveError::InvalidShots)
    );
}

#[tokio::test(start_paused = true)]
async fn test_timeout_keeps_other_results() {
    let sampler = Sampler::new(Stub::new()).with_timeout(Duration::from_secs(5));
    let results = sampler
        .run(&[named("first"), named("slow"), named("third")])
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert_eq!(
        results[1],
        Err(PrimitiveError::ExecutionTimeout {
            index: 1,
            timeout: Duration::from_secs(5)
        })
    );
    assert!(results[2].is_ok());
}

#[tokio::test]
async fn test_backend_failure_is_transient_and_isolated() {
    let sampler = Sampler::new(Stub::new());
    let results = sampler.run(&[named("bad"), named("good")]).await.unwrap();
    let err = results[0].clone().unwrap_err();
    assert!(err.is_transient());
    assert!(matches!(err, PrimitiveError::Backend { index: 0, .. }));
    assert_eq!(results[1].as_ref().unwrap().get("11"), 0.5);
}

#[tokio::test]
async fn test_cancelled_before_dispatch() {
    let token = CancellationToken::new();
    token.cancel();
    let sampler = Sampler::new(Stub::new());
    let results = sampler
        .run_cancellable(&[named("a"), named("b")], &token)
        .await
        .unwrap();
    assert_eq!(results[0], Err(PrimitiveError::Cancelled { index: 0 }));
    assert_eq!(results[1], Err(PrimitiveError::Cancelled { index: 1 }));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_abandons_pending() {
    let token = CancellationToken::new();
    let sampler = Sampler::new(Stub::new());
    let circuits = [named("fast"), named("slow")];
    let (results, ()) = tokio::join!(sampler.run_cancellable(&circuits, &token), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    });
    let results = results.unwrap();
    assert!(results[0].is_ok());
    assert_eq!(results[1], Err(PrimitiveError::Cancelled { index: 1 }));
}

#[tokio::test]
async fn test_simulated_sampling() {
    let sampler = Sampler::new(Arc::new(SimulatorBackend::new().with_seed(11))).with_shots(2000);
    let results = sampler.run(&[Circuit::ghz(3).unwrap()]).await.unwrap();
    let dist = results[0].as_ref().unwrap();
    assert!((dist.get("000") + dist.get("111") - 1.0).abs() < 1e-12);
    let ints = dist.int_probabilities().unwrap();
    assert!(ints.keys().all(|&k| k == 0 || k == 7));
}

#[tokio::test]
async fn test_estimator_bell_correlations() {
    let estimator = Estimator::new(Arc::new(SimulatorBackend::new().with_seed(5)));
    let circuit = CompiledCircuit::unmapped(unmeasured_bell());
    let observables: Vec<Observable> = ["ZZ", "XX", "YY", "2*II + 0.5*ZZ"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    let circuits = vec![circuit; observables.len()];
    let values = estimator.run(&circuits, &observables, &[]).await.unwrap();
    let values: Vec<f64> = values.into_iter().map(Result::unwrap).collect();
    assert!((values[0] - 1.0).abs() < 1e-9);
    assert!((values[1] - 1.0).abs() < 1e-9);
    assert!((values[2] + 1.0).abs() < 1e-9);
    assert!((values[3] - 2.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_estimator_follows_final_layout() {
    // Virtual qubits land on physical 1 and 2 of a 3-qubit line.
    let device = Arc::new(Device::new("line", BasisGates::ibm(), CouplingMap::linear(3)));
    let config = PipelineConfig::default().with_layout_mapping(vec![2, 1]);
    let pipeline = Pipeline::new(device.clone(), config).unwrap();

    let mut b = CircuitBuilder::new("flip", 2, 0);
    b.x(QubitId(1)).unwrap();
    let compiled = pipeline.compile(&b.build()).unwrap();
    assert_eq!(compiled.physical_qubit(QubitId(1)), Some(1));

    let estimator = Estimator::new(Arc::new(SimulatorBackend::new())).with_device(&device);
    let observables = [
        Observable::from_list([("IZ", 1.0)]).unwrap(),
        Observable::from_list([("ZI", 1.0)]).unwrap(),
    ];
    let circuits = vec![compiled; 2];
    let values = estimator.run(&circuits, &observables, &[]).await.unwrap();
    assert!((values[0].clone().unwrap() - 1.0).abs() < 1e-9);
    assert!((values[1].clone().unwrap() + 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_estimator_parameter_bindings() {
    let mut b = CircuitBuilder::new("rot", 1, 0);
    b.rx(ParameterExpression::symbol("theta"), QubitId(0)).unwrap();
    let circuit = CompiledCircuit::unmapped(b.build());

    let bind = |theta: f64| {
        let mut bindings = ParameterBindings::new();
        bindings.insert("theta".into(), theta);
        bindings
    };
    let z: Observable = "Z".parse().unwrap();
    let estimator = Estimator::new(Arc::new(SimulatorBackend::new()));
    let values = estimator
        .run(
            &[circuit.clone(), circuit.clone(), circuit.clone()],
            &[z.clone(), z.clone(), z.clone()],
            &[bind(0.0), bind(PI), ParameterBindings::new()],
        )
        .await
        .unwrap();
    assert!((values[0].clone().unwrap() - 1.0).abs() < 1e-9);
    assert!((values[1].clone().unwrap() + 1.0).abs() < 1e-9);
    assert_eq!(
        values[2],
        Err(PrimitiveError::UnboundParameter {
            index: 2,
            names: vec!["theta".into()]
        })
    );

    // Without bindings the circuit stays parameterized.
    let values = estimator.run(&[circuit], &[z], &[]).await.unwrap();
    assert!(matches!(values[0], Err(PrimitiveError::UnboundParameter { index: 0, .. })));
}

#[tokio::test]
async fn test_estimator_shape_and_width_checks() {
    let estimator = Estimator::new(Stub::new());
    let circuit = CompiledCircuit::unmapped(unmeasured_bell());
    let zz: Observable = "ZZ".parse().unwrap();

    let err = estimator
        .run(&[circuit.clone(), circuit.clone()], &[zz.clone()], &[])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PrimitiveError::ShapeMismatch {
            what: "observables",
            expected: 2,
            actual: 1
        }
    );

    let err = estimator
        .run(&[circuit.clone()], &[zz], &[ParameterBindings::new(), ParameterBindings::new()])
        .await
        .unwrap_err();
    assert!(matches!(err, PrimitiveError::ShapeMismatch { what: "parameter bindings", .. }));

    let wide: Observable = "ZZZ".parse().unwrap();
    let values = estimator.run(&[circuit], &[wide], &[]).await.unwrap();
    assert!(matches!(values[0], Err(PrimitiveError::InvalidObservable(_))));
}

#[tokio::test]
async fn test_estimator_uses_stub_counts() {
    // Stub always answers 00/11, so any ZZ-type parity is +1.
    let estimator = Estimator::new(Stub::new()).with_shots(1024);
    let circuit = CompiledCircuit::unmapped(unmeasured_bell());
    let obs: Observable = "ZZ + -1*ZI".parse().unwrap();
    let values = estimator.run(&[circuit], &[obs], &[]).await.unwrap();
    // ZZ: +1. ZI reads clbit 1 of the group circuit: half ones, so 0.
    assert!((values[0].clone().unwrap() - 1.0).abs() < 1e-12);
}
