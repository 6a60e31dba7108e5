//! Property-based tests for routing, translation, optimization and decoupling.

use std::f64::consts::PI;
use std::sync::Arc;

use proptest::prelude::*;
use qpipe_compile::passes::target::decoupling::schedule_asap;
use qpipe_compile::passes::{BasisTranslation, DynamicalDecoupling, LocalOptimization};
use qpipe_compile::unitary::{equal_up_to_global_phase, ops_unitary};
use qpipe_compile::{
    BasisGates, BasisTranslator, CouplingMap, Device, EquivalenceLibrary, Pass, Pipeline,
    PipelineConfig, PropertySet,
};
use qpipe_ir::{Circuit, CircuitBuilder, ClbitId, Instruction, QubitId, StandardGate};

#[derive(Debug, Clone)]
enum Op {
    H(u32),
    Sx(u32),
    Rz(f64, u32),
    Rx(f64, u32),
    Cx(u32, u32),
    Swap(u32, u32),
    Measure(u32),
}

fn arb_op(num_qubits: u32, native_only: bool) -> BoxedStrategy<Op> {
    let single = if native_only {
        prop_oneof![
            (0..num_qubits).prop_map(Op::Sx),
            (-PI..PI, 0..num_qubits).prop_map(|(a, q)| Op::Rz(a, q)),
            (0..num_qubits).prop_map(Op::Measure),
        ]
        .boxed()
    } else {
        prop_oneof![
            (0..num_qubits).prop_map(Op::H),
            (0..num_qubits).prop_map(Op::Sx),
            (-PI..PI, 0..num_qubits).prop_map(|(a, q)| Op::Rz(a, q)),
            (-PI..PI, 0..num_qubits).prop_map(|(a, q)| Op::Rx(a, q)),
        ]
        .boxed()
    };
    if num_qubits < 2 {
        return single;
    }
    let pair = (0..num_qubits, 0..num_qubits).prop_filter("operands must differ", |(a, b)| a != b);
    if native_only {
        return prop_oneof![3 => single, 2 => pair.prop_map(|(a, b)| Op::Cx(a, b))].boxed();
    }
    prop_oneof![
        3 => single,
        2 => pair.clone().prop_map(|(a, b)| Op::Cx(a, b)),
        1 => pair.prop_map(|(a, b)| Op::Swap(a, b)),
    ]
    .boxed()
}

fn build(n: u32, ops: Vec<Op>, measure: bool) -> Circuit {
    let mut b = CircuitBuilder::new("prop", n, n);
    for op in ops {
        let appended = match op {
            Op::H(q) => b.h(QubitId(q)).map(|_| ()),
            Op::Sx(q) => b.sx(QubitId(q)).map(|_| ()),
            Op::Rz(a, q) => b.rz(a, QubitId(q)).map(|_| ()),
            Op::Rx(a, q) => b.rx(a, QubitId(q)).map(|_| ()),
            Op::Cx(a, c) => b.cx(QubitId(a), QubitId(c)).map(|_| ()),
            Op::Swap(a, c) => b.swap(QubitId(a), QubitId(c)).map(|_| ()),
            Op::Measure(q) => b.measure(QubitId(q), ClbitId(q)).map(|_| ()),
        };
        appended.unwrap();
    }
    if measure {
        b.measure_all().unwrap();
    }
    b.build()
}

fn arb_circuit(max_qubits: u32) -> impl Strategy<Value = Circuit> {
    (1_u32..=max_qubits).prop_flat_map(|n| {
        (prop::collection::vec(arb_op(n, false), 0..=25), any::<bool>())
            .prop_map(move |(ops, measure)| build(n, ops, measure))
    })
}

/// Circuits already in the `rz sx cx` basis, with mid-circuit measurements.
fn arb_native_circuit(max_qubits: u32) -> impl Strategy<Value = Circuit> {
    (1_u32..=max_qubits).prop_flat_map(|n| {
        prop::collection::vec(arb_op(n, true), 0..=30).prop_map(move |ops| build(n, ops, false))
    })
}

fn arb_device() -> impl Strategy<Value = Device> {
    prop_oneof![
        Just(CouplingMap::linear(5)),
        Just(CouplingMap::ring(6)),
        Just(CouplingMap::grid(2, 3)),
        Just(CouplingMap::star(5)),
    ]
    .prop_map(|coupling| Device::new("prop", BasisGates::ibm(), coupling))
}

fn arb_gate() -> impl Strategy<Value = StandardGate> {
    let angle = -2.0 * PI..2.0 * PI;
    prop_oneof![
        Just(StandardGate::X),
        Just(StandardGate::Y),
        Just(StandardGate::Z),
        Just(StandardGate::H),
        Just(StandardGate::S),
        Just(StandardGate::Sdg),
        Just(StandardGate::T),
        Just(StandardGate::Tdg),
        Just(StandardGate::SX),
        Just(StandardGate::SXdg),
        angle.clone().prop_map(|a| StandardGate::Rx(a.into())),
        angle.clone().prop_map(|a| StandardGate::Ry(a.into())),
        angle.clone().prop_map(|a| StandardGate::Rz(a.into())),
        angle.clone().prop_map(|a| StandardGate::P(a.into())),
        (angle.clone(), angle.clone(), angle.clone())
            .prop_map(|(t, p, l)| StandardGate::U(t.into(), p.into(), l.into())),
        (angle.clone(), angle.clone()).prop_map(|(t, p)| StandardGate::PRX(t.into(), p.into())),
        Just(StandardGate::CX),
        Just(StandardGate::CY),
        Just(StandardGate::CZ),
        Just(StandardGate::CH),
        Just(StandardGate::Swap),
        Just(StandardGate::ISwap),
        angle.clone().prop_map(|a| StandardGate::CRz(a.into())),
        angle.clone().prop_map(|a| StandardGate::CP(a.into())),
        angle.prop_map(|a| StandardGate::RZZ(a.into())),
        Just(StandardGate::CCX),
    ]
}

fn timed_device(n: u32) -> Arc<Device> {
    Arc::new(
        Device::new("timed", BasisGates::ibm(), CouplingMap::full(n))
            .with_duration("rz", 0)
            .with_duration("sx", 35)
            .with_duration("x", 35)
            .with_duration("cx", 300)
            .with_duration("measure", 1000),
    )
}

fn translate(circuit: Circuit, device: &Arc<Device>) -> (Circuit, Arc<BasisTranslator>) {
    let translator = Arc::new(BasisTranslator::new(EquivalenceLibrary::standard(), device));
    let mut props = PropertySet::new(device.clone());
    let out = BasisTranslation::new(translator.clone())
        .run(circuit, &mut props)
        .unwrap();
    (out, translator)
}

proptest! {
    #[test]
    fn routed_two_qubit_ops_are_adjacent(
        circuit in arb_circuit(5),
        device in arb_device(),
        level in 0_u8..=3,
        seed in any::<u64>(),
    ) {
        let device = Arc::new(device);
        let config = PipelineConfig::default()
            .with_optimization_level(level)
            .unwrap()
            .with_seed(seed);
        let pipeline = Pipeline::new(device.clone(), config).unwrap();
        let compiled = pipeline.compile(&circuit).unwrap();
        for op in compiled.circuit.ops() {
            if op.is_gate() && op.qubits.len() == 2 {
                prop_assert!(
                    device.are_connected(op.qubits[0].0, op.qubits[1].0),
                    "{} on {:?} is not adjacent",
                    op.name(),
                    op.qubits
                );
            }
        }
        prop_assert_eq!(
            compiled.circuit.ops().iter().filter(|op| op.is_measure()).count(),
            circuit.ops().iter().filter(|op| op.is_measure()).count()
        );
    }

    #[test]
    fn every_rule_preserves_the_unitary(gate in arb_gate()) {
        let library = EquivalenceLibrary::standard();
        let n = gate.num_qubits();
        let qubits: Vec<QubitId> = (0..n).map(QubitId).collect();
        let source = ops_unitary(n, &[Instruction::gate(gate.clone(), qubits.clone())]).unwrap();
        for rule in library.rules_for(gate.name()) {
            let rewritten = ops_unitary(n, &rule.apply(&gate, &qubits)).unwrap();
            prop_assert!(
                equal_up_to_global_phase(&source, &rewritten, 1e-9),
                "rule {:?} is not equivalent for {:?}",
                rule,
                gate
            );
        }
    }

    #[test]
    fn translation_preserves_the_unitary(gate in arb_gate()) {
        let n = gate.num_qubits();
        let qubits: Vec<QubitId> = (0..n).map(QubitId).collect();
        let source = ops_unitary(n, &[Instruction::gate(gate.clone(), qubits.clone())]).unwrap();
        for basis in [BasisGates::ibm(), BasisGates::heron(), BasisGates::iqm()] {
            let device = Device::new("d", basis, CouplingMap::full(3));
            let translator = BasisTranslator::new(EquivalenceLibrary::standard(), &device);
            let translated = translator.translate(&gate, &qubits, 0.0).unwrap();
            prop_assert!(translated.iter().all(|op| device.is_native_gate(op.name())));
            let target = ops_unitary(n, &translated).unwrap();
            prop_assert!(equal_up_to_global_phase(&source, &target, 1e-9));
        }
    }

    #[test]
    fn local_optimization_is_idempotent(circuit in arb_circuit(4), iqm in any::<bool>()) {
        let basis = if iqm { BasisGates::iqm() } else { BasisGates::ibm() };
        let device = Arc::new(Device::new("d", basis, CouplingMap::full(4)));
        let (translated, translator) = translate(circuit, &device);
        let pass = LocalOptimization::new(translator);
        let n = translated.num_qubits();
        let once = pass.optimize(translated.ops().to_vec(), n, 1e-10);
        let twice = pass.optimize(once.clone(), n, 1e-10);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn local_optimization_preserves_the_unitary(
        ops in (1_u32..=3).prop_flat_map(|n| {
            (Just(n), prop::collection::vec(arb_op(n, false), 0..=20))
        }),
    ) {
        let (n, ops) = ops;
        let circuit = build(n, ops, false);
        let device = Arc::new(Device::new("d", BasisGates::ibm(), CouplingMap::full(3)));
        let (translated, translator) = translate(circuit.clone(), &device);
        let optimized = LocalOptimization::new(translator).optimize(translated.ops().to_vec(), n, 1e-10);
        let before = ops_unitary(n, circuit.ops()).unwrap();
        let after = ops_unitary(n, &optimized).unwrap();
        prop_assert!(equal_up_to_global_phase(&before, &after, 1e-8));
    }

    #[test]
    fn decoupling_keeps_order_and_timing(circuit in arb_native_circuit(4)) {
        let device = timed_device(4);
        let translator = Arc::new(BasisTranslator::new(EquivalenceLibrary::standard(), &device));
        let mut props = PropertySet::new(device.clone());
        let out = DynamicalDecoupling::new(translator).run(circuit.clone(), &mut props).unwrap();

        // Inserted pulses are X gates and delays; the input has neither.
        let original: Vec<usize> = out
            .ops()
            .iter()
            .enumerate()
            .filter(|(_, op)| !matches!(op.name(), "x" | "delay"))
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(original.len(), circuit.len());

        let before = schedule_asap(&circuit, &device);
        let after = schedule_asap(&out, &device);
        for (i, &k) in original.iter().enumerate() {
            prop_assert_eq!(&out.ops()[k], &circuit.ops()[i]);
            prop_assert_eq!(after[k], before[i]);
        }
        let makespan = |s: &[(u64, u64)]| s.iter().map(|&(_, end)| end).max().unwrap_or(0);
        prop_assert_eq!(makespan(&after), makespan(&before));
    }
}
