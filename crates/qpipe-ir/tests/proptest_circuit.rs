//! Property-based tests for circuit construction and dependency queries.

use proptest::prelude::*;
use qpipe_ir::{Circuit, CircuitBuilder, ClbitId, QubitId};

#[derive(Debug, Clone)]
enum Op {
    H(u32),
    Rz(f64, u32),
    Cx(u32, u32),
    Measure(u32),
}

fn arb_op(num_qubits: u32) -> impl Strategy<Value = Op> {
    if num_qubits < 2 {
        prop_oneof![
            (0..num_qubits).prop_map(Op::H),
            (-3.0_f64..3.0, 0..num_qubits).prop_map(|(a, q)| Op::Rz(a, q)),
            (0..num_qubits).prop_map(Op::Measure),
        ]
        .boxed()
    } else {
        prop_oneof![
            (0..num_qubits).prop_map(Op::H),
            (-3.0_f64..3.0, 0..num_qubits).prop_map(|(a, q)| Op::Rz(a, q)),
            (0..num_qubits, 0..num_qubits)
                .prop_filter("operands must differ", |(a, b)| a != b)
                .prop_map(|(a, b)| Op::Cx(a, b)),
            (0..num_qubits).prop_map(Op::Measure),
        ]
        .boxed()
    }
}

fn arb_circuit() -> impl Strategy<Value = Circuit> {
    (1_u32..=5).prop_flat_map(|n| {
        prop::collection::vec(arb_op(n), 0..=20).prop_map(move |ops| {
            let mut b = CircuitBuilder::new("prop", n, n);
            for op in ops {
                let appended = match op {
                    Op::H(q) => b.h(QubitId(q)).map(|_| ()),
                    Op::Rz(a, q) => b.rz(a, QubitId(q)).map(|_| ()),
                    Op::Cx(a, c) => b.cx(QubitId(a), QubitId(c)).map(|_| ()),
                    Op::Measure(q) => b.measure(QubitId(q), ClbitId(q)).map(|_| ()),
                };
                appended.unwrap();
            }
            b.build()
        })
    })
}

proptest! {
    #[test]
    fn dag_depth_agrees_with_circuit(circuit in arb_circuit()) {
        prop_assert_eq!(circuit.to_dag().depth(), circuit.depth());
    }

    #[test]
    fn dag_edges_only_join_ops_sharing_a_resource(circuit in arb_circuit()) {
        let dag = circuit.to_dag();
        for i in 0..circuit.len() {
            for j in dag.successors(i) {
                prop_assert!(i < j);
                prop_assert!(circuit.shares_resource(i, j));
            }
        }
    }

    #[test]
    fn from_ops_accepts_its_own_output(circuit in arb_circuit()) {
        let rebuilt = Circuit::from_ops(
            circuit.name(),
            circuit.num_qubits(),
            circuit.num_clbits(),
            circuit.ops().to_vec(),
        ).unwrap();
        prop_assert_eq!(rebuilt, circuit);
    }
}
