//! Random operation sequences never break the supply forest or the load
//! accounting.

mod common;

use power_grid_router::backend::{DeviceAction, NodeAction, SimulationKind};
use power_grid_router::domain::{DeviceType, NodeId};
use proptest::prelude::*;

use common::{assert_consistent, backend_with, small_generator};

#[derive(Debug, Clone)]
enum Op {
    SetCapacity(usize, f64),
    AddNode(usize),
    DeleteNode(usize),
    ChangeParentRouting(usize),
    NewParent(usize, usize),
    Overload(usize),
    AddDevice(usize, f64),
    Advance(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<usize>(), 0.0_f64..20.0).prop_map(|(i, c)| Op::SetCapacity(i, c)),
        any::<usize>().prop_map(Op::AddNode),
        any::<usize>().prop_map(Op::DeleteNode),
        any::<usize>().prop_map(Op::ChangeParentRouting),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::NewParent(a, b)),
        any::<usize>().prop_map(Op::Overload),
        (any::<usize>(), 0.0_f64..8.0).prop_map(|(i, p)| Op::AddDevice(i, p)),
        (1_u32..600).prop_map(Op::Advance),
    ]
}

fn pick(ids: &[NodeId], i: usize) -> NodeId {
    ids[i % ids.len()].clone()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn operations_preserve_invariants(
        seed in 0_u64..1000,
        ops in prop::collection::vec(op(), 1..25),
    ) {
        let (mut backend, clock) = backend_with(&small_generator(seed));
        for op in ops {
            let ids: Vec<NodeId> = backend.routing().index().iter_preorder();
            if ids.is_empty() {
                break;
            }
            // Rejections are fine; the state must stay consistent either way.
            let _ = match op {
                Op::SetCapacity(i, c) => backend.apply(&pick(&ids, i), NodeAction::SetCapacity(c)),
                Op::AddNode(i) => backend.apply(&pick(&ids, i), NodeAction::AddNode),
                Op::DeleteNode(i) => backend.apply(&pick(&ids, i), NodeAction::DeleteNode),
                Op::ChangeParentRouting(i) => {
                    backend.apply(&pick(&ids, i), NodeAction::ChangeParentRouting)
                }
                Op::NewParent(a, b) => {
                    backend.apply(&pick(&ids, a), NodeAction::NewParent(pick(&ids, b)))
                }
                Op::Overload(i) => backend.run_simulation(SimulationKind::Overload, &pick(&ids, i)),
                Op::AddDevice(i, p) => backend.apply_device(
                    &pick(&ids, i),
                    DeviceAction::Add {
                        device_type: DeviceType::Generic,
                        name: None,
                        avg_power: Some(p),
                    },
                ),
                Op::Advance(secs) => {
                    clock.advance(f64::from(secs));
                    Ok(backend.snapshot())
                }
            };
            assert_consistent(&backend);
        }

        // Retrying twice without changes settles on the same set.
        backend.snapshot();
        let settled = backend.routing().unsupplied().clone();
        backend.snapshot();
        prop_assert_eq!(backend.routing().unsupplied(), &settled);
    }
}
