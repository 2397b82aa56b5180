//! Randomized safety and liveness checks across seeds and cluster sizes.

use proptest::prelude::*;
use ricart_core::{
    ConstantLatency, DeliveryOrder, EngineConfig, MessageKind, MutexEngine, NodeState,
    SimulationConfig,
};
use ricart_env::NodeId;
use ricart_sim::{LatencyProfile, SimConfig, SimWorld};
use std::time::Duration;

fn world(seed: u64, nodes: usize, probability: f64, order: DeliveryOrder) -> SimWorld {
    SimWorld::new(SimConfig {
        seed,
        num_nodes: nodes,
        simulation: SimulationConfig::default()
            .with_request_probability(probability)
            .with_delivery_order(order),
        ..Default::default()
    })
    .expect("valid config")
}

fn order_strategy() -> impl Strategy<Value = DeliveryOrder> {
    prop_oneof![Just(DeliveryOrder::Fifo), Just(DeliveryOrder::Shuffled)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn no_two_nodes_ever_hold_together(
        seed in any::<u64>(),
        nodes in 2usize..=8,
        probability in 0.05f64..0.9,
        order in order_strategy(),
    ) {
        let mut world = world(seed, nodes, probability, order);
        for _ in 0..80 {
            world.step();
            prop_assert!(world.simulation.engine().holders().len() <= 1);
        }
        prop_assert!(world.oracle.is_clean(), "{:?}", world.oracle.violations());
    }

    #[test]
    fn every_request_is_eventually_served(
        seed in any::<u64>(),
        nodes in 2usize..=8,
        probability in 0.05f64..0.9,
    ) {
        let mut world = world(seed, nodes, probability, DeliveryOrder::Shuffled);
        world.run(60);

        prop_assert!(world.drain(nodes as u64 * 25 + 50));
        prop_assert_eq!(world.oracle.outstanding_requests(), 0);
        prop_assert!(world.oracle.is_clean(), "{:?}", world.oracle.violations());

        let stats = world.simulation.engine().stats();
        // Every REQUEST is answered exactly once, immediately or on release.
        prop_assert_eq!(stats.requests_sent, stats.replies_sent);
        prop_assert_eq!(stats.total_entries(), world.oracle.entries() as u64);
    }

    #[test]
    fn jitter_never_breaks_safety(
        seed in any::<u64>(),
        nodes in 2usize..=6,
        std_dev_ms in 0.0f64..2000.0,
    ) {
        let mut world = SimWorld::new(SimConfig {
            seed,
            num_nodes: nodes,
            simulation: SimulationConfig::default().with_request_probability(0.5),
            latency: LatencyProfile::Jitter {
                mean_ms: 600.0,
                std_dev_ms,
                min_ms: 0,
                max_ms: 3000,
            },
            ..Default::default()
        })
        .expect("valid config");

        world.run(60);
        prop_assert!(world.drain(nodes as u64 * 25 + 50));
        prop_assert!(world.oracle.is_clean(), "{:?}", world.oracle.violations());
    }

    #[test]
    fn simultaneous_requests_enter_in_id_order(
        seed in any::<u64>(),
        nodes in 2usize..=8,
    ) {
        let mut world = world(seed, nodes, 0.0, DeliveryOrder::Shuffled);
        let ids = world.node_ids();
        for &id in &ids {
            prop_assert!(world.request_cs(id).is_accepted());
        }

        prop_assert!(world.drain(nodes as u64 * 25 + 50));
        let order: Vec<NodeId> = world.oracle.entry_log().iter().map(|(n, _)| *n).collect();
        prop_assert_eq!(order, ids);
    }

    #[test]
    fn reply_arrival_order_does_not_matter(
        order in Just((1u32..6).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let config = EngineConfig {
            reply_delay_ms: 0,
            delivery_order: DeliveryOrder::Fifo,
            ..EngineConfig::default()
        };
        let mut engine = MutexEngine::new(config, 0)
            .expect("valid config")
            .with_latency_model(Box::new(ConstantLatency(Duration::from_millis(10))));
        engine.initialize(6).expect("six nodes");

        engine.request_cs(NodeId(0));
        for id in engine.in_flight_ids() {
            engine.deliver(id);
        }

        // Deliver the replies to node 0 in the shuffled sender order.
        let snapshot = engine.snapshot();
        for sender in order {
            let reply = snapshot
                .in_flight
                .iter()
                .find(|m| m.kind == MessageKind::Reply && m.from == NodeId(sender))
                .expect("one reply per peer");
            prop_assert_eq!(engine.node(NodeId(0)).map(|n| n.state()), Some(NodeState::Wanted));
            prop_assert!(engine.deliver(reply.id));
        }

        prop_assert_eq!(engine.node(NodeId(0)).map(|n| n.state()), Some(NodeState::Held));
        prop_assert!(engine.node(NodeId(0)).is_some_and(|n| n.pending_replies().is_empty()));
    }

    #[test]
    fn explicit_interleavings_keep_one_holder(
        seed in any::<u64>(),
        nodes in 2usize..=6,
        steps in prop::collection::vec((0u8..3, any::<usize>()), 1..300),
    ) {
        let config = EngineConfig {
            reply_delay_ms: 0,
            delivery_order: DeliveryOrder::Fifo,
            ..EngineConfig::default()
        };
        let mut engine = MutexEngine::new(config, seed).expect("valid config");
        engine.initialize(nodes).expect("node count in range");

        let mut accepted = 0u64;
        for (op, pick) in steps {
            match op {
                0 => {
                    if engine.request_cs(NodeId::from_index(pick % nodes)).is_accepted() {
                        accepted += 1;
                    }
                }
                1 => {
                    // Usually a no-op on a non-holder; sometimes the real release.
                    let target = match engine.holders().first() {
                        Some(holder) if pick % 2 == 0 => *holder,
                        _ => NodeId::from_index(pick % nodes),
                    };
                    engine.release_cs(target);
                }
                _ => {
                    let ids = engine.in_flight_ids();
                    if !ids.is_empty() {
                        let id = ids[pick % ids.len()];
                        prop_assert!(engine.deliver(id));
                        prop_assert!(!engine.deliver(id));
                    }
                }
            }
            prop_assert!(engine.holders().len() <= 1);
        }

        // Drain latest-deadline first, releasing holders as they appear.
        let mut guard = 0;
        while !engine.is_quiescent() {
            guard += 1;
            prop_assert!(guard < 10_000, "engine never quiesced");
            for holder in engine.holders() {
                engine.release_cs(holder);
            }
            if let Some(&id) = engine.in_flight_ids().last() {
                prop_assert!(engine.deliver(id));
            }
            prop_assert!(engine.holders().len() <= 1);
        }

        let stats = engine.stats();
        prop_assert_eq!(stats.total_entries(), accepted);
        prop_assert_eq!(stats.requests_sent, stats.replies_sent);
    }
}

#[test]
fn same_seed_same_export() {
    let run = || {
        let mut world = SimWorld::new(SimConfig {
            seed: 99,
            num_nodes: 4,
            simulation: SimulationConfig::default().with_request_probability(0.4),
            record_frames: true,
            ..Default::default()
        })
        .expect("valid config");
        world.run(50);
        world.drain(150);
        world.finish_export(true).expect("frames recorded")
    };

    assert_eq!(run(), run());
}
