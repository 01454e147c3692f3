//! End-to-end scenarios mirroring `libheat`'s `two_agent_sync`/`two_contingent`
//! style fixtures: a two-agent network joined by an interagent synchrony
//! edge, and a single-agent network with two sequential contingents.

use pstn_core::{
    AgentId, DecoupleStrategy, DecoupledSimulator, Distribution, ExecutionStrategy, SimulationOptions,
    Simulator, Stn, VertexId, srea,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn two_agent_sync_network() -> Stn {
    let mut stn = Stn::new();
    let agent_a = AgentId::new(0);
    let agent_b = AgentId::new(1);
    let a1 = VertexId::new(1);
    let a2 = VertexId::new(2);
    let b1 = VertexId::new(3);
    let b2 = VertexId::new(4);

    stn.add_vertex(a1, Some(agent_a));
    stn.add_vertex(a2, Some(agent_a));
    stn.add_vertex(b1, Some(agent_b));
    stn.add_vertex(b2, Some(agent_b));

    stn.add_edge(VertexId::ZERO, a1, 0.0, 0.0, None).expect("edge is valid");
    stn.add_edge(VertexId::ZERO, b1, 0.0, 0.0, None).expect("edge is valid");

    let a_duration = Distribution::gaussian(5000.0, 1000.0).expect("valid distribution");
    let b_duration = Distribution::gaussian(5000.0, 1000.0).expect("valid distribution");
    stn.add_edge(a1, a2, 1000.0, 9000.0, Some(a_duration))
        .expect("edge is valid");
    stn.add_edge(b1, b2, 1000.0, 9000.0, Some(b_duration))
        .expect("edge is valid");

    // Synchrony: the two agents' second timepoints must coincide within 500ms.
    stn.add_edge(a2, b2, -500.0, 500.0, None).expect("edge is valid");

    stn
}

fn two_sequential_contingents_network() -> Stn {
    let mut stn = Stn::new();
    let agent = AgentId::new(0);
    let v1 = VertexId::new(1);
    let v2 = VertexId::new(2);
    let v3 = VertexId::new(3);

    stn.add_vertex(v1, Some(agent));
    stn.add_vertex(v2, Some(agent));
    stn.add_vertex(v3, Some(agent));

    stn.add_edge(VertexId::ZERO, v1, 0.0, 0.0, None).expect("edge is valid");
    let first = Distribution::gaussian(3000.0, 500.0).expect("valid distribution");
    stn.add_edge(v1, v2, 500.0, 6000.0, Some(first)).expect("edge is valid");
    let second = Distribution::gaussian(3000.0, 500.0).expect("valid distribution");
    stn.add_edge(v2, v3, 500.0, 6000.0, Some(second)).expect("edge is valid");

    stn
}

#[test]
fn two_agent_sync_has_one_interagent_edge_between_the_sync_vertices() {
    let stn = two_agent_sync_network();
    let interagent: Vec<_> = stn.edges().filter(|edge| edge.is_interagent()).collect();
    assert_eq!(interagent.len(), 1);
    let edge = interagent[0];
    assert_eq!(edge.source(), VertexId::new(2));
    assert_eq!(edge.target(), VertexId::new(4));
}

#[test]
fn srea_finds_a_feasible_envelope_for_two_agent_sync() {
    let stn = two_agent_sync_network();
    let outcome = srea(&stn).expect("srea runs").expect("a feasible envelope exists");
    assert!(outcome.alpha >= 0.0 && outcome.alpha <= 1.0);
    assert_eq!(outcome.envelope.distance_from_zero(VertexId::ZERO), Some(0.0));
}

#[test]
fn srea_and_early_dispatch_both_run_to_completion_across_samples() {
    let stn = two_agent_sync_network();
    let samples = 40;

    let early = Simulator::new(SimulationOptions::default());
    let early_successes = (0..samples)
        .map(|seed| {
            let mut rng = SmallRng::seed_from_u64(seed);
            early
                .simulate(&stn, ExecutionStrategy::Early, &mut rng)
                .expect("simulation runs")
                .success
        })
        .filter(|&ok| ok)
        .count();

    let srea_sim = Simulator::new(SimulationOptions::default());
    let srea_successes = (0..samples)
        .map(|seed| {
            let mut rng = SmallRng::seed_from_u64(seed + 1000);
            srea_sim
                .simulate(&stn, ExecutionStrategy::Srea, &mut rng)
                .expect("simulation runs")
                .success
        })
        .filter(|&ok| ok)
        .count();

    assert!(srea_successes > 0, "srea should succeed on at least some samples");
    assert!(early_successes <= samples);
}

#[test]
fn two_sequential_contingents_dispatch_under_drea() {
    let stn = two_sequential_contingents_network();
    let simulator = Simulator::new(SimulationOptions::default());
    let mut successes = 0;
    let samples = 30;
    for seed in 0..samples {
        let mut rng = SmallRng::seed_from_u64(seed);
        let outcome = simulator
            .simulate(&stn, ExecutionStrategy::Drea, &mut rng)
            .expect("simulation runs");
        if outcome.success {
            successes += 1;
        }
    }
    assert!(successes > 0, "drea should succeed on at least some samples");
}

#[test]
fn seeded_dispatch_is_deterministic() {
    let stn = two_agent_sync_network();
    let simulator = Simulator::new(SimulationOptions::default());

    let mut rng_one = SmallRng::seed_from_u64(7);
    let first = simulator
        .simulate(&stn, ExecutionStrategy::Drea, &mut rng_one)
        .expect("simulation runs");

    let mut rng_two = SmallRng::seed_from_u64(7);
    let second = simulator
        .simulate(&stn, ExecutionStrategy::Drea, &mut rng_two)
        .expect("simulation runs");

    assert_eq!(first.success, second.success);
    assert_eq!(first.reschedules, second.reschedules);
    assert_eq!(first.sends, second.sends);
}

#[test]
fn cloning_and_mutating_a_copy_leaves_the_original_untouched() {
    let stn = two_agent_sync_network();
    let mut copy = stn.clone();
    copy.assign_timepoint(VertexId::new(1), 0.0).expect("assignment is valid");

    assert!(!stn.vertex(VertexId::new(1)).expect("vertex exists").is_executed());
    assert!(copy.vertex(VertexId::new(1)).expect("vertex exists").is_executed());
}

#[test]
fn propagation_is_idempotent() {
    let mut stn = two_agent_sync_network();
    stn.floyd_warshall().expect("propagation runs");
    let once: Vec<_> = stn.edges().map(|edge| (edge.source(), edge.target(), edge.lower_bound(), edge.upper_bound())).collect();
    stn.floyd_warshall().expect("propagation runs again");
    let twice: Vec<_> = stn.edges().map(|edge| (edge.source(), edge.target(), edge.lower_bound(), edge.upper_bound())).collect();
    assert_eq!(once, twice);
}

#[test]
fn decoupled_srea_dispatch_is_deterministic_per_seed() {
    let stn = two_agent_sync_network();
    let decoupled = DecoupledSimulator::new();

    for seed in 0..10 {
        let mut first_rng = SmallRng::seed_from_u64(seed);
        let first = decoupled
            .simulate(&stn, DecoupleStrategy::Srea, &mut first_rng)
            .expect("decoupled simulation runs");

        let mut second_rng = SmallRng::seed_from_u64(seed);
        let second = decoupled
            .simulate(&stn, DecoupleStrategy::Srea, &mut second_rng)
            .expect("decoupled simulation runs");

        assert_eq!(
            first.success, second.success,
            "seed {seed} gave different outcomes across repeated runs"
        );
    }
}
