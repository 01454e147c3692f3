use super::*;
use crate::distribution::Distribution;
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn two_agent_network() -> (Stn, VertexId, VertexId, VertexId) {
    let mut stn = Stn::new();
    let agent_a = AgentId::new(0);
    let agent_b = AgentId::new(1);
    let a_start = VertexId::new(1);
    let b_start = VertexId::new(2);
    let a_end = VertexId::new(3);

    stn.add_vertex(a_start, Some(agent_a));
    stn.add_vertex(b_start, Some(agent_b));
    stn.add_vertex(a_end, Some(agent_a));

    (stn, a_start, b_start, a_end)
}

#[test]
fn add_edge_classifies_same_agent_as_requirement() {
    let (mut stn, a_start, _b_start, a_end) = two_agent_network();
    stn.add_edge(a_start, a_end, 1.0, 10.0, None)
        .expect("edge is valid");
    let edge = stn
        .edges()
        .find(|edge| edge.source() == a_start && edge.target() == a_end)
        .expect("edge exists");
    assert!(matches!(edge.kind(), EdgeKind::Requirement));
}

#[test]
fn add_edge_classifies_cross_agent_as_interagent() {
    let (mut stn, a_start, b_start, _a_end) = two_agent_network();
    stn.add_edge(a_start, b_start, 0.0, 100.0, None)
        .expect("edge is valid");
    let edge = stn
        .edges()
        .find(|edge| edge.source() == a_start && edge.target() == b_start)
        .expect("edge exists");
    assert!(edge.is_interagent());
}

#[test]
fn contingent_edge_records_parent_and_marks_child_uncontrollable() {
    let (mut stn, a_start, _b_start, a_end) = two_agent_network();
    let dist = Distribution::gaussian(500.0, 100.0).expect("valid distribution");
    stn.add_edge(a_start, a_end, 0.0, f64::INFINITY, Some(dist))
        .expect("edge is valid");

    assert_eq!(stn.incoming_contingent(a_end), Some(a_start));
    assert!(!stn.vertex(a_end).expect("vertex exists").is_controllable());
}

#[test]
fn duplicate_contingent_parent_is_rejected() {
    let (mut stn, a_start, b_start, a_end) = two_agent_network();
    let dist = Distribution::gaussian(500.0, 100.0).expect("valid distribution");
    stn.add_edge(a_start, a_end, 0.0, f64::INFINITY, Some(dist))
        .expect("first contingent parent is accepted");

    let err = stn
        .add_edge(b_start, a_end, 0.0, f64::INFINITY, Some(dist))
        .expect_err("a second contingent parent must be rejected");
    assert!(matches!(err, StnError::DuplicateContingentParent { .. }));
}

#[test]
fn get_sub_stn_never_contains_interagent_edges() {
    let (mut stn, a_start, b_start, a_end) = two_agent_network();
    stn.add_edge(a_start, a_end, 1.0, 10.0, None)
        .expect("requirement edge is valid");
    stn.add_edge(a_start, b_start, 0.0, 100.0, None)
        .expect("interagent edge is valid");

    let sub = stn.get_sub_stn(AgentId::new(0));
    assert!(sub.edges().all(|edge| !edge.is_interagent()));
    assert!(sub.vertex(b_start).is_none());
    assert!(sub.vertex(VertexId::ZERO).is_some());
}

#[test]
fn floyd_warshall_flags_inconsistent_network() {
    let mut stn = Stn::new();
    let v = VertexId::new(1);
    stn.add_vertex(v, None);
    stn.add_edge(VertexId::ZERO, v, 0.0, 5.0, None)
        .expect("edge is valid");
    stn.add_edge(v, VertexId::ZERO, 10.0, f64::INFINITY, None)
        .expect("edge is valid");

    let consistent = stn.floyd_warshall().expect("propagation runs");
    assert!(!consistent);
}

#[test]
fn floyd_warshall_tightens_transitive_bound() {
    let mut stn = Stn::new();
    let a = VertexId::new(1);
    let b = VertexId::new(2);
    stn.add_vertex(a, None);
    stn.add_vertex(b, None);
    stn.add_edge(VertexId::ZERO, a, 0.0, 5.0, None)
        .expect("edge is valid");
    stn.add_edge(a, b, 0.0, 5.0, None).expect("edge is valid");

    let consistent = stn.floyd_warshall().expect("propagation runs");
    assert!(consistent);
    assert_eq!(stn.distance_from_zero(b), Some(10.0));
}

#[test]
fn resample_fixes_contingent_edge_to_a_point() {
    let (mut stn, a_start, _b_start, a_end) = two_agent_network();
    let dist = Distribution::uniform(100.0, 200.0).expect("valid distribution");
    stn.add_edge(a_start, a_end, 50.0, 300.0, Some(dist))
        .expect("edge is valid");

    let mut rng = SmallRng::seed_from_u64(1);
    stn.resample_contingent_edges(&mut rng)
        .expect("resample succeeds");

    let edge = stn
        .edges()
        .find(|edge| edge.source() == a_start && edge.target() == a_end)
        .expect("edge exists");
    assert!((edge.lower_bound() - edge.upper_bound()).abs() < f64::EPSILON);
    assert!((100.0..=200.0).contains(&edge.lower_bound()));
}

#[test]
fn assign_timepoint_fixes_distance_and_marks_executed() {
    let mut stn = Stn::new();
    let v = VertexId::new(1);
    stn.add_vertex(v, None);
    stn.assign_timepoint(v, 42.0).expect("assignment succeeds");

    assert_eq!(stn.distance_from_zero(v), Some(42.0));
    assert!(stn.vertex(v).expect("vertex exists").is_executed());
}

#[test]
fn remove_vertex_drops_incident_edges_and_parent_entries() {
    let (mut stn, a_start, _b_start, a_end) = two_agent_network();
    let dist = Distribution::gaussian(500.0, 100.0).expect("valid distribution");
    stn.add_edge(a_start, a_end, 0.0, f64::INFINITY, Some(dist))
        .expect("edge is valid");

    stn.remove_vertex(a_end).expect("vertex is present");
    assert!(stn.incoming_contingent(a_end).is_none());
    assert!(stn.edges().all(|edge| edge.target() != a_end));
}
