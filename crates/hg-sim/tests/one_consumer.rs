//! One producer feeding one consumer through a supply and a return pipe.

use hg_components::HeatExchanger;
use hg_core::ViolationKind;
use hg_core::units::{kgps, m, m2, mps};
use hg_sim::*;

const STEPS: usize = 12;

fn config() -> SimConfig {
    SimConfig {
        interval_s: 600.0,
        horizon: STEPS,
        ..SimConfig::default()
    }
}

fn pipe(temp: f64) -> PipeSpec {
    PipeSpec::new(m(0.3), m(2000.0), 1.36, temp)
}

fn network(demand: f64) -> Network {
    network_in(config(), demand, pipe(90.0), pipe(50.0))
}

fn network_in(config: SimConfig, demand: f64, supply: PipeSpec, ret: PipeSpec) -> Network {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut b = NetworkBuilder::new(config);
    let plant = b.add_producer("plant", ProducerSpec::temperature_controlled());
    let house = b.add_consumer(
        "house",
        ConsumerSpec::new(vec![demand; STEPS])
            .with_heat_exchanger(HeatExchanger::new(kgps(300.0), m2(400.0), 207.15)),
    );
    b.add_pipe("supply", (plant, 1), (house, 0), supply);
    b.add_pipe("return", (house, 1), (plant, 0), ret);
    b.build().unwrap()
}

fn run_at_90(net: &mut Network) {
    let cmd = RunCommand::new(ProducerControl::Temp(vec![vec![90.0; STEPS]]));
    net.run(cmd).unwrap();
}

#[test]
fn steady_state_meets_demand_without_violations() {
    let mut net = network(10.0);
    run_at_90(&mut net);
    assert_eq!(net.current_step(), STEPS);

    let delivered = net.get_actual_delivered_heat().unwrap();
    let house = net.consumer_ids()[0];
    for (step, q) in delivered[&house].iter().enumerate() {
        assert!((q - 10.0).abs() < 1e-3, "step {step}: {q}");
    }
    assert!(net.unfulfilled_demand(None).unwrap().abs() < 1e-2);

    let status = net
        .get_object_status(None, 0, None, StatusFlags::all())
        .unwrap();
    for (object, s) in &status {
        for (kind, values) in &s.violation {
            // Kinds a producer does not evaluate in its control mode stay unknown.
            assert!(
                values.iter().all(|v| v.is_nan() || *v == 0.0),
                "{object} {kind:?}: {values:?}"
            );
        }
    }
    assert!(net.condition_violation_one_step().unwrap().is_empty());

    let secondary = net.get_sec_supply_in_temp().unwrap();
    assert!(secondary[&house].iter().all(|t| (t - 70.0).abs() < 1e-9));
}

#[test]
fn water_arrives_after_the_transport_delay() {
    let mut net = network(10.0);
    run_at_90(&mut net);
    let supply = net.topology().edges()[0].object;
    let status = net
        .get_object_status(Some(&[supply]), 0, None, StatusFlags::default())
        .unwrap();
    let outlet = &status[&supply].temp[1];
    // The initial water is one step old at step 0; later water has spent
    // the whole transit in the pipe.
    assert!(outlet.iter().all(|&t| t < 90.0 && t > 85.0));
    assert!(outlet[0] > outlet[STEPS - 1]);
    let delays = net.delay_matrix(supply).unwrap();
    // Step 0 only sees the initial plug.
    assert_eq!(delays[0][0], 1.0);
    assert_eq!(delays[STEPS - 1][0], 0.0);
}

#[test]
fn stopped_run_resumes_to_the_horizon() {
    let mut full = network(10.0);
    run_at_90(&mut full);

    let mut net = network(10.0);
    let mut cmd = RunCommand::new(ProducerControl::Temp(vec![vec![90.0; STEPS]]));
    cmd.end_step = Some(4);
    net.run(cmd).unwrap();
    assert_eq!(net.current_step(), 4);
    net.solve_horizon().unwrap();
    assert_eq!(net.current_step(), STEPS);

    assert_eq!(
        full.get_actual_delivered_heat().unwrap(),
        net.get_actual_delivered_heat().unwrap()
    );
    let supply = net.topology().edges()[0].object;
    let losses = net.delay_loss_matrix(supply).unwrap();
    assert_eq!(losses.len(), STEPS);
    assert!(losses.iter().flatten().all(|&f| (0.0..=1.0).contains(&f)));
    // Step 0 only drains water that was in the pipe before the run.
    assert!(losses[0].iter().all(|&f| f == 0.0));
    assert!(losses[STEPS - 1].iter().any(|&f| f > 0.0));
}

#[test]
fn reruns_are_bit_identical() {
    let mut net = network(10.0);
    run_at_90(&mut net);
    let first = net
        .get_object_status(None, 0, None, StatusFlags::all())
        .unwrap();
    let heat = net
        .get_edge_heat_and_loss(None, HeatLossLevel::PerEdge, TimeAggregation::PerStep)
        .unwrap();

    net.clear().unwrap();
    assert_eq!(net.current_step(), 0);
    run_at_90(&mut net);
    let second = net
        .get_object_status(None, 0, None, StatusFlags::all())
        .unwrap();
    for (object, a) in &first {
        let b = &second[object];
        for (x, y) in a.temp.iter().flatten().zip(b.temp.iter().flatten()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
        assert_eq!(a.mass_flow, b.mass_flow);
        assert_eq!(a.pressure, b.pressure);
    }
    assert_eq!(
        heat,
        net.get_edge_heat_and_loss(None, HeatLossLevel::PerEdge, TimeAggregation::PerStep)
            .unwrap()
    );
}

#[test]
fn overload_is_a_soft_violation() {
    let mut net = network(60.0);
    run_at_90(&mut net);
    let house = net.consumer_ids()[0];
    let status = net
        .get_object_status(Some(&[house]), 0, None, StatusFlags::all())
        .unwrap();
    let shortfall = &status[&house].violation[&ViolationKind::HeatDelivered];
    assert!(shortfall.iter().all(|v| *v < -1.0), "{shortfall:?}");

    let delivered = net.get_actual_delivered_heat().unwrap();
    assert!(delivered[&house].iter().all(|q| *q > 40.0 && *q < 60.0));
    assert!(net.unfulfilled_demand(None).unwrap() > 0.0);

    let violations = net.condition_violation_one_step().unwrap();
    assert!(violations.consumers[&house] > 1.0);
    // Mass flow hits the exchanger's valve limit.
    let flow = &status[&house].mass_flow[0];
    assert!(flow.iter().all(|f| (f - 300.0).abs() < 1e-6));
}

#[test]
fn small_shortfalls_stay_below_the_unmet_heat_band() {
    let mut net = network(60.0);
    run_at_90(&mut net);
    let house = net.consumer_ids()[0];
    let reported = net.condition_violation_one_step().unwrap().consumers[&house];
    assert!(reported > 1.0 && reported < 25.0, "{reported}");

    let mut wide = config();
    wide.tolerances.unmet_heat = 25.0;
    let mut net = network_in(wide, 60.0, pipe(90.0), pipe(50.0));
    run_at_90(&mut net);
    assert!(net.condition_violation_one_step().unwrap().is_empty());
    // The per-step heat-delivered violation keeps its own dead band.
    let status = net
        .get_object_status(Some(&[house]), 0, None, StatusFlags::all())
        .unwrap();
    let delivered = &status[&house].violation[&ViolationKind::HeatDelivered];
    assert!(delivered.iter().all(|v| *v < -1.0), "{delivered:?}");
}

#[test]
fn cold_supply_opens_the_valve_without_heat() {
    let mut net = network_in(config(), 10.0, pipe(40.0), pipe(40.0));
    let cmd = RunCommand::new(ProducerControl::Temp(vec![vec![40.0; STEPS]]));
    net.run(cmd).unwrap();

    let house = net.consumer_ids()[0];
    let delivered = net.get_actual_delivered_heat().unwrap();
    assert!(delivered[&house].iter().all(|q| *q == 0.0), "{delivered:?}");
    let status = net
        .get_object_status(Some(&[house]), 0, None, StatusFlags::all())
        .unwrap();
    for slot in &status[&house].mass_flow {
        assert!(slot.iter().all(|f| *f == 300.0), "{slot:?}");
    }
}

#[test]
fn fast_water_is_flagged_on_the_pipe() {
    let mut narrow = pipe(90.0);
    narrow.pipe.max_flow_speed = mps(0.01);
    let mut net = network_in(config(), 10.0, narrow, pipe(50.0));
    run_at_90(&mut net);

    let supply = net.topology().edges()[0].object;
    let ret = net.topology().edges()[1].object;
    let violations = net.condition_violation_one_step().unwrap();
    assert!(violations.edges[&supply] > 0.0);
    assert_eq!(violations.edges[&ret], 0.0);

    let status = net
        .get_object_status(Some(&[supply]), 0, None, StatusFlags::all())
        .unwrap();
    let speed = &status[&supply].violation[&ViolationKind::FlowSpeed];
    assert!(speed.iter().all(|v| *v > 0.0), "{speed:?}");
}

#[test]
fn heat_and_loss_levels_agree() {
    let mut net = network(10.0);
    run_at_90(&mut net);
    let per_edge = match net
        .get_edge_heat_and_loss(None, HeatLossLevel::PerEdge, TimeAggregation::Summed)
        .unwrap()
    {
        HeatLossReport::PerEdge(m) => m,
        other => panic!("unexpected {other:?}"),
    };
    let HeatLossReport::SupplyReturn { supply, return_ } = net
        .get_edge_heat_and_loss(None, HeatLossLevel::SupplyReturn, TimeAggregation::Summed)
        .unwrap()
    else {
        panic!("expected supply/return report");
    };
    let HeatLossReport::Grid(grid) = net
        .get_edge_heat_and_loss(None, HeatLossLevel::Grid, TimeAggregation::Summed)
        .unwrap()
    else {
        panic!("expected grid report");
    };

    let total_loss: f64 = per_edge.values().filter_map(|h| h.loss.as_value()).sum();
    let grid_loss = grid.loss.as_value().unwrap();
    assert!(total_loss > 0.0);
    assert!((grid_loss - total_loss).abs() < 1e-9 * total_loss);
    let split = supply.loss.as_value().unwrap() + return_.loss.as_value().unwrap();
    assert!((split - grid_loss).abs() < 1e-9 * grid_loss);
    // Hotter water loses more.
    assert!(supply.loss.as_value().unwrap() > return_.loss.as_value().unwrap());

    let current = net
        .get_edge_heat_and_loss(None, HeatLossLevel::Grid, TimeAggregation::Current)
        .unwrap();
    let HeatLossReport::Grid(current) = current else {
        panic!("expected grid report");
    };
    assert!(current.loss.as_value().unwrap() > 0.0);
}

#[test]
fn plain_producer_only_pays_for_pumping() {
    let mut net = network(10.0);
    run_at_90(&mut net);
    let plant = net.producer_ids()[0];
    let MarginReport::Detailed(detail) = net
        .get_detailed_margin(None, MarginLevel::Detailed, TimeAggregation::Summed)
        .unwrap()
    else {
        panic!("expected detailed margins");
    };
    let pump = detail[&plant].cost[&CostKind::Pump].as_value().unwrap();
    assert!(pump > 0.0);
    assert_eq!(detail[&plant].profit, Aggregate::Value(0.0));

    let MarginReport::Net(net_margin) = net
        .get_detailed_margin(None, MarginLevel::Net, TimeAggregation::Summed)
        .unwrap()
    else {
        panic!("expected net margin");
    };
    assert!((net_margin.as_value().unwrap() + pump).abs() < 1e-12);
}

#[test]
fn step_by_step_matches_a_run() {
    let mut stepped = network(10.0);
    let mut reports = Vec::new();
    for _ in 0..STEPS {
        reports.push(stepped.solve_one_step(StepControl::Temp(vec![90.0])).unwrap());
    }
    let mut ran = network(10.0);
    run_at_90(&mut ran);

    let delivered = ran.get_actual_delivered_heat().unwrap();
    let house = ran.consumer_ids()[0];
    for (step, report) in reports.iter().enumerate() {
        assert_eq!(report.step, step);
        assert_eq!(report.heat_delivered[0], delivered[&house][step]);
        assert_eq!(report.pipe_states, ran.get_pipe_states(step + 1).unwrap());
        assert_eq!(report.inlet_temp[0], 90.0);
    }

    let temps = stepped.temp_at_nodes().unwrap();
    let plant = stepped.producer_ids()[0];
    assert_eq!(temps[&plant][1], 90.0);
    assert!(matches!(
        stepped.solve_one_step(StepControl::Temp(vec![90.0])),
        Err(SimError::InvalidArg { .. })
    ));
}

#[test]
fn queries_name_every_object() {
    let net = network(10.0);
    let names = net.get_id_name_all_obj().unwrap();
    let mut kinds: Vec<_> = names.values().copied().collect();
    kinds.sort_unstable();
    assert_eq!(kinds, vec!["Consumer", "Edge", "Edge", "Producer"]);
    assert!(matches!(
        net.condition_violation_one_step(),
        Err(SimError::InvalidArg { .. })
    ));
}

#[test]
fn run_checks_its_inputs() {
    let mut net = network(10.0);
    let heat = RunCommand::new(ProducerControl::Heat(vec![vec![10.0; 2]]));
    assert!(matches!(net.run(heat), Err(SimError::InvalidArg { .. })));

    let mut cmd = RunCommand::new(ProducerControl::Temp(vec![vec![90.0; 2]]));
    cmd.electricity = Some(vec![Some(vec![1.0; 2])]);
    assert!(matches!(net.run(cmd), Err(SimError::InvalidArg { .. })));

    let house = net.consumer_ids()[0];
    let mut cmd = RunCommand::new(ProducerControl::Temp(vec![vec![90.0; 2]]));
    cmd.producer_ids = Some(vec![house]);
    assert!(matches!(net.run(cmd), Err(SimError::InvalidArg { .. })));

    let mut cmd = RunCommand::new(ProducerControl::Temp(vec![vec![90.0; 4]]));
    cmd.end_step = Some(2);
    net.run(cmd).unwrap();
    assert_eq!(net.current_step(), 2);
}

#[test]
fn reset_replaces_demand() {
    let mut net = network(10.0);
    run_at_90(&mut net);
    net.reset(Some(&[vec![5.0; STEPS]]), None, None).unwrap();
    assert_eq!(net.current_step(), 0);
    run_at_90(&mut net);
    let house = net.consumer_ids()[0];
    let delivered = net.get_actual_delivered_heat().unwrap();
    assert!(delivered[&house].iter().all(|q| (q - 5.0).abs() < 1e-3));

    assert!(net.reset(Some(&[vec![5.0; 3]]), None, None).is_err());
    assert!(net.reset(Some(&[]), None, None).is_err());
}
