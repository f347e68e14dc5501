//! A branch feeding two identical consumers whose returns meet at a junction.

use hg_components::HeatExchanger;
use hg_core::units::{kgps, m, m2};
use hg_core::{NodeId, ObjectId};
use hg_sim::*;

const STEPS: usize = 8;

struct Loop {
    net: Network,
    branch: ObjectId,
    junction: ObjectId,
}

fn pipe(length: f64, temp: f64) -> PipeSpec {
    PipeSpec::new(m(0.3), m(length), 1.36, temp)
}

fn consumer() -> ConsumerSpec {
    ConsumerSpec::new(vec![8.0; STEPS])
        .with_heat_exchanger(HeatExchanger::new(kgps(300.0), m2(400.0), 207.15))
}

fn build(default_valve: Option<f64>) -> Loop {
    let config = SimConfig {
        interval_s: 600.0,
        horizon: STEPS,
        ..SimConfig::default()
    };
    let mut b = NetworkBuilder::new(config);
    let plant = b.add_producer("plant", ProducerSpec::temperature_controlled());
    let split = b.add_branch("split", 2, default_valve);
    let merge = b.add_junction("merge", 2, default_valve);
    let houses: Vec<NodeId> = ["east", "west"]
        .into_iter()
        .map(|name| b.add_consumer(name, consumer()))
        .collect();

    b.add_pipe("main supply", (plant, 1), (split, 0), pipe(1500.0, 90.0));
    for (i, &house) in houses.iter().enumerate() {
        b.add_pipe(format!("supply {i}"), (split, i + 1), (house, 0), pipe(500.0, 90.0));
        b.add_pipe(format!("return {i}"), (house, 1), (merge, i + 1), pipe(500.0, 50.0));
    }
    b.add_pipe("main return", (merge, 0), (plant, 0), pipe(1500.0, 50.0));

    let net = b.build().unwrap();
    let branch = net.node_object(split).unwrap();
    let junction = net.node_object(merge).unwrap();
    Loop {
        net,
        branch,
        junction,
    }
}

fn temp_series() -> ProducerControl {
    ProducerControl::Temp(vec![vec![90.0; STEPS]])
}

#[test]
fn identical_consumers_split_evenly() {
    let Loop {
        mut net,
        branch,
        junction,
    } = build(Some(0.5));
    net.run(RunCommand::new(temp_series())).unwrap();

    let delivered = net.get_actual_delivered_heat().unwrap();
    let ids = net.consumer_ids();
    assert_eq!(ids.len(), 2);
    for step in 0..STEPS {
        let east = delivered[&ids[0]][step];
        let west = delivered[&ids[1]][step];
        assert!((east - 8.0).abs() < 1e-3);
        assert_eq!(east.to_bits(), west.to_bits());
    }

    let status = net
        .get_object_status(Some(&[branch, junction]), 0, None, StatusFlags::all())
        .unwrap();
    for object in [branch, junction] {
        let flows = &status[&object].mass_flow;
        for step in 0..STEPS {
            assert_eq!(flows[1][step], flows[2][step]);
            let sum = flows[1][step] + flows[2][step];
            assert!((flows[0][step] - sum).abs() < 1e-12 * sum);
        }
    }

    // The branch takes the highest side pressure, the junction the lowest.
    let pressures = &status[&branch].pressure;
    assert!(pressures[0].iter().all(|p| *p > 100_000.0));
    let pressures = &status[&junction].pressure;
    assert!(pressures[0].iter().all(|p| *p < 0.0));
}

#[test]
fn junction_mixes_by_flow() {
    let Loop {
        mut net, junction, ..
    } = build(Some(0.5));
    net.run(RunCommand::new(temp_series())).unwrap();
    let status = net
        .get_object_status(Some(&[junction]), 0, None, StatusFlags::all())
        .unwrap();
    let temp = &status[&junction].temp;
    let flow = &status[&junction].mass_flow;
    for step in 0..STEPS {
        let mixed = (temp[1][step] * flow[1][step] + temp[2][step] * flow[2][step])
            / (flow[1][step] + flow[2][step]);
        assert!((temp[0][step] - mixed).abs() < 1e-9);
    }
}

#[test]
fn valve_positions_are_validated_per_connector() {
    let Loop {
        mut net, branch, ..
    } = build(None);
    let mut cmd = RunCommand::new(ProducerControl::Temp(vec![vec![90.0; 2]]));
    cmd.valve_pos.insert(branch, vec![0.3, 0.3]);
    assert!(matches!(net.run(cmd), Err(SimError::InvalidArg { .. })));

    let plant = net.producer_ids()[0];
    let mut cmd = RunCommand::new(ProducerControl::Temp(vec![vec![90.0; 2]]));
    cmd.valve_pos.insert(plant, vec![0.3]);
    assert!(matches!(net.run(cmd), Err(SimError::InvalidArg { .. })));

    let mut cmd = RunCommand::new(ProducerControl::Temp(vec![vec![90.0; 2]]));
    cmd.valve_pos.insert(branch, vec![0.3]);
    net.run(cmd).unwrap();
    assert_eq!(net.current_step(), 2);
}

#[test]
fn supply_and_return_sides_are_classified() {
    let Loop { net, .. } = build(Some(0.5));
    let HeatLossReport::SupplyReturn { supply, return_ } = net
        .get_edge_heat_and_loss(None, HeatLossLevel::SupplyReturn, TimeAggregation::PerStep)
        .unwrap()
    else {
        panic!("expected supply/return report");
    };
    // Nothing solved yet.
    assert_eq!(supply.loss, Aggregate::Series(vec![]));
    assert_eq!(return_.heat, Aggregate::Series(vec![]));
    let supply_edges = net.topology().edges_on(hg_graph::Side::Supply).count();
    assert_eq!(supply_edges, 3);
}
