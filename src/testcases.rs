//! Small networks used across the test suites.
//!
//! Every `*_builder` returns the editable description, the plain function the
//! built network.
use crate::basic::network::*;

fn line() -> PiModel {
    PiModel::line(0.01, 0.1, 0.0)
}

fn zero_impedance() -> PiModel {
    PiModel {
        r: 0.0,
        x: 0.0,
        ..Default::default()
    }
}

/// Slack bus regulating its own voltage at 1.0.
fn add_slack(b: &mut NetworkBuilder, name: &str) -> usize {
    let bus = b.add_bus(name);
    bus.slack = true;
    bus.reference = true;
    bus.generator_voltage_control_enabled = true;
    let num = bus.num;
    b.add_voltage_control(VoltageControl::new(VoltageControlKind::Generator, num, vec![num], 1.0));
    num
}

fn add_load(b: &mut NetworkBuilder, name: &str, p: f64, q: f64) -> usize {
    let bus = b.add_bus(name);
    bus.load_target_p = p;
    bus.load_target_q = q;
    bus.num
}

fn build(b: NetworkBuilder) -> Network {
    match b.build() {
        Ok(net) => net,
        Err(e) => panic!("invalid test network: {e}"),
    }
}

/// Slack bus 0 feeding a 1.0 + j0.5 load at bus 1 through one line.
pub fn two_bus_builder() -> NetworkBuilder {
    let mut b = NetworkBuilder::new();
    add_slack(&mut b, "slack");
    add_load(&mut b, "load", 1.0, 0.5);
    b.add_branch("line", 0, 1, line());
    b
}

pub fn two_bus() -> Network {
    build(two_bus_builder())
}

/// `0 - 1 - 2`, slack at 0.
pub fn three_bus_chain() -> Network {
    let mut b = NetworkBuilder::new();
    add_slack(&mut b, "slack");
    add_load(&mut b, "middle", 0.5, 0.1);
    add_load(&mut b, "end", 0.5, 0.1);
    b.add_branch("l01", 0, 1, line());
    b.add_branch("l12", 1, 2, line());
    build(b)
}

/// Three buses joined in a ring of zero impedance branches.
pub fn zero_impedance_ring_builder() -> NetworkBuilder {
    let mut b = NetworkBuilder::new();
    add_slack(&mut b, "slack");
    add_load(&mut b, "a", 0.4, 0.1);
    add_load(&mut b, "b", 0.2, 0.1);
    b.add_branch("z01", 0, 1, zero_impedance());
    b.add_branch("z12", 1, 2, zero_impedance());
    b.add_branch("z20", 2, 0, zero_impedance());
    b
}

pub fn zero_impedance_ring() -> Network {
    build(zero_impedance_ring_builder())
}

/// Bus 0 regulated by the generators of buses `1..=n`, each with a reactive
/// target of 10, and a slack bus `n + 1`.
pub fn shared_generator_voltage_control_builder(n: usize) -> NetworkBuilder {
    let mut b = NetworkBuilder::new();
    add_load(&mut b, "controlled", 0.5, 0.2);
    for i in 1..=n {
        let bus = b.add_bus(format!("gen{i}"));
        bus.generation_target_p = 0.3;
        bus.generation_target_q = 10.0;
        bus.generator_voltage_control_enabled = true;
    }
    b.add_voltage_control(VoltageControl::new(
        VoltageControlKind::Generator,
        0,
        (1..=n).collect(),
        1.01,
    ));
    let slack = add_slack(&mut b, "slack");
    for i in 1..=n {
        b.add_branch(format!("l{i}"), i, 0, line());
    }
    b.add_branch("ls", slack, 0, line());
    b
}

pub fn shared_generator_voltage_control(n: usize) -> Network {
    build(shared_generator_voltage_control_builder(n))
}

pub const PHASE_SHIFTER: usize = 1;

/// Phase shifter `ps` between buses 1 and 2 regulating its own active flow,
/// in parallel with the path through the slack bus.
pub fn phase_shifter_builder() -> NetworkBuilder {
    let mut b = NetworkBuilder::new();
    add_slack(&mut b, "slack");
    add_load(&mut b, "b1", 0.3, 0.1);
    add_load(&mut b, "b2", 0.4, 0.1);
    b.add_branch("l01", 0, 1, line());
    let ps = b.add_branch(
        "ps",
        1,
        2,
        PiModel {
            a1: 0.05,
            ..line()
        },
    );
    ps.phase_control_enabled = true;
    b.add_branch("l02", 0, 2, line());
    b.add_phase_control(PhaseControl {
        controller_branch: PHASE_SHIFTER,
        controlled_branch: PHASE_SHIFTER,
        controlled_side: Side::One,
        mode: PhaseControlMode::Controller,
        unit: PhaseControlUnit::ActivePower,
        target_value: 0.2,
    });
    b
}

pub fn phase_shifter() -> Network {
    build(phase_shifter_builder())
}

pub const TRANSFORMER: usize = 1;

/// Transformer `tr` regulating the voltage of bus 2 with its ratio.
pub fn transformer_voltage_control_builder() -> NetworkBuilder {
    let mut b = NetworkBuilder::new();
    add_slack(&mut b, "slack");
    add_load(&mut b, "hv", 0.1, 0.0);
    add_load(&mut b, "lv", 0.6, 0.2);
    b.add_branch("l01", 0, 1, line());
    let tr = b.add_branch(
        "tr",
        1,
        2,
        PiModel {
            r1: 0.98,
            ..line()
        },
    );
    tr.voltage_control_enabled = true;
    b.add_voltage_control(VoltageControl::new(
        VoltageControlKind::Transformer,
        2,
        vec![TRANSFORMER],
        1.02,
    ));
    b
}

pub fn transformer_voltage_control() -> Network {
    build(transformer_voltage_control_builder())
}

/// Two slack buses, the second one holding the angle reference.
pub fn multi_slack() -> Network {
    let mut b = NetworkBuilder::new();
    let a = add_slack(&mut b, "slack_a");
    b.buses[a].reference = false;
    b.buses[a].generation_target_p = 0.5;
    add_slack(&mut b, "slack_b");
    add_load(&mut b, "load", 1.0, 0.3);
    b.add_branch("l02", 0, 2, line());
    b.add_branch("l12", 1, 2, line());
    b.add_branch("l01", 0, 1, line());
    build(b)
}

/// [`two_bus`] with an emulating HVDC link in parallel to the line.
pub fn hvdc() -> Network {
    let mut b = two_bus_builder();
    let link = b.add_hvdc("link", 0, 1, 0.1, 0.5);
    link.p_max_from_1_to_2 = 0.8;
    link.p_max_from_2_to_1 = 0.8;
    link.loss_factor1 = 0.01;
    link.loss_factor2 = 0.01;
    build(b)
}

pub const MERGED_BUS: usize = 0;

/// Two generator voltage controls regulating the same bus, ready to merge.
pub fn mergeable_voltage_controls() -> Network {
    let mut b = NetworkBuilder::new();
    add_load(&mut b, "controlled", 0.5, 0.2);
    for i in 1..=2 {
        let bus = b.add_bus(format!("gen{i}"));
        bus.generation_target_p = 0.2;
        bus.generator_voltage_control_enabled = true;
        b.add_voltage_control(VoltageControl::new(
            VoltageControlKind::Generator,
            MERGED_BUS,
            vec![i],
            1.01,
        ));
    }
    let slack = add_slack(&mut b, "slack");
    for i in 1..=2 {
        b.add_branch(format!("l{i}"), i, MERGED_BUS, line());
    }
    b.add_branch("ls", slack, MERGED_BUS, line());
    build(b)
}

/// Element counts of [`mixed`].
#[derive(Debug, Clone, Copy)]
pub struct Sizes {
    pub buses: usize,
    pub branches: usize,
    pub shunts: usize,
    pub hvdcs: usize,
    pub voltage_controls: usize,
}

pub const MIXED_SIZES: Sizes = Sizes {
    buses: 10,
    branches: 14,
    shunts: 2,
    hvdcs: 1,
    voltage_controls: 4,
};

/// Branch of [`mixed`] whose side-1 reactive flow is regulated by buses 8 and 9.
pub const MIXED_Q_CONTROLLED: usize = 11;

/// Every kind of element and control in one meshed network.
pub fn mixed() -> Network {
    let mut b = NetworkBuilder::new();
    let slack = add_slack(&mut b, "slack");
    b.buses[slack].initial_v = 1.02;
    let gen_a = b.add_bus("gen_a");
    gen_a.generation_target_p = 0.4;
    gen_a.generation_target_q = 0.1;
    gen_a.generator_voltage_control_enabled = true;
    gen_a.reactive_key = 2.0;
    add_load(&mut b, "load_a", 0.6, 0.2);
    let gen_b = b.add_bus("gen_b");
    gen_b.generation_target_p = 0.3;
    gen_b.generator_voltage_control_enabled = true;
    let load_b = b.add_bus("load_b");
    load_b.load_model = Some(LoadModel::zip(0.3, 0.1, 0.2, 0.3, 0.5));
    add_load(&mut b, "load_c", 0.3, 0.1);
    add_load(&mut b, "node_a", 0.1, 0.0);
    add_load(&mut b, "node_b", 0.1, 0.05);
    for name in ["gen_c", "gen_d"] {
        let bus = b.add_bus(name);
        bus.generation_target_p = 0.1;
        bus.generation_target_q = 0.05;
        bus.generator_reactive_power_control_enabled = true;
    }

    b.add_branch("l01", 0, 1, line());
    b.add_branch("l12", 1, 2, line());
    b.add_branch("l23", 2, 3, line());
    b.add_branch("l30", 3, 0, line());
    b.add_branch("l24", 2, 4, PiModel::line(0.02, 0.2, 0.04));
    let tr = b.add_branch(
        "tr",
        4,
        5,
        PiModel {
            r1: 0.98,
            ..line()
        },
    );
    tr.voltage_control_enabled = true;
    let ps = b.add_branch(
        "ps",
        0,
        4,
        PiModel {
            a1: 0.02,
            ..line()
        },
    );
    ps.phase_control_enabled = true;
    b.add_branch("z26", 2, 6, zero_impedance());
    b.add_branch("l67", 6, 7, line());
    b.add_branch("z72", 7, 2, zero_impedance());
    b.add_branch("l57", 5, 7, line());
    b.add_branch("l58", 5, 8, line());
    b.add_branch("l89", 8, 9, line());
    b.add_branch("l94", 9, 4, line());

    let sh = b.add_shunt("svc", 4, 0.0, 0.05);
    sh.voltage_control_enabled = true;
    b.add_shunt("cap", 2, 0.0, -0.02);
    b.add_hvdc("link", 0, 4, 0.1, 0.5);

    b.add_voltage_control(VoltageControl::new(VoltageControlKind::Generator, 2, vec![1, 3], 1.0));
    b.add_voltage_control(VoltageControl::new(VoltageControlKind::Shunt, 4, vec![0], 1.0));
    b.add_voltage_control(VoltageControl::new(VoltageControlKind::Transformer, 5, vec![5], 1.0));
    b.add_phase_control(PhaseControl {
        controller_branch: 6,
        controlled_branch: 6,
        controlled_side: Side::One,
        mode: PhaseControlMode::Controller,
        unit: PhaseControlUnit::ActivePower,
        target_value: 0.1,
    });
    b.add_reactive_power_control(ReactivePowerControl {
        kind: ReactivePowerControlKind::Generator,
        controlled_branch: MIXED_Q_CONTROLLED,
        controlled_side: Side::One,
        controllers: vec![8, 9],
        target_q: -0.05,
    });
    build(b)
}

/// Controllers of [`mixed`] that can be switched on and off.
pub fn mixed_controllers() -> Vec<ControllerRef> {
    vec![
        ControllerRef::GeneratorVoltage(0),
        ControllerRef::GeneratorVoltage(1),
        ControllerRef::GeneratorVoltage(3),
        ControllerRef::ShuntVoltage(0),
        ControllerRef::TransformerVoltage(5),
        ControllerRef::PhaseShifter(6),
        ControllerRef::GeneratorReactivePower(8),
        ControllerRef::GeneratorReactivePower(9),
    ]
}
