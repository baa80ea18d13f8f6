use derive_more::Display;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// One end of a two-port element.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[display("1")]
    One,
    #[display("2")]
    Two,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }

    pub(crate) fn idx(self) -> usize {
        match self {
            Side::One => 0,
            Side::Two => 1,
        }
    }
}

/// Voltage dependence of a load as a sum of `c * v^n` terms.
///
/// The consumption at voltage `v` is `p0 * Σ c_i v^n_i` (same for reactive power).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadModel {
    pub p0: f64,
    pub q0: f64,
    pub p_terms: Vec<(f64, f64)>,
    pub q_terms: Vec<(f64, f64)>,
}

impl LoadModel {
    /// ZIP model: constant impedance, constant current and constant power shares.
    pub fn zip(p0: f64, q0: f64, z: f64, i: f64, p: f64) -> Self {
        let terms = vec![(z, 2.0), (i, 1.0), (p, 0.0)];
        Self {
            p0,
            q0,
            p_terms: terms.clone(),
            q_terms: terms,
        }
    }

    pub fn exponential(p0: f64, q0: f64, np: f64, nq: f64) -> Self {
        Self {
            p0,
            q0,
            p_terms: vec![(1.0, np)],
            q_terms: vec![(1.0, nq)],
        }
    }
}

/// A network node. All powers are per unit, positive when injected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub num: usize,
    pub name: String,
    pub generation_target_p: f64,
    pub generation_target_q: f64,
    pub load_target_p: f64,
    pub load_target_q: f64,
    /// Voltage dependent part of the load, excluded from `load_target_*`.
    pub load_model: Option<LoadModel>,
    pub slack: bool,
    pub reference: bool,
    pub disabled: bool,
    pub generator_voltage_control_enabled: bool,
    pub generator_reactive_power_control_enabled: bool,
    /// Participation key in shared reactive power distribution.
    pub reactive_key: f64,
    /// Droop of a local generator voltage control, `v + slope * q = target_v`.
    pub generator_slope: Option<f64>,
    pub initial_v: f64,
    pub initial_angle: f64,
}

impl Bus {
    pub fn new(num: usize, name: impl Into<String>) -> Self {
        Self {
            num,
            name: name.into(),
            generation_target_p: 0.0,
            generation_target_q: 0.0,
            load_target_p: 0.0,
            load_target_q: 0.0,
            load_model: None,
            slack: false,
            reference: false,
            disabled: false,
            generator_voltage_control_enabled: false,
            generator_reactive_power_control_enabled: false,
            reactive_key: 1.0,
            generator_slope: None,
            initial_v: 1.0,
            initial_angle: 0.0,
        }
    }

    pub fn target_p(&self) -> f64 {
        self.generation_target_p - self.load_target_p
    }

    pub fn target_q(&self) -> f64 {
        self.generation_target_q - self.load_target_q
    }
}

/// Pi model of a branch with an ideal transformer on side 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PiModel {
    pub r: f64,
    pub x: f64,
    pub g1: f64,
    pub b1: f64,
    pub g2: f64,
    pub b2: f64,
    /// Ratio on side 1.
    pub r1: f64,
    /// Phase shift on side 1, radians.
    pub a1: f64,
}

impl Default for PiModel {
    fn default() -> Self {
        Self {
            r: 0.0,
            x: 0.0,
            g1: 0.0,
            b1: 0.0,
            g2: 0.0,
            b2: 0.0,
            r1: 1.0,
            a1: 0.0,
        }
    }
}

impl PiModel {
    pub fn line(r: f64, x: f64, b: f64) -> Self {
        Self {
            r,
            x,
            b1: b / 2.0,
            b2: b / 2.0,
            ..Default::default()
        }
    }

    pub fn z(&self) -> f64 {
        self.r.hypot(self.x)
    }

    /// Series admittance magnitude.
    pub fn y(&self) -> f64 {
        1.0 / self.z()
    }

    /// Angle such that `y sin(ksi)` is the series conductance.
    pub fn ksi(&self) -> f64 {
        self.r.atan2(self.x)
    }

    pub fn series_admittance(&self) -> Complex64 {
        Complex64::new(1.0, 0.0) / Complex64::new(self.r, self.x)
    }

    pub fn shunt1(&self) -> Complex64 {
        Complex64::new(self.g1, self.b1)
    }

    pub fn shunt2(&self) -> Complex64 {
        Complex64::new(self.g2, self.b2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub num: usize,
    pub name: String,
    pub bus1: Option<usize>,
    pub bus2: Option<usize>,
    pub pi: PiModel,
    /// Breaker state per side.
    pub connected: [bool; 2],
    /// Sides that may open while the other stays energized.
    pub disconnection_allowed: [bool; 2],
    pub disabled: bool,
    pub voltage_control_enabled: bool,
    pub phase_control_enabled: bool,
    pub reactive_power_control_enabled: bool,
}

impl Branch {
    pub fn new(num: usize, name: impl Into<String>, bus1: usize, bus2: usize, pi: PiModel) -> Self {
        Self {
            num,
            name: name.into(),
            bus1: Some(bus1),
            bus2: Some(bus2),
            pi,
            connected: [true, true],
            disconnection_allowed: [true, true],
            disabled: false,
            voltage_control_enabled: false,
            phase_control_enabled: false,
            reactive_power_control_enabled: false,
        }
    }

    pub fn bus(&self, side: Side) -> Option<usize> {
        match side {
            Side::One => self.bus1,
            Side::Two => self.bus2,
        }
    }

    /// Side of this branch attached to `bus`, side 1 first.
    pub fn side_of(&self, bus: usize) -> Option<Side> {
        if self.bus1 == Some(bus) {
            Some(Side::One)
        } else if self.bus2 == Some(bus) {
            Some(Side::Two)
        } else {
            None
        }
    }

    pub fn is_zero_impedance(&self, threshold: f64) -> bool {
        self.bus1.is_some() && self.bus2.is_some() && self.pi.z() < threshold
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shunt {
    pub num: usize,
    pub name: String,
    pub bus: usize,
    pub g: f64,
    pub b: f64,
    pub disabled: bool,
    pub voltage_control_enabled: bool,
}

impl Shunt {
    pub fn new(num: usize, name: impl Into<String>, bus: usize, g: f64, b: f64) -> Self {
        Self {
            num,
            name: name.into(),
            bus,
            g,
            b,
            disabled: false,
            voltage_control_enabled: false,
        }
    }
}

/// HVDC line parameters used by AC emulation, `p = p0 + k (phi1 - phi2)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hvdc {
    pub num: usize,
    pub name: String,
    pub bus1: usize,
    pub bus2: usize,
    pub p0: f64,
    pub k: f64,
    pub loss_factor1: f64,
    pub loss_factor2: f64,
    pub p_max_from_1_to_2: f64,
    pub p_max_from_2_to_1: f64,
    pub ac_emulation: bool,
    pub disabled: bool,
}

impl Hvdc {
    pub fn new(
        num: usize,
        name: impl Into<String>,
        bus1: usize,
        bus2: usize,
        p0: f64,
        k: f64,
    ) -> Self {
        Self {
            num,
            name: name.into(),
            bus1,
            bus2,
            p0,
            k,
            loss_factor1: 0.0,
            loss_factor2: 0.0,
            p_max_from_1_to_2: f64::INFINITY,
            p_max_from_2_to_1: f64::INFINITY,
            ac_emulation: true,
            disabled: false,
        }
    }
}
