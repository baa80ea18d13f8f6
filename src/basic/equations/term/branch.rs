use derive_more::Display;
use nalgebra::DVector;
use num_traits::Zero;

use super::{TermFormula, undeclared_variable};
use crate::basic::equations::types::VariableId;
use crate::basic::network::{PiModel, Side};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchQuantity {
    P,
    Q,
    /// Current magnitude, `|S| / v` at the measured bus.
    I,
}

/// State variables a branch flow depends on.
///
/// When `a1` or `r1` is `None` the pi model's constant value is used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchVariables {
    pub v1: VariableId,
    pub v2: VariableId,
    pub ph1: VariableId,
    pub ph2: VariableId,
    pub a1: Option<VariableId>,
    pub r1: Option<VariableId>,
}

const V1: usize = 0;
const V2: usize = 1;
const PH1: usize = 2;
const PH2: usize = 3;
const A1: usize = 4;
const R1: usize = 5;

/// Value and gradient over `[v1, v2, ph1, ph2, a1, r1]`.
#[derive(Debug, Clone, Copy)]
struct Flow {
    value: f64,
    grad: [f64; 6],
}

/// Flow through a branch connected at both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedBranchTerm {
    side: Side,
    quantity: BranchQuantity,
    pi: PiModel,
    vars: BranchVariables,
    list: Vec<VariableId>,
}

impl ClosedBranchTerm {
    pub fn new(side: Side, quantity: BranchQuantity, pi: PiModel, vars: BranchVariables) -> Self {
        let mut list = vec![vars.v1, vars.v2, vars.ph1, vars.ph2];
        list.extend(vars.a1);
        list.extend(vars.r1);
        Self {
            side,
            quantity,
            pi,
            vars,
            list,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn quantity(&self) -> BranchQuantity {
        self.quantity
    }

    fn state(&self, x: &DVector<f64>) -> [f64; 6] {
        let vars = &self.vars;
        [
            x[*vars.v1],
            x[*vars.v2],
            x[*vars.ph1],
            x[*vars.ph2],
            vars.a1.map_or(self.pi.a1, |v| x[*v]),
            vars.r1.map_or(self.pi.r1, |v| x[*v]),
        ]
    }

    fn slot(&self, v: VariableId) -> Option<usize> {
        let vars = &self.vars;
        if v == vars.v1 {
            Some(V1)
        } else if v == vars.v2 {
            Some(V2)
        } else if v == vars.ph1 {
            Some(PH1)
        } else if v == vars.ph2 {
            Some(PH2)
        } else if Some(v) == vars.a1 {
            Some(A1)
        } else if Some(v) == vars.r1 {
            Some(R1)
        } else {
            None
        }
    }

    /// Active and reactive power entering the branch at the measured side.
    fn powers(&self, s: &[f64; 6]) -> (Flow, Flow) {
        let [v1, v2, ph1, ph2, a1, r1] = *s;
        let pi = &self.pi;
        let y = pi.y();
        let ksi = pi.ksi();
        let (sin_ksi, cos_ksi) = ksi.sin_cos();
        match self.side {
            Side::One => {
                let (st, ct) = (ksi - a1 - ph1 + ph2).sin_cos();
                let dp_dph = y * r1 * v1 * v2 * ct;
                let dq_dph = -y * r1 * v1 * v2 * st;
                let p = Flow {
                    value: r1 * v1 * (pi.g1 * r1 * v1 + y * r1 * v1 * sin_ksi - y * v2 * st),
                    grad: [
                        r1 * (2.0 * pi.g1 * r1 * v1 + 2.0 * y * r1 * v1 * sin_ksi - y * v2 * st),
                        -y * r1 * v1 * st,
                        dp_dph,
                        -dp_dph,
                        dp_dph,
                        v1 * (2.0 * r1 * v1 * (pi.g1 + y * sin_ksi) - y * v2 * st),
                    ],
                };
                let q = Flow {
                    value: r1 * v1 * (-pi.b1 * r1 * v1 + y * r1 * v1 * cos_ksi - y * v2 * ct),
                    grad: [
                        r1 * (-2.0 * pi.b1 * r1 * v1 + 2.0 * y * r1 * v1 * cos_ksi - y * v2 * ct),
                        -y * r1 * v1 * ct,
                        dq_dph,
                        -dq_dph,
                        dq_dph,
                        v1 * (2.0 * r1 * v1 * (-pi.b1 + y * cos_ksi) - y * v2 * ct),
                    ],
                };
                (p, q)
            }
            Side::Two => {
                let (st, ct) = (ksi + a1 + ph1 - ph2).sin_cos();
                let dp_dph = -y * r1 * v1 * v2 * ct;
                let dq_dph = y * r1 * v1 * v2 * st;
                let p = Flow {
                    value: v2 * (pi.g2 * v2 - y * r1 * v1 * st + y * v2 * sin_ksi),
                    grad: [
                        -y * r1 * v2 * st,
                        2.0 * pi.g2 * v2 - y * r1 * v1 * st + 2.0 * y * v2 * sin_ksi,
                        dp_dph,
                        -dp_dph,
                        dp_dph,
                        -y * v1 * v2 * st,
                    ],
                };
                let q = Flow {
                    value: v2 * (-pi.b2 * v2 - y * r1 * v1 * ct + y * v2 * cos_ksi),
                    grad: [
                        -y * r1 * v2 * ct,
                        -2.0 * pi.b2 * v2 - y * r1 * v1 * ct + 2.0 * y * v2 * cos_ksi,
                        dq_dph,
                        -dq_dph,
                        dq_dph,
                        -y * v1 * v2 * ct,
                    ],
                };
                (p, q)
            }
        }
    }

    fn flow(&self, s: &[f64; 6]) -> Flow {
        let (p, q) = self.powers(s);
        match self.quantity {
            BranchQuantity::P => p,
            BranchQuantity::Q => q,
            BranchQuantity::I => {
                let v_slot = match self.side {
                    Side::One => V1,
                    Side::Two => V2,
                };
                current(p, q, s[v_slot], v_slot)
            }
        }
    }
}

/// `sqrt(p² + q²) / v` with its gradient; the gradient is zero at zero flow.
fn current(p: Flow, q: Flow, v: f64, v_slot: usize) -> Flow {
    let s = p.value.hypot(q.value);
    let value = s / v;
    let mut grad = [0.0; 6];
    if !s.is_zero() {
        for (k, g) in grad.iter_mut().enumerate() {
            *g = (p.value * p.grad[k] + q.value * q.grad[k]) / (s * v);
        }
        grad[v_slot] -= value / v;
    }
    Flow { value, grad }
}

impl TermFormula for ClosedBranchTerm {
    fn variables(&self) -> &[VariableId] {
        &self.list
    }

    fn eval(&self, x: &DVector<f64>) -> f64 {
        self.flow(&self.state(x)).value
    }

    fn der(&self, x: &DVector<f64>, v: VariableId) -> f64 {
        let Some(slot) = self.slot(v) else {
            undeclared_variable(self.name(), v);
        };
        self.flow(&self.state(x)).grad[slot]
    }

    fn name(&self) -> &'static str {
        match self.quantity {
            BranchQuantity::P => "closed branch active power",
            BranchQuantity::Q => "closed branch reactive power",
            BranchQuantity::I => "closed branch current",
        }
    }
}

/// Flow at the connected side of a branch whose other side is open.
///
/// The series admittance and the far shunt admittance collapse into a single
/// equivalent admittance seen from the measured side.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenBranchTerm {
    side: Side,
    quantity: BranchQuantity,
    pi: PiModel,
    v: VariableId,
    r1: Option<VariableId>,
    list: Vec<VariableId>,
}

impl OpenBranchTerm {
    /// `r1` is only meaningful when measuring side 1.
    pub fn new(
        side: Side,
        quantity: BranchQuantity,
        pi: PiModel,
        v: VariableId,
        r1: Option<VariableId>,
    ) -> Self {
        let r1 = r1.filter(|_| side == Side::One);
        let mut list = vec![v];
        list.extend(r1);
        Self {
            side,
            quantity,
            pi,
            v,
            r1,
            list,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Returns the value and its derivatives with respect to `v` and rho.
    fn flow(&self, x: &DVector<f64>) -> (f64, f64, f64) {
        let pi = &self.pi;
        let ys = pi.series_admittance();
        let (near, far) = match self.side {
            Side::One => (pi.shunt1(), pi.shunt2()),
            Side::Two => (pi.shunt2(), pi.shunt1()),
        };
        let yeq = near + ys * far / (ys + far);
        let v = x[*self.v];
        let rho = match self.side {
            Side::One => self.r1.map_or(pi.r1, |r| x[*r]),
            Side::Two => 1.0,
        };
        // value = c * rho^2 * v^n
        let (c, n) = match self.quantity {
            BranchQuantity::P => (yeq.re, 2),
            BranchQuantity::Q => (-yeq.im, 2),
            BranchQuantity::I => (yeq.norm(), 1),
        };
        let value = c * rho * rho * v.powi(n);
        let dv = c * rho * rho * f64::from(n) * v.powi(n - 1);
        let drho = 2.0 * c * rho * v.powi(n);
        (value, dv, drho)
    }
}

impl TermFormula for OpenBranchTerm {
    fn variables(&self) -> &[VariableId] {
        &self.list
    }

    fn eval(&self, x: &DVector<f64>) -> f64 {
        self.flow(x).0
    }

    fn der(&self, x: &DVector<f64>, v: VariableId) -> f64 {
        let (_, dv, drho) = self.flow(x);
        if v == self.v {
            dv
        } else if Some(v) == self.r1 {
            drho
        } else {
            undeclared_variable(self.name(), v)
        }
    }

    fn name(&self) -> &'static str {
        match self.quantity {
            BranchQuantity::P => "open branch active power",
            BranchQuantity::Q => "open branch reactive power",
            BranchQuantity::I => "open branch current",
        }
    }
}
