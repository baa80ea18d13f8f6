use nalgebra::DVector;

use super::{TermFormula, undeclared_variable};
use crate::basic::equations::types::VariableId;
use crate::basic::network::{Hvdc, Side};

/// Active power leaving a bus into an HVDC line emulating an AC line.
///
/// The transfer `p0 + k (phi1 - phi2)` is clamped to the line limits. The
/// side with the larger angle is the controller; the other side sees the
/// transfer reduced by both converter losses.
#[derive(Debug, Clone, PartialEq)]
pub struct HvdcTerm {
    side: Side,
    p0: f64,
    k: f64,
    loss_multiplier: f64,
    p_max_from_1_to_2: f64,
    p_max_from_2_to_1: f64,
    list: [VariableId; 2],
}

impl HvdcTerm {
    pub fn new(side: Side, hvdc: &Hvdc, ph1: VariableId, ph2: VariableId) -> Self {
        Self {
            side,
            p0: hvdc.p0,
            k: hvdc.k,
            loss_multiplier: (1.0 - hvdc.loss_factor1) * (1.0 - hvdc.loss_factor2),
            p_max_from_1_to_2: hvdc.p_max_from_1_to_2,
            p_max_from_2_to_1: hvdc.p_max_from_2_to_1,
            list: [ph1, ph2],
        }
    }

    fn raw(&self, x: &DVector<f64>) -> f64 {
        self.p0 + self.k * (x[*self.list[0]] - x[*self.list[1]])
    }

    fn is_side_one_controller(&self, x: &DVector<f64>) -> bool {
        x[*self.list[0]] >= x[*self.list[1]]
    }

    fn is_saturated(&self, raw: f64) -> bool {
        raw > self.p_max_from_1_to_2 || raw < -self.p_max_from_2_to_1
    }

    /// Factor applied to the bounded transfer on this side.
    fn side_factor(&self, x: &DVector<f64>) -> f64 {
        // the controller side carries no loss
        match (self.side, self.is_side_one_controller(x)) {
            (Side::One, true) => 1.0,
            (Side::Two, true) => -self.loss_multiplier,
            (Side::One, false) => self.loss_multiplier,
            (Side::Two, false) => -1.0,
        }
    }
}

impl TermFormula for HvdcTerm {
    fn variables(&self) -> &[VariableId] {
        &self.list
    }

    fn eval(&self, x: &DVector<f64>) -> f64 {
        let raw = self.raw(x);
        let bounded = raw.clamp(-self.p_max_from_2_to_1, self.p_max_from_1_to_2);
        self.side_factor(x) * bounded
    }

    fn der(&self, x: &DVector<f64>, v: VariableId) -> f64 {
        let sign = if v == self.list[0] {
            1.0
        } else if v == self.list[1] {
            -1.0
        } else {
            undeclared_variable(self.name(), v)
        };
        let raw = self.raw(x);
        if self.is_saturated(raw) {
            0.0
        } else {
            sign * self.k * self.side_factor(x)
        }
    }

    fn name(&self) -> &'static str {
        "hvdc ac emulation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::equations::term::assert_derivatives;
    use approx::assert_relative_eq;

    fn line() -> Hvdc {
        let mut h = Hvdc::new(0, "hvdc", 0, 1, 0.2, 5.0);
        h.loss_factor1 = 0.01;
        h.loss_factor2 = 0.02;
        h.p_max_from_1_to_2 = 1.0;
        h.p_max_from_2_to_1 = 0.5;
        h
    }

    #[test]
    fn test_direction_decides_losses() {
        let h = line();
        let p1 = HvdcTerm::new(Side::One, &h, VariableId(0), VariableId(1));
        let p2 = HvdcTerm::new(Side::Two, &h, VariableId(0), VariableId(1));
        let loss = 0.99 * 0.98;

        // 0.2 + 5 * 0.1 = 0.7 from 1 to 2
        let x = DVector::from_vec(vec![0.1, 0.0]);
        assert_relative_eq!(p1.eval(&x), 0.7, epsilon = 1e-12);
        assert_relative_eq!(p2.eval(&x), -0.7 * loss, epsilon = 1e-12);

        // 0.2 - 5 * 0.1 = -0.3 from 2 to 1
        let x = DVector::from_vec(vec![0.0, 0.1]);
        assert_relative_eq!(p1.eval(&x), -0.3 * loss, epsilon = 1e-12);
        assert_relative_eq!(p2.eval(&x), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_angles_decide_controller_side() {
        let h = line();
        let p1 = HvdcTerm::new(Side::One, &h, VariableId(0), VariableId(1));
        let p2 = HvdcTerm::new(Side::Two, &h, VariableId(0), VariableId(1));
        let loss = 0.99 * 0.98;

        // 0.2 - 5 * 0.02 = 0.1 still flows from 1 to 2, but bus 2 leads
        let x = DVector::from_vec(vec![0.0, 0.02]);
        assert_relative_eq!(p1.eval(&x), 0.1 * loss, epsilon = 1e-12);
        assert_relative_eq!(p2.eval(&x), -0.1, epsilon = 1e-12);
        assert_relative_eq!(p1.der(&x, VariableId(0)), 5.0 * loss, epsilon = 1e-12);

        // equal angles, side 1 controls
        let x = DVector::from_vec(vec![0.01, 0.01]);
        assert_relative_eq!(p1.eval(&x), 0.2, epsilon = 1e-12);
        assert_relative_eq!(p2.eval(&x), -0.2 * loss, epsilon = 1e-12);
    }

    #[test]
    fn test_saturation() {
        let h = line();
        let p1 = HvdcTerm::new(Side::One, &h, VariableId(0), VariableId(1));
        let x = DVector::from_vec(vec![1.0, 0.0]);
        assert_relative_eq!(p1.eval(&x), 1.0);
        assert_eq!(p1.der(&x, VariableId(0)), 0.0);
        let x = DVector::from_vec(vec![0.0, 1.0]);
        assert_relative_eq!(p1.eval(&x), -0.5 * 0.99 * 0.98, epsilon = 1e-12);
        assert_eq!(p1.der(&x, VariableId(1)), 0.0);
    }

    #[test]
    fn test_hvdc_derivatives() {
        let h = line();
        for x in [vec![0.05, -0.02], vec![-0.05, 0.03]] {
            let x = DVector::from_vec(x);
            assert_derivatives(&HvdcTerm::new(Side::One, &h, VariableId(0), VariableId(1)), &x);
            assert_derivatives(&HvdcTerm::new(Side::Two, &h, VariableId(0), VariableId(1)), &x);
        }
    }
}
