/// A PDF number, which can be integer or real.
///
/// The specification does not mandate particular bit widths, so `i64` and `f64` were chosen.
/// Values with a decimal dot parse as [`Number::Real`], even with no fractional part (`1.0`).
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Number {
    Int(i64),
    Real(f64)
}
