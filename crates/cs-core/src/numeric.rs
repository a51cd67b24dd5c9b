use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

/// Pass `v` through if finite.
pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Divide `num` by `den`, failing on an exactly-zero denominator.
///
/// The quotient is also checked for finiteness so overflow surfaces here
/// instead of leaking into downstream state.
pub fn checked_div(num: Real, den: Real, what: &'static str) -> Result<Real, CoreError> {
    if den == 0.0 {
        return Err(CoreError::DivisionByZero { what });
    }
    ensure_finite(num / den, what)
}

/// `n` evenly spaced samples over `[start, end]`, both ends included.
pub fn linspace(start: Real, end: Real, n: usize) -> Vec<Real> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as Real;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as Real })
                .collect()
        }
    }
}
