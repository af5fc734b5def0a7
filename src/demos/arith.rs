use std::ops::Add;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithError {
    #[error("Cannot divide by zero")]
    DivideByZero,
}

/// "Hot" above 20 degrees, "Cold" otherwise.
pub fn classify_temperature(temp: f64) -> &'static str {
    if temp > 20.0 { "Hot" } else { "Cold" }
}

pub fn add<T: Add<Output = T>>(a: T, b: T) -> T {
    a + b
}

pub fn divide(a: f64, b: f64) -> Result<f64, ArithError> {
    if b == 0.0 {
        return Err(ArithError::DivideByZero);
    }
    Ok(a / b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_is_cold() {
        assert_eq!(classify_temperature(20.0), "Cold");
        assert_eq!(classify_temperature(20.5), "Hot");
    }

    #[test]
    fn test_divide_by_negative_zero() {
        assert_eq!(divide(1.0, -0.0), Err(ArithError::DivideByZero));
    }
}
