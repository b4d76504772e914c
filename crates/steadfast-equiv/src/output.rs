use serde_json::{Number, Value};

/// Absolute tolerance for comparing floating-point outputs.
pub const FLOAT_TOLERANCE: f64 = 1e-6;

fn numbers_equivalent(a: &Number, b: &Number) -> bool {
    if a.is_f64() || b.is_f64() {
        match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= FLOAT_TOLERANCE,
            _ => false,
        }
    } else {
        a == b
    }
}

/// Compare two execution outputs.
///
/// Integers, strings, booleans and null compare exactly. Numbers compare
/// within [`FLOAT_TOLERANCE`] when either side is a float. Arrays compare
/// element-wise and objects key-wise, recursively.
pub fn outputs_equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equivalent(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| outputs_equivalent(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, x)| ym.get(k).is_some_and(|y| outputs_equivalent(x, y)))
        }
        _ => a == b,
    }
}
