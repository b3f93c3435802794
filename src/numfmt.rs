// src/numfmt.rs
//
// Number formatting the solver's input reader understands.
// Rust's `{:e}` writes "3.5e2"; the solver and the run-naming convention expect
// "3.5e+02" (signed exponent, at least two digits).

/// Scientific notation with `precision` mantissa digits and a padded, signed exponent.
pub fn sci(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return format!("{value}");
    }
    let raw = format!("{:.*e}", precision, value);
    let Some((mantissa, exp)) = raw.split_once('e') else {
        return raw;
    };
    let exp: i32 = match exp.parse() {
        Ok(e) => e,
        Err(_) => return raw,
    };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.abs())
}

/// Parse a numeric token, accepting Fortran-style `d`/`D` exponents.
pub fn parse_float_token(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<f64>() {
        return Some(v);
    }
    if s.contains(['d', 'D']) {
        return s.replace(['d', 'D'], "e").parse::<f64>().ok();
    }
    None
}
