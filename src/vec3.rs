// src/vec3.rs

#[inline]
pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Euclidean length.
#[inline]
pub fn norm(v: [f64; 3]) -> f64 {
    dot(v, v).sqrt()
}

#[inline]
pub fn scale(v: [f64; 3], s: f64) -> [f64; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// True when every component is within `atol` of zero (vacuum sites).
#[inline]
pub fn is_near_zero(v: [f64; 3], atol: f64) -> bool {
    v.iter().all(|c| c.abs() <= atol)
}

/// Unit vector along `v`; a zero vector maps to +z.
#[inline]
pub fn normalize(v: [f64; 3]) -> [f64; 3] {
    let n2 = dot(v, v);
    if n2 == 0.0 {
        return [0.0, 0.0, 1.0];
    }
    scale(v, 1.0 / n2.sqrt())
}

/// In-plane unit direction at `phi_deg` from +x.
#[inline]
pub fn in_plane_direction(phi_deg: f64) -> [f64; 3] {
    let phi = phi_deg.to_radians();
    [phi.cos(), phi.sin(), 0.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_zero_and_scales_to_unit() {
        assert_eq!(normalize([0.0; 3]), [0.0, 0.0, 1.0]);
        let v = normalize([3.0, 0.0, 4.0]);
        assert!((norm(v) - 1.0).abs() < 1e-12);
        assert!((v[0] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn near_zero_uses_absolute_tolerance() {
        assert!(is_near_zero([1e-9, -1e-9, 0.0], 1e-8));
        assert!(!is_near_zero([0.0, 0.0, 1e-6], 1e-8));
    }
}
