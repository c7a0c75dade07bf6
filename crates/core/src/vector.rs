//! Embedding dimensions and vector helpers.
//!
//! The dimensions are compile-time constants and must match the vector
//! column widths in the scenes/face_profiles schema. The model service
//! reports them from `/health` so a mismatch is caught at deploy time.

use crate::error::CoreError;

/// Dimensionality of scene transcript embeddings (`scenes.text_vec`).
pub const TEXT_EMBEDDING_DIM: usize = 1024;

/// Dimensionality of scene frame embeddings (`scenes.image_vec`).
pub const VISION_EMBEDDING_DIM: usize = 1152;

/// Dimensionality of face embeddings (`face_profiles.face_vec`).
pub const FACE_EMBEDDING_DIM: usize = 512;

/// Tolerance for the unit-norm invariant: `|‖v‖₂ − 1| < 1e-3`.
pub const UNIT_NORM_EPSILON: f32 = 1e-3;

/// Euclidean norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalize a vector to unit length in place.
///
/// Returns `false` (leaving the input untouched) when the norm is zero or
/// non-finite, since such a vector cannot be normalized.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if norm <= f32::EPSILON || !norm.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// Whether a vector satisfies the persisted unit-norm invariant.
pub fn is_unit_norm(v: &[f32]) -> bool {
    (l2_norm(v) - 1.0).abs() < UNIT_NORM_EPSILON
}

/// Validate that an embedding has the expected dimensionality.
pub fn validate_dimension(v: &[f32], expected: usize, label: &str) -> Result<(), CoreError> {
    if v.len() != expected {
        return Err(CoreError::Validation(format!(
            "{label} embedding must be {expected}-dimensional, got {}",
            v.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_unit_length() {
        let mut v = vec![3.0, 4.0];
        assert!(l2_normalize(&mut v));
        assert!(is_unit_norm(&v));
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_cannot_be_normalized() {
        let mut v = vec![0.0; 8];
        assert!(!l2_normalize(&mut v));
        assert!(!is_unit_norm(&v));
    }

    #[test]
    fn already_normalized_vector_is_stable() {
        let mut v = vec![1.0, 0.0, 0.0];
        assert!(l2_normalize(&mut v));
        assert_eq!(v, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn unit_norm_tolerance_matches_invariant() {
        // Norm within [0.999, 1.001] passes, outside fails.
        assert!(is_unit_norm(&[0.9995]));
        assert!(!is_unit_norm(&[0.99]));
        assert!(!is_unit_norm(&[1.01]));
    }

    #[test]
    fn dimension_validation() {
        let v = vec![0.0; TEXT_EMBEDDING_DIM];
        validate_dimension(&v, TEXT_EMBEDDING_DIM, "text").unwrap();
        let err = validate_dimension(&v, VISION_EMBEDDING_DIM, "vision").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
