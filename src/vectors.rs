//! FAFCAS vector codec: normalize to unit length, store raw little-endian
//! `f32` bytes, score by dot product.
//!
//! Encoding divides by the L2 norm (zero-magnitude vectors are emitted as
//! all-zero bytes), so a stored vector's dot product with a unit query
//! equals cosine similarity. Decoding copies into an aligned `Vec<f32>`
//! rather than reinterpreting the BLOB in place: SQLite gives no alignment
//! guarantee for byte buffers.

const NORM_EPSILON: f32 = 1e-6;

/// L2-normalize and encode as little-endian `f32` bytes (`4 × dims`).
pub fn encode(vector: &[f32]) -> Vec<u8> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();

    let mut bytes = Vec::with_capacity(vector.len() * 4);
    if norm > NORM_EPSILON {
        for &v in vector {
            bytes.extend_from_slice(&(v / norm).to_le_bytes());
        }
    } else {
        for _ in vector {
            bytes.extend_from_slice(&0f32.to_le_bytes());
        }
    }
    bytes
}

/// Decode a stored BLOB back into `f32` components. Trailing bytes that do
/// not form a full `f32` are ignored.
pub fn decode(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Dot product. For unit vectors this equals cosine similarity.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2 norm, used by invariant checks.
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_produces_unit_vectors() {
        let blob = encode(&[3.0, 4.0]);
        assert_eq!(blob.len(), 8);
        let decoded = decode(&blob);
        assert!((norm(&decoded) - 1.0).abs() < 1e-5);
        assert!((decoded[0] - 0.6).abs() < 1e-6);
        assert!((decoded[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_encodes_as_zero_bytes() {
        let blob = encode(&[0.0, 0.0, 0.0]);
        assert!(blob.iter().all(|&b| b == 0));
        assert_eq!(decode(&blob), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn unit_dot_equals_cosine() {
        let a = decode(&encode(&[1.0, 2.0, 3.0]));
        let b = decode(&encode(&[1.0, 2.0, 3.0]));
        assert!((dot(&a, &b) - 1.0).abs() < 1e-5);

        let orth_a = decode(&encode(&[1.0, 0.0]));
        let orth_b = decode(&encode(&[0.0, 1.0]));
        assert!(dot(&orth_a, &orth_b).abs() < 1e-6);
    }

    #[test]
    fn byte_length_is_four_per_dim() {
        for dims in [1usize, 3, 384] {
            let v: Vec<f32> = (0..dims).map(|i| i as f32 + 1.0).collect();
            assert_eq!(encode(&v).len(), 4 * dims);
        }
    }
}
