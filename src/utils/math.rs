//! Math utility functions

/// Softmax probability of entry `idx`; 0 when `idx` is out of range
pub fn softmax_at(x: &[f32], idx: usize) -> f32 {
    let peak = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let norm: f32 = x.iter().map(|&v| (v - peak).exp()).sum();
    x.get(idx).map_or(0.0, |&v| (v - peak).exp() / norm)
}

/// Argmax - index of the maximum value, first one on ties
pub fn argmax(x: &[f32]) -> usize {
    x.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (idx, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((idx, v)),
        })
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_at() {
        let x = [1.0, 2.0, 3.0];
        let p: Vec<f32> = (0..3).map(|i| softmax_at(&x, i)).collect();
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(p[2] > p[1] && p[1] > p[0]);
        assert_eq!(softmax_at(&x, 3), 0.0);

        // Large logits must not overflow
        assert!((softmax_at(&[1000.0, 1000.0], 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_argmax() {
        let x = vec![1.0, 5.0, 3.0, 2.0];
        assert_eq!(argmax(&x), 1);
    }

    #[test]
    fn test_argmax_ties_pick_first() {
        assert_eq!(argmax(&[2.0, 7.0, 7.0]), 1);
        assert_eq!(argmax(&[]), 0);
    }
}
