//! Categorical action distribution
use tch::{Kind, Tensor};

/// Categorical distribution(s).
#[derive(Debug)]
pub struct Categorical {
    /// Log probability of each event.
    ///
    /// A float tensor of shape `[BATCH_SHAPE.., NUM_EVENTS]`.
    logits: Tensor,
}

impl Categorical {
    /// Initialze from possibly unnormalized log probabilities.
    ///
    /// The log probabilities are normalized by adding some value `C` to each
    /// such that `sum_i exp(log_prob[i] + C) = 1`.
    pub fn new(logits: &Tensor) -> Self {
        Self {
            logits: logits.log_softmax(-1, Kind::Float),
        }
    }

    /// Normalized log probability of each event.
    pub const fn logits(&self) -> &Tensor {
        &self.logits
    }

    /// Probability of each event.
    pub fn probs(&self) -> Tensor {
        self.logits.exp()
    }

    /// Log probability of the given event indices.
    ///
    /// `elements` is an i64 tensor of shape `[BATCH_SHAPE..]`.
    pub fn log_probs(&self, elements: &Tensor) -> Tensor {
        self.logits
            .gather(-1, &elements.unsqueeze(-1), false)
            .squeeze_dim(-1)
    }

    /// Entropy of each distribution in nats.
    pub fn entropy(&self) -> Tensor {
        // Zero-probability events have -inf logits; 0 * -inf is nan
        let clamped_logits = self.logits.clamp_min(f64::from(f32::MIN));
        -(clamped_logits * self.logits.exp()).sum_dim_intlist(&[-1], false, Kind::Float)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_probs() {
        let logits = Tensor::of_slice(&[
            // elem: 1
            f32::NEG_INFINITY,
            0.0,
            f32::NEG_INFINITY,
            // elem: 0
            f32::NEG_INFINITY,
            0.0,
            f32::NEG_INFINITY,
            // elem: 2
            f32::NEG_INFINITY,
            0.0,
            0.0,
        ])
        .reshape(&[3, 3]);
        let distribution = Categorical::new(&logits);
        let elements = Tensor::of_slice(&[1_i64, 0, 2]);
        let actual = distribution.log_probs(&elements);
        let expected = Tensor::of_slice(&[0.0, f32::NEG_INFINITY, -(2.0_f32.ln())]);
        assert_eq!(actual, expected);
    }

    #[test]
    fn normalizes_logits() {
        let logits = Tensor::of_slice(&[1.0_f32, 1.0, 3.0, 3.0]).reshape(&[2, 2]);
        let distribution = Categorical::new(&logits);
        let expected = Tensor::of_slice(&[0.5_f32, 0.5, 0.5, 0.5]).reshape(&[2, 2]);
        assert!(distribution.probs().allclose(&expected, 1e-6, 1e-6, false));
    }

    #[test]
    fn entropy() {
        let logits = Tensor::of_slice(&[
            // Deterministic
            f32::NEG_INFINITY,
            0.0,
            f32::NEG_INFINITY,
            // Uniform over two
            f32::NEG_INFINITY,
            0.0,
            0.0,
            // Uniform over three
            0.0,
            0.0,
            0.0,
        ])
        .reshape(&[3, 3]);
        let distribution = Categorical::new(&logits);
        let actual = distribution.entropy();
        let expected = Tensor::of_slice(&[0.0, 2.0_f32.ln(), 3.0_f32.ln()]);
        assert!(
            actual.allclose(&expected, 1e-6, 1e-6, false),
            "expected: {:?}\nactual: {:?}",
            expected,
            actual
        );
    }
}
