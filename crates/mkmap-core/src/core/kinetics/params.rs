/// Forward and reverse rate constants, one pair per elementary step.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterVector {
    pub forward: Vec<f64>,
    pub reverse: Vec<f64>,
}

impl ParameterVector {
    pub fn new(forward: Vec<f64>, reverse: Vec<f64>) -> Self {
        Self { forward, reverse }
    }

    /// Builds a vector from `(forward, reverse)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let (forward, reverse) = pairs.into_iter().unzip();
        Self { forward, reverse }
    }

    pub fn step_count(&self) -> usize {
        self.forward.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_splits_forward_and_reverse() {
        let params = ParameterVector::from_pairs([(2.0, 1.0), (5.0, 0.0)]);
        assert_eq!(params.forward, vec![2.0, 5.0]);
        assert_eq!(params.reverse, vec![1.0, 0.0]);
        assert_eq!(params.step_count(), 2);
    }
}
