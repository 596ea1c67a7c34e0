use std::fmt;

/// A coordinate in descriptor space (e.g. a pair of binding energies).
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorPoint(Vec<f64>);

impl DescriptorPoint {
    pub fn new(coordinates: Vec<f64>) -> Self {
        Self(coordinates)
    }

    pub fn coordinates(&self) -> &[f64] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn midpoint(&self, other: &Self) -> Self {
        Self(
            self.0
                .iter()
                .zip(&other.0)
                .map(|(a, b)| 0.5 * (a + b))
                .collect(),
        )
    }

    /// Steps `offset` grid units along each dimension.
    pub fn offset(&self, offset: &[i64], spacing: &[f64]) -> Self {
        Self(
            self.0
                .iter()
                .zip(offset)
                .zip(spacing)
                .map(|((x, k), h)| x + *k as f64 * h)
                .collect(),
        )
    }
}

impl From<Vec<f64>> for DescriptorPoint {
    fn from(coordinates: Vec<f64>) -> Self {
        Self(coordinates)
    }
}

impl fmt::Display for DescriptorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, x) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.4}", x)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_averages_each_coordinate() {
        let a = DescriptorPoint::new(vec![0.0, 1.0]);
        let b = DescriptorPoint::new(vec![1.0, -1.0]);
        assert_eq!(a.midpoint(&b), DescriptorPoint::new(vec![0.5, 0.0]));
    }

    #[test]
    fn offset_moves_in_grid_units() {
        let p = DescriptorPoint::new(vec![0.0, 1.0]);
        let q = p.offset(&[2, -1], &[0.25, 0.5]);
        assert_eq!(q, DescriptorPoint::new(vec![0.5, 0.5]));
    }

    #[test]
    fn display_lists_coordinates() {
        let p = DescriptorPoint::new(vec![0.5, -1.25]);
        assert_eq!(p.to_string(), "(0.5000, -1.2500)");
    }
}
