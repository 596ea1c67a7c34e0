use crate::core::models::descriptor::DescriptorPoint;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error("Grid has no points")]
    Empty,
    #[error("Grid dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Axis {axis} has invalid bounds [{min}, {max}]")]
    InvalidAxis { axis: usize, min: f64, max: f64 },
    #[error("Axis {axis} has resolution 0; at least one point is required")]
    ZeroResolution { axis: usize },
    #[error("Grid point {index} has a non-finite coordinate")]
    NonFinitePoint { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
}

impl Axis {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// How the descriptor space is discretized.
#[derive(Debug, Clone, PartialEq)]
pub enum GridSpec {
    /// `resolution[i]` evenly spaced points on `axes[i]`, endpoints included.
    Regular {
        axes: Vec<Axis>,
        resolution: Vec<usize>,
    },
    /// Arbitrary points; the lattice spacing of each dimension is the smallest
    /// positive gap between distinct coordinates.
    Explicit(Vec<DescriptorPoint>),
}

/// Order in which the mapper visits grid points.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    /// Lexicographic in lattice indices, last dimension fastest.
    #[default]
    RowMajor,
    /// Row-major with alternate lines reversed, so consecutive points stay adjacent.
    Serpentine,
    /// Increasing Chebyshev lattice distance from `seed`, ties broken row-major.
    FromSeed { seed: Vec<i64> },
    /// The order in which points were generated or listed.
    AsListed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorGrid {
    points: Vec<DescriptorPoint>,
    lattice: Vec<Vec<i64>>,
    spacing: Vec<f64>,
    dimension: usize,
}

impl DescriptorGrid {
    pub fn new(spec: &GridSpec) -> Result<Self, GridError> {
        match spec {
            GridSpec::Regular { axes, resolution } => Self::regular(axes, resolution),
            GridSpec::Explicit(points) => Self::explicit(points),
        }
    }

    fn regular(axes: &[Axis], resolution: &[usize]) -> Result<Self, GridError> {
        if axes.is_empty() {
            return Err(GridError::Empty);
        }
        if resolution.len() != axes.len() {
            return Err(GridError::DimensionMismatch {
                expected: axes.len(),
                found: resolution.len(),
            });
        }
        for (idx, (axis, count)) in axes.iter().zip(resolution).enumerate() {
            if *count == 0 {
                return Err(GridError::ZeroResolution { axis: idx });
            }
            let ordered = axis.min < axis.max || (axis.min == axis.max && *count == 1);
            if !axis.min.is_finite() || !axis.max.is_finite() || !ordered {
                return Err(GridError::InvalidAxis {
                    axis: idx,
                    min: axis.min,
                    max: axis.max,
                });
            }
        }

        let spacing: Vec<f64> = axes
            .iter()
            .zip(resolution)
            .map(|(axis, count)| {
                if *count > 1 {
                    (axis.max - axis.min) / (*count - 1) as f64
                } else {
                    1.0
                }
            })
            .collect();

        let total: usize = resolution.iter().product();
        let mut points = Vec::with_capacity(total);
        let mut lattice = Vec::with_capacity(total);
        let mut index = vec![0usize; axes.len()];
        for _ in 0..total {
            let coordinates = index
                .iter()
                .zip(axes)
                .zip(&spacing)
                .zip(resolution)
                .map(|(((i, axis), h), count)| {
                    if *i + 1 == *count && *count > 1 {
                        axis.max
                    } else {
                        axis.min + *i as f64 * h
                    }
                })
                .collect();
            points.push(DescriptorPoint::new(coordinates));
            lattice.push(index.iter().map(|i| *i as i64).collect());

            for dim in (0..index.len()).rev() {
                index[dim] += 1;
                if index[dim] < resolution[dim] {
                    break;
                }
                index[dim] = 0;
            }
        }

        Ok(Self {
            points,
            lattice,
            spacing,
            dimension: axes.len(),
        })
    }

    fn explicit(points: &[DescriptorPoint]) -> Result<Self, GridError> {
        let first = points.first().ok_or(GridError::Empty)?;
        let dimension = first.dimension();
        if dimension == 0 {
            return Err(GridError::Empty);
        }
        for (idx, point) in points.iter().enumerate() {
            if point.dimension() != dimension {
                return Err(GridError::DimensionMismatch {
                    expected: dimension,
                    found: point.dimension(),
                });
            }
            if point.coordinates().iter().any(|x| !x.is_finite()) {
                return Err(GridError::NonFinitePoint { index: idx });
            }
        }

        let mut minimums = Vec::with_capacity(dimension);
        let mut spacing = Vec::with_capacity(dimension);
        for dim in 0..dimension {
            let mut values: Vec<f64> = points.iter().map(|p| p.coordinates()[dim]).collect();
            values.sort_by(f64::total_cmp);
            let gap = values
                .windows(2)
                .map(|pair| pair[1] - pair[0])
                .filter(|gap| *gap > 0.0)
                .fold(f64::INFINITY, f64::min);
            minimums.push(values[0]);
            spacing.push(if gap.is_finite() { gap } else { 1.0 });
        }

        let lattice = points
            .iter()
            .map(|p| {
                p.coordinates()
                    .iter()
                    .zip(&minimums)
                    .zip(&spacing)
                    .map(|((x, min), h)| ((x - min) / h).round() as i64)
                    .collect()
            })
            .collect();

        Ok(Self {
            points: points.to_vec(),
            lattice,
            spacing,
            dimension,
        })
    }

    pub fn points(&self) -> &[DescriptorPoint] {
        &self.points
    }

    pub fn point(&self, idx: usize) -> &DescriptorPoint {
        &self.points[idx]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Distance covered by one lattice step along each dimension.
    pub fn spacing(&self) -> &[f64] {
        &self.spacing
    }

    pub fn lattice_index(&self, idx: usize) -> &[i64] {
        &self.lattice[idx]
    }

    /// Point indices in the requested visiting order.
    pub fn traversal(&self, order: &TraversalOrder) -> Result<Vec<usize>, GridError> {
        let mut indices: Vec<usize> = (0..self.points.len()).collect();
        match order {
            TraversalOrder::AsListed => {}
            TraversalOrder::RowMajor => {
                indices.sort_by(|a, b| self.lattice[*a].cmp(&self.lattice[*b]));
            }
            TraversalOrder::Serpentine => {
                indices.sort_by_cached_key(|idx| serpentine_key(&self.lattice[*idx]));
            }
            TraversalOrder::FromSeed { seed } => {
                if seed.len() != self.dimension {
                    return Err(GridError::DimensionMismatch {
                        expected: self.dimension,
                        found: seed.len(),
                    });
                }
                indices.sort_by(|a, b| {
                    let da = chebyshev(&self.lattice[*a], seed);
                    let db = chebyshev(&self.lattice[*b], seed);
                    da.cmp(&db)
                        .then_with(|| self.lattice[*a].cmp(&self.lattice[*b]))
                });
            }
        }
        Ok(indices)
    }
}

fn chebyshev(a: &[i64], b: &[i64]) -> i64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .max()
        .unwrap_or(0)
}

/// Each coordinate after the first runs backwards when the preceding indices sum to an odd number.
fn serpentine_key(index: &[i64]) -> Vec<i64> {
    let mut prefix = 0;
    index
        .iter()
        .map(|i| {
            let key = if prefix % 2 == 0 { *i } else { -*i };
            prefix += i;
            key
        })
        .collect()
}
