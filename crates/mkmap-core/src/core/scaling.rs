//! Descriptor-to-parameter projection and initial coverage estimates.
//!
//! The mapper treats both as collaborators: anything implementing
//! [`Projection`] turns a descriptor point into rate constants, and anything
//! implementing [`InitialGuess`] supplies a starting coverage vector when no
//! converged neighbour is available. Plain closures implement both traits.
//! [`LinearScaler`] is the stock implementation: energies linear in the
//! descriptors, Arrhenius rate constants, and Boltzmann-weighted coverages.

use crate::core::kinetics::ParameterVector;
use crate::core::models::descriptor::DescriptorPoint;
use crate::core::models::ids::SiteId;
use crate::core::models::model::ReactionModel;
use thiserror::Error;

/// Boltzmann constant in eV/K.
pub const BOLTZMANN_EV: f64 = 8.617333262e-5;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Descriptor point has {found} coordinates, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Non-finite {quantity} at descriptor point {point}")]
    NonFinite { quantity: String, point: String },

    #[error("Expected {expected} {what}, found {found}")]
    CountMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{0}")]
    Other(String),
}

pub trait Projection: Sync {
    fn project(&self, point: &DescriptorPoint) -> Result<ParameterVector, ProjectionError>;
}

impl<F> Projection for F
where
    F: Fn(&DescriptorPoint) -> Result<ParameterVector, ProjectionError> + Sync,
{
    fn project(&self, point: &DescriptorPoint) -> Result<ParameterVector, ProjectionError> {
        self(point)
    }
}

pub trait InitialGuess: Sync {
    fn estimate(
        &self,
        model: &ReactionModel,
        point: &DescriptorPoint,
        params: &ParameterVector,
    ) -> Result<Vec<f64>, ProjectionError>;
}

impl<F> InitialGuess for F
where
    F: Fn(&ReactionModel, &DescriptorPoint, &ParameterVector) -> Result<Vec<f64>, ProjectionError>
        + Sync,
{
    fn estimate(
        &self,
        model: &ReactionModel,
        point: &DescriptorPoint,
        params: &ParameterVector,
    ) -> Result<Vec<f64>, ProjectionError> {
        self(model, point, params)
    }
}

/// `intercept + Σ slope_i · descriptor_i`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearForm {
    pub intercept: f64,
    pub slopes: Vec<f64>,
}

impl LinearForm {
    pub fn new(intercept: f64, slopes: Vec<f64>) -> Self {
        Self { intercept, slopes }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(value, Vec::new())
    }

    /// Missing slopes count as zero, so a constant form evaluates in any dimension.
    pub fn evaluate(&self, point: &DescriptorPoint) -> Result<f64, ProjectionError> {
        if self.slopes.len() > point.dimension() {
            return Err(ProjectionError::DimensionMismatch {
                expected: self.slopes.len(),
                found: point.dimension(),
            });
        }
        Ok(self.intercept
            + self
                .slopes
                .iter()
                .zip(point.coordinates())
                .map(|(slope, x)| slope * x)
                .sum::<f64>())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepEnergetics {
    pub reaction_energy: LinearForm,
    /// Forward barrier; `None` means barrierless.
    pub activation_energy: Option<LinearForm>,
    /// Arrhenius prefactor in 1/s.
    pub prefactor: f64,
}

/// Linear energy scaling with Arrhenius kinetics.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearScaler {
    pub temperature: f64,
    pub steps: Vec<StepEnergetics>,
    /// Formation energy of every adsorbate, in coverage order.
    pub formation_energies: Vec<LinearForm>,
}

impl LinearScaler {
    pub fn new(temperature: f64) -> Self {
        Self {
            temperature,
            steps: Vec::new(),
            formation_energies: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: StepEnergetics) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_formation_energy(mut self, energy: LinearForm) -> Self {
        self.formation_energies.push(energy);
        self
    }

    fn thermal_energy(&self) -> f64 {
        BOLTZMANN_EV * self.temperature
    }

    fn finite(value: f64, quantity: &str, point: &DescriptorPoint) -> Result<f64, ProjectionError> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ProjectionError::NonFinite {
                quantity: quantity.to_string(),
                point: point.to_string(),
            })
        }
    }

    /// Forward and reverse barriers with the forward barrier floored at `max(0, ΔE)`.
    pub fn barriers(
        &self,
        step: &StepEnergetics,
        point: &DescriptorPoint,
    ) -> Result<(f64, f64), ProjectionError> {
        let reaction = step.reaction_energy.evaluate(point)?;
        let activation = match &step.activation_energy {
            Some(form) => form.evaluate(point)?,
            None => 0.0,
        };
        let forward = activation.max(reaction.max(0.0));
        Ok((forward, forward - reaction))
    }

    /// Formation energies evaluated at `point`, in coverage order.
    pub fn formation_energies_at(&self, point: &DescriptorPoint) -> Result<Vec<f64>, ProjectionError> {
        self.formation_energies
            .iter()
            .map(|form| Self::finite(form.evaluate(point)?, "formation energy", point))
            .collect()
    }
}

impl Projection for LinearScaler {
    fn project(&self, point: &DescriptorPoint) -> Result<ParameterVector, ProjectionError> {
        let kt = self.thermal_energy();
        let pairs = self
            .steps
            .iter()
            .map(|step| {
                let (forward_barrier, reverse_barrier) = self.barriers(step, point)?;
                let kf = step.prefactor * (-forward_barrier / kt).exp();
                let kr = step.prefactor * (-reverse_barrier / kt).exp();
                Ok((
                    Self::finite(kf, "forward rate constant", point)?,
                    Self::finite(kr, "reverse rate constant", point)?,
                ))
            })
            .collect::<Result<Vec<_>, ProjectionError>>()?;
        Ok(ParameterVector::from_pairs(pairs))
    }
}

impl InitialGuess for LinearScaler {
    fn estimate(
        &self,
        model: &ReactionModel,
        point: &DescriptorPoint,
        _params: &ParameterVector,
    ) -> Result<Vec<f64>, ProjectionError> {
        let energies = self.formation_energies_at(point)?;
        boltzmann_coverages(model, &energies, self.temperature)
    }
}

/// Boltzmann distribution of each site's capacity over its adsorbates.
///
/// Open sites include the empty site at zero energy; closed sites are spread
/// over their adsorbates only. Exponents are shifted by their maximum before
/// exponentiation.
pub fn boltzmann_coverages(
    model: &ReactionModel,
    formation_energies: &[f64],
    temperature: f64,
) -> Result<Vec<f64>, ProjectionError> {
    let count = model.adsorbates().len();
    if formation_energies.len() != count {
        return Err(ProjectionError::CountMismatch {
            what: "formation energies",
            expected: count,
            found: formation_energies.len(),
        });
    }
    let kt = BOLTZMANN_EV * temperature;
    let mut coverages = vec![0.0; count];

    for (site_idx, site) in model.sites().iter().enumerate() {
        let site_id = SiteId(site_idx);
        let members = model.site_members(site_id);
        if members.is_empty() {
            continue;
        }
        let exponents: Vec<f64> = members.iter().map(|idx| -formation_energies[*idx] / kt).collect();
        let empty_exponent = (!model.is_site_closed(site_id)).then_some(0.0);
        let shift = exponents
            .iter()
            .copied()
            .chain(empty_exponent)
            .fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = exponents.iter().map(|e| (e - shift).exp()).collect();
        let partition = weights.iter().sum::<f64>()
            + empty_exponent.map_or(0.0, |e| (e - shift).exp());
        if !partition.is_finite() || partition <= 0.0 {
            return Err(ProjectionError::Other(format!(
                "Boltzmann partition function on site '{}' is not positive",
                site.name
            )));
        }
        for (idx, weight) in members.iter().zip(weights) {
            coverages[*idx] = site.capacity * weight / partition;
        }
    }
    Ok(coverages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::model::test_models;

    fn point(coords: &[f64]) -> DescriptorPoint {
        DescriptorPoint::new(coords.to_vec())
    }

    #[test]
    fn linear_form_evaluates_against_descriptors() {
        let form = LinearForm::new(0.5, vec![1.0, -2.0]);
        assert_eq!(form.evaluate(&point(&[1.0, 0.25])).unwrap(), 1.0);
        assert_eq!(LinearForm::constant(3.0).evaluate(&point(&[7.0])).unwrap(), 3.0);
        assert!(matches!(
            form.evaluate(&point(&[1.0])),
            Err(ProjectionError::DimensionMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn barrier_is_floored_at_reaction_energy() {
        let scaler = LinearScaler::new(500.0);
        let uphill = StepEnergetics {
            reaction_energy: LinearForm::constant(0.8),
            activation_energy: Some(LinearForm::constant(0.3)),
            prefactor: 1e13,
        };
        assert_eq!(scaler.barriers(&uphill, &point(&[0.0])).unwrap(), (0.8, 0.0));

        let downhill = StepEnergetics {
            reaction_energy: LinearForm::constant(-0.5),
            activation_energy: None,
            prefactor: 1e13,
        };
        assert_eq!(scaler.barriers(&downhill, &point(&[0.0])).unwrap(), (0.0, 0.5));
    }

    #[test]
    fn projection_satisfies_detailed_balance() {
        let temperature = 600.0;
        let scaler = LinearScaler::new(temperature).with_step(StepEnergetics {
            reaction_energy: LinearForm::new(-0.2, vec![0.5]),
            activation_energy: Some(LinearForm::constant(0.6)),
            prefactor: 1e13,
        });
        let params = scaler.project(&point(&[0.2])).unwrap();
        let expected = (0.1 / (BOLTZMANN_EV * temperature)).exp();
        let ratio = params.forward[0] / params.reverse[0];
        assert!((ratio / expected - 1.0).abs() < 1e-12);
    }

    #[test]
    fn closures_implement_both_collaborator_traits() {
        let projection = |p: &DescriptorPoint| -> Result<ParameterVector, ProjectionError> {
            Ok(ParameterVector::new(vec![p.coordinates()[0]], vec![1.0]))
        };
        let guess = |_: &ReactionModel, _: &DescriptorPoint, _: &ParameterVector| -> Result<Vec<f64>, ProjectionError> {
            Ok(vec![0.5, 0.5])
        };
        let model = test_models::two_state();
        let params = Projection::project(&projection, &point(&[2.0])).unwrap();
        assert_eq!(params.forward, vec![2.0]);
        assert_eq!(guess.estimate(&model, &point(&[2.0]), &params).unwrap(), vec![0.5, 0.5]);
    }

    #[test]
    fn closed_site_estimate_fills_capacity() {
        let model = test_models::two_state();
        let kt = BOLTZMANN_EV * 300.0;
        let coverages = boltzmann_coverages(&model, &[0.0, -kt * 2.0_f64.ln()], 300.0).unwrap();
        assert!((coverages[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((coverages[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn open_site_estimate_leaves_room_for_empty_site() {
        let model = test_models::adsorption_chain();
        let coverages = boltzmann_coverages(&model, &[0.0, 0.0], 300.0).unwrap();
        for value in &coverages {
            assert!((value - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn strongly_bound_estimate_does_not_overflow() {
        let model = test_models::adsorption_chain();
        let coverages = boltzmann_coverages(&model, &[-50.0, 1.0], 300.0).unwrap();
        assert!((coverages[0] - 1.0).abs() < 1e-12);
        assert!(coverages[1] >= 0.0 && coverages[1] < 1e-12);
    }

    #[test]
    fn estimate_rejects_wrong_energy_count() {
        let model = test_models::adsorption_chain();
        assert!(matches!(
            boltzmann_coverages(&model, &[0.0], 300.0),
            Err(ProjectionError::CountMismatch { expected: 2, found: 1, .. })
        ));
    }
}
