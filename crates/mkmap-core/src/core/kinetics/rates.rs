use super::params::ParameterVector;
use crate::core::models::ids::{SiteId, SpeciesId};
use crate::core::models::model::ReactionModel;
use crate::core::models::species::SpeciesKind;
use crate::core::models::step::{ElementaryStep, Participant, ReactionState};
use crate::core::numeric::linalg::dot;
use crate::core::numeric::{Numeric, Precision};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KineticsError {
    #[error(
        "Expected {expected} rate constant pairs, found {forward} forward and {reverse} reverse"
    )]
    StepCountMismatch {
        expected: usize,
        forward: usize,
        reverse: usize,
    },

    #[error("Rate constant of step '{step}' is not a finite non-negative number: {value}")]
    InvalidRateConstant { step: String, value: f64 },

    #[error("Coverage vector has {found} entries, expected {expected}")]
    CoverageLength { expected: usize, found: usize },

    #[error("Non-finite value for {0}")]
    NonFinite(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Factor {
    Coverage(usize),
    Pressure(usize),
    FreeSite(usize),
}

#[derive(Debug, Clone, Copy)]
struct Term {
    factor: Factor,
    power: u32,
}

#[derive(Debug, Clone)]
struct CompiledStep {
    forward: Vec<Term>,
    reverse: Vec<Term>,
    adsorbate_delta: Vec<(usize, i64)>,
}

/// Rate constants and environment converted to the solver's numeric type.
#[derive(Debug, Clone)]
pub struct RateInputs<N> {
    forward: Vec<N>,
    reverse: Vec<N>,
    pressures: Vec<N>,
    capacities: Vec<N>,
    precision: Precision,
}

impl<N> RateInputs<N> {
    pub fn precision(&self) -> Precision {
        self.precision
    }
}

impl<N: Numeric> RateInputs<N> {
    /// Copy with both rate constants of `step` multiplied by `factor`, so its
    /// equilibrium constant is unchanged.
    pub fn with_step_scaled(&self, step: usize, factor: &N) -> Self {
        let mut scaled = self.clone();
        if let (Some(kf), Some(kr)) = (scaled.forward.get_mut(step), scaled.reverse.get_mut(step)) {
            *kf = kf.clone() * factor.clone();
            *kr = kr.clone() * factor.clone();
        }
        scaled
    }

    /// Copy with the partial pressure of `gas` multiplied by `factor`.
    pub fn with_pressure_scaled(&self, gas: usize, factor: &N) -> Self {
        let mut scaled = self.clone();
        if let Some(pressure) = scaled.pressures.get_mut(gas) {
            *pressure = pressure.clone() * factor.clone();
        }
        scaled
    }
}

/// Rate constants and rates evaluated at a coverage vector, at working precision.
///
/// Per-step vectors are indexed like the model's steps and per-gas vectors
/// like its gases. Gas rates are signed: positive values are net production.
#[derive(Debug, Clone, PartialEq)]
pub struct RateReport<N> {
    pub forward_constants: Vec<N>,
    pub reverse_constants: Vec<N>,
    /// `k_f / k_r`; `None` for an irreversible step.
    pub equilibrium_constants: Vec<Option<N>>,
    pub forward: Vec<N>,
    pub reverse: Vec<N>,
    pub net: Vec<N>,
    pub production: Vec<N>,
    pub consumption: Vec<N>,
    pub turnover_frequency: Vec<N>,
}

impl<N> Default for RateReport<N> {
    fn default() -> Self {
        Self {
            forward_constants: Vec::new(),
            reverse_constants: Vec::new(),
            equilibrium_constants: Vec::new(),
            forward: Vec::new(),
            reverse: Vec::new(),
            net: Vec::new(),
            production: Vec::new(),
            consumption: Vec::new(),
            turnover_frequency: Vec::new(),
        }
    }
}

/// Mass-action rate expressions compiled from a reaction model.
#[derive(Debug, Clone)]
pub struct RateEquations {
    steps: Vec<CompiledStep>,
    step_names: Vec<String>,
    /// Stoichiometric coefficient of every gas in every step, indexed `[gas][step]`.
    gas_coefficients: Vec<Vec<i64>>,
    site_members: Vec<Vec<usize>>,
    closure_rows: Vec<(usize, usize)>,
    pressures: Vec<f64>,
    capacities: Vec<f64>,
    adsorbate_count: usize,
}

struct Evaluation<'a, N> {
    coverages: &'a DVector<N>,
    free: Vec<N>,
    inputs: &'a RateInputs<N>,
}

impl<N: Numeric> Evaluation<'_, N> {
    fn factor(&self, factor: Factor) -> N {
        match factor {
            Factor::Coverage(idx) => self.coverages[idx].clone(),
            Factor::Pressure(idx) => self.inputs.pressures[idx].clone(),
            Factor::FreeSite(idx) => self.free[idx].clone(),
        }
    }

    /// Product of `factor^power` over `terms`, leaving out the term at `skip`.
    fn product(&self, terms: &[Term], skip: Option<usize>) -> N {
        terms
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != skip)
            .fold(N::one(self.inputs.precision), |acc, (_, term)| {
                acc * self.factor(term.factor).powi(term.power)
            })
    }
}

impl RateEquations {
    pub fn new(model: &ReactionModel) -> Self {
        let compile_state = |state: &ReactionState| -> Vec<Term> {
            state
                .terms()
                .iter()
                .filter_map(|(participant, count)| {
                    let factor = match participant {
                        Participant::FreeSite(site) => Factor::FreeSite(site.index()),
                        Participant::Species(id) => match model.species_by_id(*id).kind {
                            SpeciesKind::Adsorbate { .. } => {
                                Factor::Coverage(model.coverage_index(*id)?)
                            }
                            SpeciesKind::Gas { .. } => Factor::Pressure(model.gas_index(*id)?),
                            SpeciesKind::TransitionState { .. } => return None,
                        },
                    };
                    Some(Term {
                        factor,
                        power: *count,
                    })
                })
                .collect()
        };

        let change = |step: &ElementaryStep, id: SpeciesId| -> i64 {
            let participant = Participant::Species(id);
            i64::from(step.final_state.count(participant))
                - i64::from(step.initial_state.count(participant))
        };
        let steps = model
            .steps()
            .iter()
            .map(|step| CompiledStep {
                forward: compile_state(&step.initial_state),
                reverse: compile_state(&step.final_state),
                adsorbate_delta: model
                    .adsorbates()
                    .iter()
                    .enumerate()
                    .map(|(idx, id)| (idx, change(step, *id)))
                    .filter(|(_, delta)| *delta != 0)
                    .collect(),
            })
            .collect();
        let gas_coefficients: Vec<Vec<i64>> = model
            .gases()
            .iter()
            .map(|id| model.steps().iter().map(|step| change(step, *id)).collect())
            .collect();

        let site_members: Vec<Vec<usize>> = (0..model.sites().len())
            .map(|idx| model.site_members(SiteId(idx)))
            .collect();
        let closure_rows = site_members
            .iter()
            .enumerate()
            .filter(|(idx, _)| model.is_site_closed(SiteId(*idx)))
            .filter_map(|(idx, members)| members.last().map(|row| (*row, idx)))
            .collect();
        let pressures = model
            .gases()
            .iter()
            .map(|id| match model.species_by_id(*id).kind {
                SpeciesKind::Gas { pressure } => pressure,
                _ => 0.0,
            })
            .collect();

        Self {
            steps,
            step_names: model.steps().iter().map(|s| s.name.clone()).collect(),
            gas_coefficients,
            site_members,
            closure_rows,
            pressures,
            capacities: model.sites().iter().map(|s| s.capacity).collect(),
            adsorbate_count: model.adsorbates().len(),
        }
    }

    pub fn adsorbate_count(&self) -> usize {
        self.adsorbate_count
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn gas_count(&self) -> usize {
        self.pressures.len()
    }

    /// `(row, site)` pairs whose residual row is the site balance of a saturated site.
    pub fn closure_rows(&self) -> &[(usize, usize)] {
        &self.closure_rows
    }

    pub fn prepare<N: Numeric>(
        &self,
        params: &ParameterVector,
        precision: Precision,
    ) -> Result<RateInputs<N>, KineticsError> {
        let expected = self.steps.len();
        if params.forward.len() != expected || params.reverse.len() != expected {
            return Err(KineticsError::StepCountMismatch {
                expected,
                forward: params.forward.len(),
                reverse: params.reverse.len(),
            });
        }

        let convert_constants = |values: &[f64]| -> Result<Vec<N>, KineticsError> {
            values
                .iter()
                .zip(&self.step_names)
                .map(|(value, step)| {
                    let invalid = || KineticsError::InvalidRateConstant {
                        step: step.clone(),
                        value: *value,
                    };
                    if *value < 0.0 {
                        return Err(invalid());
                    }
                    N::from_f64(*value, precision).ok_or_else(invalid)
                })
                .collect()
        };
        let convert = |values: &[f64], what: &str| -> Result<Vec<N>, KineticsError> {
            values
                .iter()
                .map(|v| {
                    N::from_f64(*v, precision).ok_or_else(|| KineticsError::NonFinite(what.into()))
                })
                .collect()
        };

        Ok(RateInputs {
            forward: convert_constants(&params.forward)?,
            reverse: convert_constants(&params.reverse)?,
            pressures: convert(&self.pressures, "gas pressure")?,
            capacities: convert(&self.capacities, "site capacity")?,
            precision,
        })
    }

    /// Converts a double-precision coverage vector into the solver's numeric type.
    pub fn coverage_vector<N: Numeric>(
        &self,
        values: &[f64],
        precision: Precision,
    ) -> Result<DVector<N>, KineticsError> {
        if values.len() != self.adsorbate_count {
            return Err(KineticsError::CoverageLength {
                expected: self.adsorbate_count,
                found: values.len(),
            });
        }
        let converted = values
            .iter()
            .map(|v| N::from_f64(*v, precision).ok_or_else(|| KineticsError::NonFinite("coverage".into())))
            .collect::<Result<Vec<N>, _>>()?;
        Ok(DVector::from_vec(converted))
    }

    fn evaluation<'a, N: Numeric>(
        &self,
        coverages: &'a DVector<N>,
        inputs: &'a RateInputs<N>,
    ) -> Evaluation<'a, N> {
        let free = self
            .site_occupancy(coverages, inputs.precision)
            .into_iter()
            .zip(&inputs.capacities)
            .map(|(occupied, capacity)| capacity.clone() - occupied)
            .collect();
        Evaluation {
            coverages,
            free,
            inputs,
        }
    }

    /// Summed adsorbate coverage on every site.
    pub fn site_occupancy<N: Numeric>(&self, coverages: &DVector<N>, precision: Precision) -> Vec<N> {
        self.site_members
            .iter()
            .map(|members| {
                members
                    .iter()
                    .fold(N::zero(precision), |acc, idx| acc + coverages[*idx].clone())
            })
            .collect()
    }

    fn step_rates<N: Numeric>(&self, evaluation: &Evaluation<'_, N>) -> Vec<(N, N)> {
        self.steps
            .iter()
            .enumerate()
            .map(|(idx, step)| {
                let forward = evaluation.inputs.forward[idx].clone() * evaluation.product(&step.forward, None);
                let reverse = evaluation.inputs.reverse[idx].clone() * evaluation.product(&step.reverse, None);
                (forward, reverse)
            })
            .collect()
    }

    /// Time derivative of every adsorbate coverage.
    pub fn rate_of_change<N: Numeric>(&self, coverages: &DVector<N>, inputs: &RateInputs<N>) -> DVector<N> {
        let precision = inputs.precision;
        let evaluation = self.evaluation(coverages, inputs);
        let mut derivative = DVector::from_element(self.adsorbate_count, N::zero(precision));
        for (step, (forward, reverse)) in self.steps.iter().zip(self.step_rates(&evaluation)) {
            let net = forward - reverse;
            for (idx, change) in &step.adsorbate_delta {
                let updated = derivative[*idx].clone() + N::from_i64(*change, precision) * net.clone();
                derivative[*idx] = updated;
            }
        }
        derivative
    }

    /// Steady-state residual; rows listed in [`Self::closure_rows`] hold `Σθ_site - capacity`.
    pub fn residual<N: Numeric>(&self, coverages: &DVector<N>, inputs: &RateInputs<N>) -> DVector<N> {
        let mut residual = self.rate_of_change(coverages, inputs);
        if !self.closure_rows.is_empty() {
            let occupancy = self.site_occupancy(coverages, inputs.precision);
            for (row, site) in &self.closure_rows {
                residual[*row] = occupancy[*site].clone() - inputs.capacities[*site].clone();
            }
        }
        residual
    }

    /// Analytic Jacobian of [`Self::residual`] with respect to the coverages.
    pub fn jacobian<N: Numeric>(&self, coverages: &DVector<N>, inputs: &RateInputs<N>) -> DMatrix<N> {
        let precision = inputs.precision;
        let n = self.adsorbate_count;
        let evaluation = self.evaluation(coverages, inputs);
        let mut jacobian = DMatrix::from_element(n, n, N::zero(precision));

        for (step_idx, step) in self.steps.iter().enumerate() {
            let directions = [
                (&step.forward, &inputs.forward[step_idx], 1_i64),
                (&step.reverse, &inputs.reverse[step_idx], -1_i64),
            ];
            for (terms, constant, sign) in directions {
                if constant.is_zero() {
                    continue;
                }
                for (term_idx, term) in terms.iter().enumerate() {
                    if matches!(term.factor, Factor::Pressure(_)) {
                        continue;
                    }
                    let partial = constant.clone()
                        * N::from_i64(i64::from(term.power), precision)
                        * evaluation.factor(term.factor).powi(term.power - 1)
                        * evaluation.product(terms, Some(term_idx));
                    let columns: Vec<(usize, i64)> = match term.factor {
                        Factor::Coverage(col) => vec![(col, sign)],
                        Factor::FreeSite(site) => {
                            self.site_members[site].iter().map(|col| (*col, -sign)).collect()
                        }
                        Factor::Pressure(_) => Vec::new(),
                    };
                    for (row, change) in &step.adsorbate_delta {
                        for (col, direction) in &columns {
                            let contribution =
                                N::from_i64(change * direction, precision) * partial.clone();
                            let updated = jacobian[(*row, *col)].clone() + contribution;
                            jacobian[(*row, *col)] = updated;
                        }
                    }
                }
            }
        }

        for (row, site) in &self.closure_rows {
            for col in 0..n {
                jacobian[(*row, col)] = N::zero(precision);
            }
            for col in &self.site_members[*site] {
                jacobian[(*row, *col)] = N::one(precision);
            }
        }
        jacobian
    }

    /// Per-step and per-gas rates at `coverages`.
    ///
    /// The net rate of a gas is the dot product of its stoichiometric
    /// coefficients with the net step rates.
    pub fn rates<N: Numeric>(&self, coverages: &DVector<N>, inputs: &RateInputs<N>) -> RateReport<N> {
        let precision = inputs.precision;
        let zero = N::zero(precision);
        let evaluation = self.evaluation(coverages, inputs);

        let mut report = RateReport {
            forward_constants: inputs.forward.clone(),
            reverse_constants: inputs.reverse.clone(),
            equilibrium_constants: inputs
                .forward
                .iter()
                .zip(&inputs.reverse)
                .map(|(kf, kr)| kf.checked_div(kr))
                .collect(),
            ..RateReport::default()
        };
        for (forward, reverse) in self.step_rates(&evaluation) {
            report.net.push(forward.clone() - reverse.clone());
            report.forward.push(forward);
            report.reverse.push(reverse);
        }

        let net = DVector::from_vec(report.net.clone());
        for coefficients in &self.gas_coefficients {
            let stoichiometry = DVector::from_iterator(
                coefficients.len(),
                coefficients.iter().map(|c| N::from_i64(*c, precision)),
            );
            let rate = dot(&stoichiometry, &net, precision);
            let (production, consumption) = if rate > zero {
                (rate.clone(), zero.clone())
            } else {
                (zero.clone(), -rate.clone())
            };
            report.production.push(production);
            report.consumption.push(consumption);
            report.turnover_frequency.push(rate);
        }
        report
    }

    /// Clamps negative coverages to zero, then scales every over-full site down to its capacity.
    pub fn constrain<N: Numeric>(&self, mut coverages: DVector<N>, inputs: &RateInputs<N>) -> DVector<N> {
        let precision = inputs.precision;
        let zero = N::zero(precision);
        for value in coverages.iter_mut() {
            if *value < zero {
                *value = zero.clone();
            }
        }
        let occupancy = self.site_occupancy(&coverages, precision);
        for ((members, occupied), capacity) in self
            .site_members
            .iter()
            .zip(occupancy)
            .zip(&inputs.capacities)
        {
            if occupied <= *capacity {
                continue;
            }
            if let Some(scale) = capacity.checked_div(&occupied) {
                for idx in members {
                    coverages[*idx] = coverages[*idx].clone() * scale.clone();
                }
            }
        }
        coverages
    }
}
