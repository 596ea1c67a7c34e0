use super::ids::{SiteId, SpeciesId, StepId};
use super::site::Site;
use super::species::{Species, SpeciesKind};
use super::step::{ElementaryStep, Participant, ReactionState};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Prefix marking an empty site in step notation, e.g. `*_s` for site `s`.
pub const FREE_SITE_PREFIX: &str = "*_";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Duplicate name '{0}' in reaction model")]
    DuplicateName(String),

    #[error("Unknown site '{0}'")]
    UnknownSite(String),

    #[error("Unknown species or site token '{0}'")]
    UnknownParticipant(String),

    #[error("Site '{site}' has invalid capacity {capacity}; expected a value in (0, 1]")]
    InvalidCapacity { site: String, capacity: f64 },

    #[error("Gas '{species}' has invalid pressure {pressure}")]
    InvalidPressure { species: String, pressure: f64 },

    #[error("Step '{step}' is invalid: {reason}")]
    InvalidStep { step: String, reason: String },

    #[error("Step '{step}' is not site-balanced on site '{site}': {initial} sites initially, {other} in the {state} state")]
    SiteImbalance {
        step: String,
        site: String,
        initial: u32,
        other: u32,
        state: &'static str,
    },

    #[error("Reaction model contains no adsorbates")]
    NoAdsorbates,
}

/// Validated, immutable description of a microkinetic mechanism.
///
/// Adsorbates are assigned coverage indices in definition order; every coverage
/// vector handled by the solver uses that ordering.
#[derive(Debug, Clone)]
pub struct ReactionModel {
    sites: Vec<Site>,
    species: Vec<Species>,
    steps: Vec<ElementaryStep>,
    adsorbates: Vec<SpeciesId>,
    gases: Vec<SpeciesId>,
    coverage_index: HashMap<SpeciesId, usize>,
    gas_index: HashMap<SpeciesId, usize>,
    closed_sites: Vec<bool>,
}

impl ReactionModel {
    pub fn builder() -> ReactionModelBuilder {
        ReactionModelBuilder::new()
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn steps(&self) -> &[ElementaryStep] {
        &self.steps
    }

    pub fn site(&self, id: SiteId) -> &Site {
        &self.sites[id.index()]
    }

    pub fn species_by_id(&self, id: SpeciesId) -> &Species {
        &self.species[id.index()]
    }

    /// Adsorbates in coverage-vector order.
    pub fn adsorbates(&self) -> &[SpeciesId] {
        &self.adsorbates
    }

    pub fn gases(&self) -> &[SpeciesId] {
        &self.gases
    }

    pub fn coverage_index(&self, id: SpeciesId) -> Option<usize> {
        self.coverage_index.get(&id).copied()
    }

    pub fn gas_index(&self, id: SpeciesId) -> Option<usize> {
        self.gas_index.get(&id).copied()
    }

    pub fn find_site(&self, name: &str) -> Option<SiteId> {
        self.sites.iter().position(|s| s.matches(name)).map(SiteId)
    }

    pub fn find_species(&self, name: &str) -> Option<SpeciesId> {
        self.species.iter().position(|s| s.name == name).map(SpeciesId)
    }

    /// Coverage indices of the adsorbates bound to `site`.
    pub fn site_members(&self, site: SiteId) -> Vec<usize> {
        self.adsorbates
            .iter()
            .enumerate()
            .filter(|(_, id)| self.species[id.index()].site() == Some(site))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// A site is closed when no step references its empty site; its occupancy
    /// is then conserved by the kinetics and the site is treated as saturated.
    pub fn is_site_closed(&self, site: SiteId) -> bool {
        self.closed_sites[site.index()]
    }

    pub fn adsorbate_names(&self) -> Vec<&str> {
        self.adsorbates
            .iter()
            .map(|id| self.species[id.index()].name.as_str())
            .collect()
    }

    pub fn gas_names(&self) -> Vec<&str> {
        self.gases
            .iter()
            .map(|id| self.species[id.index()].name.as_str())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct ReactionModelBuilder {
    sites: Vec<Site>,
    species: Vec<Species>,
    steps: Vec<ElementaryStep>,
}

impl ReactionModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_site(&mut self, name: &str, capacity: f64) -> SiteId {
        self.sites.push(Site::new(name, capacity));
        SiteId(self.sites.len() - 1)
    }

    pub fn add_site_alias(&mut self, site: SiteId, alias: &str) -> &mut Self {
        self.sites[site.index()].aliases.push(alias.to_string());
        self
    }

    pub fn add_gas(&mut self, name: &str, pressure: f64) -> SpeciesId {
        self.push_species(name, SpeciesKind::Gas { pressure })
    }

    pub fn add_adsorbate(&mut self, name: &str, site: SiteId) -> SpeciesId {
        self.push_species(name, SpeciesKind::Adsorbate { site })
    }

    pub fn add_transition_state(&mut self, name: &str, site: SiteId) -> SpeciesId {
        self.push_species(name, SpeciesKind::TransitionState { site })
    }

    fn push_species(&mut self, name: &str, kind: SpeciesKind) -> SpeciesId {
        self.species.push(Species {
            name: name.to_string(),
            kind,
        });
        SpeciesId(self.species.len() - 1)
    }

    pub fn add_step(
        &mut self,
        name: &str,
        initial: &[Participant],
        transition: Option<&[Participant]>,
        final_: &[Participant],
    ) -> StepId {
        self.steps.push(ElementaryStep {
            name: name.to_string(),
            initial_state: ReactionState::from_participants(initial.iter().copied()),
            transition_state: transition
                .map(|ts| ReactionState::from_participants(ts.iter().copied())),
            final_state: ReactionState::from_participants(final_.iter().copied()),
        });
        StepId(self.steps.len() - 1)
    }

    /// Adds a step written as species names, with `*_<site>` for empty sites.
    pub fn add_step_from_tokens(
        &mut self,
        name: &str,
        initial: &[&str],
        transition: Option<&[&str]>,
        final_: &[&str],
    ) -> Result<StepId, ModelError> {
        let resolve_all = |tokens: &[&str]| -> Result<Vec<Participant>, ModelError> {
            tokens.iter().map(|t| self.resolve(t)).collect()
        };
        let initial = resolve_all(initial)?;
        let transition = transition.map(resolve_all).transpose()?;
        let final_ = resolve_all(final_)?;
        Ok(self.add_step(name, &initial, transition.as_deref(), &final_))
    }

    pub fn resolve(&self, token: &str) -> Result<Participant, ModelError> {
        let token = token.trim();
        if let Some(site_name) = token.strip_prefix(FREE_SITE_PREFIX) {
            return self
                .sites
                .iter()
                .position(|s| s.matches(site_name))
                .map(|idx| Participant::FreeSite(SiteId(idx)))
                .ok_or_else(|| ModelError::UnknownSite(site_name.to_string()));
        }
        if token == "*" && self.sites.len() == 1 {
            return Ok(Participant::FreeSite(SiteId(0)));
        }
        self.species
            .iter()
            .position(|s| s.name == token)
            .map(|idx| Participant::Species(SpeciesId(idx)))
            .ok_or_else(|| ModelError::UnknownParticipant(token.to_string()))
    }

    pub fn find_site(&self, name: &str) -> Option<SiteId> {
        self.sites.iter().position(|s| s.matches(name)).map(SiteId)
    }

    pub fn build(self) -> Result<ReactionModel, ModelError> {
        self.validate_names()?;
        self.validate_sites_and_species()?;
        for step in &self.steps {
            self.validate_step(step)?;
        }

        let adsorbates: Vec<SpeciesId> = (0..self.species.len())
            .map(SpeciesId)
            .filter(|id| self.species[id.index()].is_adsorbate())
            .collect();
        if adsorbates.is_empty() {
            return Err(ModelError::NoAdsorbates);
        }
        let gases: Vec<SpeciesId> = (0..self.species.len())
            .map(SpeciesId)
            .filter(|id| self.species[id.index()].is_gas())
            .collect();

        let coverage_index = adsorbates
            .iter()
            .enumerate()
            .map(|(idx, id)| (*id, idx))
            .collect();
        let gas_index = gases
            .iter()
            .enumerate()
            .map(|(idx, id)| (*id, idx))
            .collect();
        let closed_sites = (0..self.sites.len())
            .map(|idx| {
                let empty = Participant::FreeSite(SiteId(idx));
                !self.steps.iter().any(|step| step.involves(empty))
            })
            .collect();

        Ok(ReactionModel {
            sites: self.sites,
            species: self.species,
            steps: self.steps,
            adsorbates,
            gases,
            coverage_index,
            gas_index,
            closed_sites,
        })
    }

    fn validate_names(&self) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        let site_names = self
            .sites
            .iter()
            .flat_map(|s| std::iter::once(&s.name).chain(s.aliases.iter()));
        for name in site_names {
            if !seen.insert(name.as_str()) {
                return Err(ModelError::DuplicateName(name.clone()));
            }
        }
        let mut seen = HashSet::new();
        for species in &self.species {
            if !seen.insert(species.name.as_str()) {
                return Err(ModelError::DuplicateName(species.name.clone()));
            }
        }
        Ok(())
    }

    fn validate_sites_and_species(&self) -> Result<(), ModelError> {
        for site in &self.sites {
            if !site.capacity.is_finite() || site.capacity <= 0.0 || site.capacity > 1.0 {
                return Err(ModelError::InvalidCapacity {
                    site: site.name.clone(),
                    capacity: site.capacity,
                });
            }
        }
        for species in &self.species {
            match species.kind {
                SpeciesKind::Gas { pressure } if !pressure.is_finite() || pressure < 0.0 => {
                    return Err(ModelError::InvalidPressure {
                        species: species.name.clone(),
                        pressure,
                    });
                }
                SpeciesKind::Adsorbate { site } | SpeciesKind::TransitionState { site }
                    if site.index() >= self.sites.len() =>
                {
                    return Err(ModelError::UnknownSite(format!("#{}", site.index())));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn validate_step(&self, step: &ElementaryStep) -> Result<(), ModelError> {
        let invalid = |reason: &str| ModelError::InvalidStep {
            step: step.name.clone(),
            reason: reason.to_string(),
        };
        if step.initial_state.is_empty() || step.final_state.is_empty() {
            return Err(invalid("initial and final states must be non-empty"));
        }
        for state in step.states() {
            for (participant, _) in state.terms() {
                match participant {
                    Participant::Species(id) if id.index() >= self.species.len() => {
                        return Err(invalid("references an undefined species"));
                    }
                    Participant::FreeSite(id) if id.index() >= self.sites.len() => {
                        return Err(invalid("references an undefined site"));
                    }
                    _ => {}
                }
            }
        }
        let holds_transition_species = |state: &ReactionState| {
            state.terms().iter().any(|(p, _)| match p {
                Participant::Species(id) => self.species[id.index()].is_transition_state(),
                Participant::FreeSite(_) => false,
            })
        };
        if holds_transition_species(&step.initial_state) || holds_transition_species(&step.final_state) {
            return Err(invalid("transition-state species may only appear in the transition state"));
        }

        for site_idx in 0..self.sites.len() {
            let site = SiteId(site_idx);
            let initial = self.occupancy(&step.initial_state, site);
            let final_ = self.occupancy(&step.final_state, site);
            if initial != final_ {
                return Err(self.imbalance(step, site, initial, final_, "final"));
            }
            if let Some(ts) = &step.transition_state {
                let transition = self.occupancy(ts, site);
                if initial != transition {
                    return Err(self.imbalance(step, site, initial, transition, "transition"));
                }
            }
        }
        Ok(())
    }

    fn occupancy(&self, state: &ReactionState, site: SiteId) -> u32 {
        state
            .terms()
            .iter()
            .filter(|(p, _)| match p {
                Participant::Species(id) => self.species[id.index()].site() == Some(site),
                Participant::FreeSite(s) => *s == site,
            })
            .map(|(_, count)| count)
            .sum()
    }

    fn imbalance(
        &self,
        step: &ElementaryStep,
        site: SiteId,
        initial: u32,
        other: u32,
        state: &'static str,
    ) -> ModelError {
        ModelError::SiteImbalance {
            step: step.name.clone(),
            site: self.sites[site.index()].name.clone(),
            initial,
            other,
            state,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_models {
    use super::*;

    /// `A* <-> B*` on a single site that never exposes an empty site.
    pub fn two_state() -> ReactionModel {
        let mut builder = ReactionModel::builder();
        let s = builder.add_site("s", 1.0);
        builder.add_adsorbate("A*", s);
        builder.add_adsorbate("B*", s);
        builder
            .add_step_from_tokens("isomerization", &["A*"], None, &["B*"])
            .unwrap();
        builder.build().unwrap()
    }

    /// `A(g) + * <-> A*`, `A* <-> B*`, `B* <-> B(g) + *`.
    pub fn adsorption_chain() -> ReactionModel {
        let mut builder = ReactionModel::builder();
        let s = builder.add_site("s", 1.0);
        builder.add_gas("A_g", 1.0);
        builder.add_gas("B_g", 0.0);
        builder.add_adsorbate("A*", s);
        builder.add_adsorbate("B*", s);
        builder
            .add_step_from_tokens("A adsorption", &["A_g", "*_s"], None, &["A*"])
            .unwrap();
        builder
            .add_step_from_tokens("A to B", &["A*"], None, &["B*"])
            .unwrap();
        builder
            .add_step_from_tokens("B desorption", &["B*"], None, &["B_g", "*_s"])
            .unwrap();
        builder.build().unwrap()
    }

    /// Dissociative adsorption `O2(g) + 2* <-> 2O*` followed by `O* <-> O(g) + *`.
    pub fn dissociative() -> ReactionModel {
        let mut builder = ReactionModel::builder();
        let s = builder.add_site("s", 1.0);
        builder.add_gas("O2_g", 1.0);
        builder.add_gas("O_g", 0.0);
        builder.add_adsorbate("O*", s);
        builder.add_transition_state("O-O*", s);
        builder
            .add_step_from_tokens(
                "O2 dissociation",
                &["O2_g", "*_s", "*_s"],
                Some(&["O-O*", "*_s"]),
                &["O*", "O*"],
            )
            .unwrap();
        builder
            .add_step_from_tokens("O removal", &["O*"], None, &["O_g", "*_s"])
            .unwrap();
        builder.build().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_models::*;
    use super::*;

    #[test]
    fn adsorbates_are_indexed_in_definition_order() {
        let model = adsorption_chain();
        assert_eq!(model.adsorbate_names(), vec!["A*", "B*"]);
        assert_eq!(model.gas_names(), vec!["A_g", "B_g"]);
        let b = model.find_species("B*").unwrap();
        assert_eq!(model.coverage_index(b), Some(1));
        assert_eq!(model.site_members(SiteId(0)), vec![0, 1]);
    }

    #[test]
    fn site_without_empty_site_references_is_closed() {
        assert!(two_state().is_site_closed(SiteId(0)));
        assert!(!adsorption_chain().is_site_closed(SiteId(0)));
    }

    #[test]
    fn unbalanced_step_is_rejected_at_build_time() {
        let mut builder = ReactionModel::builder();
        let s = builder.add_site("s", 1.0);
        builder.add_gas("A_g", 1.0);
        builder.add_adsorbate("A*", s);
        builder
            .add_step_from_tokens("broken", &["A_g"], None, &["A*"])
            .unwrap();
        let err = builder.build().unwrap_err();
        assert!(matches!(err, ModelError::SiteImbalance { initial: 0, other: 1, .. }));
    }

    #[test]
    fn unbalanced_transition_state_is_rejected() {
        let mut builder = ReactionModel::builder();
        let s = builder.add_site("s", 1.0);
        builder.add_gas("O2_g", 1.0);
        builder.add_adsorbate("O*", s);
        builder.add_transition_state("O-O*", s);
        builder
            .add_step_from_tokens("diss", &["O2_g", "*_s", "*_s"], Some(&["O-O*"]), &["O*", "O*"])
            .unwrap();
        let err = builder.build().unwrap_err();
        assert!(matches!(err, ModelError::SiteImbalance { state: "transition", .. }));
    }

    #[test]
    fn transition_species_outside_transition_state_is_rejected() {
        let mut builder = ReactionModel::builder();
        let s = builder.add_site("s", 1.0);
        builder.add_adsorbate("A*", s);
        builder.add_transition_state("A-TS*", s);
        builder
            .add_step_from_tokens("bad", &["A*"], None, &["A-TS*"])
            .unwrap();
        assert!(matches!(builder.build(), Err(ModelError::InvalidStep { .. })));
    }

    #[test]
    fn unknown_tokens_are_reported() {
        let mut builder = ReactionModel::builder();
        builder.add_site("s", 1.0);
        assert_eq!(
            builder.resolve("*_t"),
            Err(ModelError::UnknownSite("t".to_string()))
        );
        assert_eq!(
            builder.resolve("CO*"),
            Err(ModelError::UnknownParticipant("CO*".to_string()))
        );
        assert_eq!(builder.resolve("*"), Ok(Participant::FreeSite(SiteId(0))));
    }

    #[test]
    fn site_aliases_resolve_free_sites() {
        let mut builder = ReactionModel::builder();
        let s = builder.add_site("s", 1.0);
        builder.add_site_alias(s, "terrace");
        assert_eq!(builder.resolve("*_terrace"), Ok(Participant::FreeSite(s)));
    }

    #[test]
    fn invalid_capacity_and_duplicate_names_are_rejected() {
        let mut builder = ReactionModel::builder();
        let s = builder.add_site("s", 1.5);
        builder.add_adsorbate("A*", s);
        assert!(matches!(builder.build(), Err(ModelError::InvalidCapacity { .. })));

        let mut builder = ReactionModel::builder();
        let s = builder.add_site("s", 1.0);
        builder.add_adsorbate("A*", s);
        builder.add_adsorbate("A*", s);
        assert_eq!(
            builder.build().unwrap_err(),
            ModelError::DuplicateName("A*".to_string())
        );
    }

    #[test]
    fn model_without_adsorbates_is_rejected() {
        let mut builder = ReactionModel::builder();
        builder.add_site("s", 1.0);
        builder.add_gas("A_g", 1.0);
        assert_eq!(builder.build().unwrap_err(), ModelError::NoAdsorbates);
    }

    #[test]
    fn dissociative_model_builds_with_transition_state() {
        let model = dissociative();
        assert_eq!(model.adsorbates().len(), 1);
        assert_eq!(model.steps()[0].initial_state.count(Participant::FreeSite(SiteId(0))), 2);
    }
}
