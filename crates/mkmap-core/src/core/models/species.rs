use super::ids::SiteId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeciesKind {
    /// Gas-phase species at a fixed partial pressure (bar).
    Gas { pressure: f64 },
    Adsorbate { site: SiteId },
    TransitionState { site: SiteId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub name: String,
    pub kind: SpeciesKind,
}

impl Species {
    pub fn is_gas(&self) -> bool {
        matches!(self.kind, SpeciesKind::Gas { .. })
    }

    pub fn is_adsorbate(&self) -> bool {
        matches!(self.kind, SpeciesKind::Adsorbate { .. })
    }

    pub fn is_transition_state(&self) -> bool {
        matches!(self.kind, SpeciesKind::TransitionState { .. })
    }

    /// Owning site for surface species, `None` for gases.
    pub fn site(&self) -> Option<SiteId> {
        match self.kind {
            SpeciesKind::Gas { .. } => None,
            SpeciesKind::Adsorbate { site } | SpeciesKind::TransitionState { site } => Some(site),
        }
    }
}
