use super::ids::{SiteId, SpeciesId};

/// One entry of a reaction state: a named species or an empty site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Participant {
    Species(SpeciesId),
    FreeSite(SiteId),
}

/// A multiset of participants, kept in first-appearance order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReactionState {
    terms: Vec<(Participant, u32)>,
}

impl ReactionState {
    pub fn from_participants(participants: impl IntoIterator<Item = Participant>) -> Self {
        let mut state = Self::default();
        for participant in participants {
            state.push(participant);
        }
        state
    }

    pub fn push(&mut self, participant: Participant) {
        match self.terms.iter_mut().find(|(p, _)| *p == participant) {
            Some((_, count)) => *count += 1,
            None => self.terms.push((participant, 1)),
        }
    }

    pub fn terms(&self) -> &[(Participant, u32)] {
        &self.terms
    }

    pub fn count(&self, participant: Participant) -> u32 {
        self.terms
            .iter()
            .find(|(p, _)| *p == participant)
            .map_or(0, |(_, count)| *count)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// `initial -> [transition] -> final`, read left to right as the forward direction.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementaryStep {
    pub name: String,
    pub initial_state: ReactionState,
    pub transition_state: Option<ReactionState>,
    pub final_state: ReactionState,
}

impl ElementaryStep {
    pub fn states(&self) -> impl Iterator<Item = &ReactionState> {
        std::iter::once(&self.initial_state)
            .chain(self.transition_state.iter())
            .chain(std::iter::once(&self.final_state))
    }

    pub fn involves(&self, participant: Participant) -> bool {
        self.states().any(|state| state.count(participant) > 0)
    }
}
