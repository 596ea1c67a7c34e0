/// A class of surface locations sharing a finite total occupancy.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub name: String,
    /// Fraction of the surface available to adsorbates on this site, in `(0, 1]`.
    pub capacity: f64,
    /// Alternative names used by external data sources.
    pub aliases: Vec<String>,
}

impl Site {
    pub fn new(name: &str, capacity: f64) -> Self {
        Self {
            name: name.to_string(),
            capacity,
            aliases: Vec::new(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|alias| alias == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_name_and_aliases() {
        let mut site = Site::new("s", 1.0);
        site.aliases.push("terrace".to_string());
        assert!(site.matches("s"));
        assert!(site.matches("terrace"));
        assert!(!site.matches("step"));
    }
}
