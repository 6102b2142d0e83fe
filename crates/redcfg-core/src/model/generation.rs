// ── Controller generation ──
//
// Dell managers report their platform generation in `Model`
// ("14G Monolithic", "17G DCS"). Several endpoints moved in 17G.

use std::fmt;

/// First generation that patches storage controllers directly.
pub const MODERN_GENERATION: u32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ControllerGeneration(pub u32);

impl ControllerGeneration {
    /// Parse the leading `<digits>G` token of a manager model string.
    pub fn from_model(model: &str) -> Option<Self> {
        let token = model.split_whitespace().next()?;
        let digits = token.strip_suffix('G').or_else(|| token.strip_suffix('g'))?;
        digits.parse().ok().map(Self)
    }

    pub fn is_modern(self) -> bool {
        self.0 >= MODERN_GENERATION
    }
}

impl fmt::Display for ControllerGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}G", self.0)
    }
}
