use std::fmt;
use std::str::FromStr;

use crate::error::EmissionsError;
use crate::schema::strategy;

/// Typed (plan, season) key for indicator and potential tables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlanSeason {
    pub plan: String,
    pub season: String,
}

impl PlanSeason {
    pub fn new(plan: impl Into<String>, season: impl Into<String>) -> Self {
        Self {
            plan: plan.into(),
            season: season.into(),
        }
    }
}

impl fmt::Display for PlanSeason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.plan, self.season)
    }
}

/// Typed (plan, season, bin) key for yearly impact tables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImpactKey {
    pub plan: String,
    pub season: String,
    pub bin: String,
}

impl ImpactKey {
    pub fn new(plan: impl Into<String>, season: impl Into<String>, bin: impl Into<String>) -> Self {
        Self {
            plan: plan.into(),
            season: season.into(),
            bin: bin.into(),
        }
    }

    pub fn plan_season(&self) -> PlanSeason {
        PlanSeason::new(self.plan.clone(), self.season.clone())
    }
}

/// Renders as "<plan>_<binslug>_<season>", the name writers file tables under.
impl fmt::Display for ImpactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.plan, bin_slug(&self.bin), self.season)
    }
}

/// "Bin 1" -> "bin1"
pub fn bin_slug(bin: &str) -> String {
    bin.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// How a DR product affects load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Load moves to the hours around the implementation block.
    Shift,
    /// Load is reduced with no compensating increase.
    Shed,
}

impl FromStr for Strategy {
    type Err = EmissionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            strategy::SHIFT => Ok(Strategy::Shift),
            strategy::SHED => Ok(Strategy::Shed),
            other => Err(EmissionsError::Domain(format!(
                "Invalid strategy: '{}'. Must be '{}' or '{}'",
                other,
                strategy::SHIFT,
                strategy::SHED
            ))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Shift => f.write_str(strategy::SHIFT),
            Strategy::Shed => f.write_str(strategy::SHED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impact_key_renders_writer_name() {
        let key = ImpactKey::new("newbins", "Fall", "Bin 1");
        assert_eq!(key.to_string(), "newbins_bin1_Fall");
        assert_eq!(key.plan_season(), PlanSeason::new("newbins", "Fall"));
    }

    #[test]
    fn strategy_parses_trimmed_tags() {
        assert_eq!(" Shift ".parse::<Strategy>().unwrap(), Strategy::Shift);
        assert_eq!("Shed".parse::<Strategy>().unwrap(), Strategy::Shed);
        let err = "Curtail".parse::<Strategy>().unwrap_err();
        assert!(matches!(err, EmissionsError::Domain(_)));
    }
}
