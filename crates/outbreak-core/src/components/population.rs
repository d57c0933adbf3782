//! Age-structured population data and proportional age allocation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Inclusive age interval, written `"(low, high)"` in input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgeBand {
    pub low: u32,
    pub high: u32,
}

impl AgeBand {
    pub fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, age: u32) -> bool {
        (self.low..=self.high).contains(&age)
    }
}

impl fmt::Display for AgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.low, self.high)
    }
}

impl FromStr for AgeBand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::config(format!("malformed age band label {s:?}"));
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(bad)?;
        let (low, high) = inner.split_once(',').ok_or_else(bad)?;
        let low: u32 = low.trim().parse().map_err(|_| bad())?;
        let high: u32 = high.trim().parse().map_err(|_| bad())?;
        if low > high {
            return Err(Error::config(format!(
                "age band {s:?} has low bound above high bound"
            )));
        }
        Ok(Self { low, high })
    }
}

impl TryFrom<String> for AgeBand {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AgeBand> for String {
    fn from(band: AgeBand) -> Self {
        band.to_string()
    }
}

/// Number of people per age band, ordered by band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgeStructure(BTreeMap<AgeBand, u32>);

impl AgeStructure {
    pub fn new(bands: impl IntoIterator<Item = (AgeBand, u32)>) -> Self {
        Self(bands.into_iter().collect())
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn bands(&self) -> impl Iterator<Item = AgeBand> + '_ {
        self.0.keys().copied()
    }

    pub fn count(&self, band: &AgeBand) -> u32 {
        self.0.get(band).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AgeBand, &u32)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bands must be non-empty, disjoint and contiguous.
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(Error::config("age structure has no bands"));
        }
        let mut previous: Option<AgeBand> = None;
        for band in self.0.keys() {
            if let Some(prev) = previous {
                if band.low <= prev.high {
                    return Err(Error::config(format!(
                        "age bands {prev} and {band} overlap"
                    )));
                }
                if band.low != prev.high + 1 {
                    return Err(Error::config(format!(
                        "age bands {prev} and {band} leave a gap"
                    )));
                }
            }
            previous = Some(*band);
        }
        Ok(())
    }

    /// Split `total` labels across bands in proportion to their counts.
    ///
    /// Uses the largest-remainder method; ties go to the lower band so the
    /// result is deterministic.
    pub fn allocate(&self, total: u32) -> Result<BTreeMap<AgeBand, u32>> {
        let population = self.total() as u64;
        if population == 0 {
            return Err(Error::config("age structure has zero population"));
        }

        let mut allocation = BTreeMap::new();
        let mut remainders = Vec::with_capacity(self.0.len());
        let mut assigned = 0u64;
        for (band, &count) in &self.0 {
            let scaled = count as u64 * total as u64;
            let quota = scaled / population;
            assigned += quota;
            allocation.insert(*band, quota as u32);
            remainders.push((scaled % population, *band));
        }

        // Larger remainder first, lower band first on ties
        remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        let leftover = total as u64 - assigned;
        for (_, band) in remainders.into_iter().take(leftover as usize) {
            if let Some(slot) = allocation.get_mut(&band) {
                *slot += 1;
            }
        }

        Ok(allocation)
    }
}

/// A named community and its age structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationModel {
    pub name: String,
    pub age_structure: AgeStructure,
}

impl PopulationModel {
    pub fn new(name: impl Into<String>, age_structure: AgeStructure) -> Result<Self> {
        age_structure.validate()?;
        Ok(Self {
            name: name.into(),
            age_structure,
        })
    }

    pub fn size(&self) -> usize {
        self.age_structure.total() as usize
    }

    /// Age label for each of `node_count` nodes, shuffled across node ids.
    pub fn assign_ages(&self, node_count: usize, rng: &mut impl Rng) -> Result<Vec<AgeBand>> {
        let allocation = self.age_structure.allocate(node_count as u32)?;
        let mut labels = Vec::with_capacity(node_count);
        for (band, count) in allocation {
            labels.extend(std::iter::repeat(band).take(count as usize));
        }
        labels.shuffle(rng);
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn band(low: u32, high: u32) -> AgeBand {
        AgeBand::new(low, high)
    }

    #[test]
    fn test_age_band_parsing() {
        assert_eq!("(0, 9)".parse::<AgeBand>().unwrap(), band(0, 9));
        assert_eq!("(10,19)".parse::<AgeBand>().unwrap(), band(10, 19));
        assert_eq!(band(20, 29).to_string(), "(20, 29)");
        assert!("0-9".parse::<AgeBand>().is_err());
        assert!("(9, 0)".parse::<AgeBand>().is_err());
        assert!("(a, 9)".parse::<AgeBand>().is_err());
    }

    #[test]
    fn test_age_structure_json_keys() {
        let s: AgeStructure = serde_json::from_str(r#"{"(0,9)": 100, "(10, 19)": 50}"#).unwrap();
        assert_eq!(s.total(), 150);
        assert_eq!(s.count(&band(10, 19)), 50);
        let out = serde_json::to_string(&s).unwrap();
        assert_eq!(out, r#"{"(0, 9)":100,"(10, 19)":50}"#);
    }

    #[test]
    fn test_validate_rejects_overlap_and_gap() {
        let overlap = AgeStructure::new([(band(0, 9), 1), (band(5, 19), 1)]);
        assert!(overlap.validate().is_err());
        let gap = AgeStructure::new([(band(0, 9), 1), (band(20, 29), 1)]);
        assert!(gap.validate().is_err());
        let ok = AgeStructure::new([(band(0, 9), 1), (band(10, 19), 1)]);
        assert!(ok.validate().is_ok());
        assert!(AgeStructure::default().validate().is_err());
    }

    #[test]
    fn test_allocate_exact_population() {
        let s = AgeStructure::new([(band(0, 9), 3), (band(10, 19), 5), (band(20, 29), 2)]);
        let a = s.allocate(10).unwrap();
        assert_eq!(a[&band(0, 9)], 3);
        assert_eq!(a[&band(10, 19)], 5);
        assert_eq!(a[&band(20, 29)], 2);
    }

    #[test]
    fn test_allocate_largest_remainder() {
        // 1/3 each of 10 nodes: quotas 3,3,3 with equal remainders, lowest band wins
        let s = AgeStructure::new([(band(0, 9), 1), (band(10, 19), 1), (band(20, 29), 1)]);
        let a = s.allocate(10).unwrap();
        assert_eq!(a[&band(0, 9)], 4);
        assert_eq!(a[&band(10, 19)], 3);
        assert_eq!(a[&band(20, 29)], 3);
        assert_eq!(a.values().sum::<u32>(), 10);

        // 7/10 and 3/10 of 4 nodes: 2.8 and 1.2, remainder goes to the first
        let s = AgeStructure::new([(band(0, 9), 7), (band(10, 19), 3)]);
        let a = s.allocate(4).unwrap();
        assert_eq!(a[&band(0, 9)], 3);
        assert_eq!(a[&band(10, 19)], 1);
    }

    #[test]
    fn test_assign_ages_matches_structure() {
        let s = AgeStructure::new([(band(0, 9), 40), (band(10, 19), 60)]);
        let pop = PopulationModel::new("test", s).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let labels = pop.assign_ages(pop.size(), &mut rng).unwrap();
        assert_eq!(labels.len(), 100);
        assert_eq!(labels.iter().filter(|b| **b == band(0, 9)).count(), 40);
        assert_eq!(labels.iter().filter(|b| **b == band(10, 19)).count(), 60);
    }
}
