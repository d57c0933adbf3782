//! Behaviour variants and their combinations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::AppInputValues;
use crate::error::{Error, Result};

/// One setting of one behaviour, written `name_visits_people`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BehaviourVariant {
    pub behaviour: String,
    pub visits_per_week: u32,
    pub people_per_visit: u32,
}

impl BehaviourVariant {
    pub fn new(behaviour: impl Into<String>, visits_per_week: u32, people_per_visit: u32) -> Self {
        Self {
            behaviour: behaviour.into(),
            visits_per_week,
            people_per_visit,
        }
    }

    /// The `name_0_0` variant present in every sweep.
    pub fn disabled(behaviour: impl Into<String>) -> Self {
        Self::new(behaviour, 0, 0)
    }

    /// No visits, or nobody met on them.
    pub fn is_disabled(&self) -> bool {
        self.visits_per_week == 0 || self.people_per_visit == 0
    }
}

impl fmt::Display for BehaviourVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.behaviour, self.visits_per_week, self.people_per_visit)
    }
}

impl FromStr for BehaviourVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::config(format!("behaviour variant {s:?} is not of the form name_visits_people"));
        let mut parts = s.rsplitn(3, '_');
        let people = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let visits = parts.next().and_then(|v| v.parse().ok()).ok_or_else(bad)?;
        let name = parts.next().filter(|n| !n.is_empty()).ok_or_else(bad)?;
        Ok(Self::new(name, visits, people))
    }
}

impl TryFrom<String> for BehaviourVariant {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<BehaviourVariant> for String {
    fn from(variant: BehaviourVariant) -> Self {
        variant.to_string()
    }
}

/// One variant per behaviour, in the order the behaviours were declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BehaviourCombination(Vec<BehaviourVariant>);

impl BehaviourCombination {
    pub fn new(variants: Vec<BehaviourVariant>) -> Self {
        Self(variants)
    }

    pub fn variants(&self) -> &[BehaviourVariant] {
        &self.0
    }

    /// Tree path segments, one per behaviour.
    pub fn path(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    /// Path key used in result trees: `a_1_2/b_0_0`.
    pub fn key(&self) -> String {
        self.path().join("/")
    }

    /// File-name form of the key: `a_1_2+b_0_0`.
    pub fn file_stem(&self) -> String {
        self.path().join("+")
    }

    pub fn from_key(key: &str) -> Result<Self> {
        key.split('/')
            .map(str::parse)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// Every behaviour disabled: the static-graph baseline.
    pub fn is_baseline(&self) -> bool {
        self.0.iter().all(BehaviourVariant::is_disabled)
    }
}

impl fmt::Display for BehaviourCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Variants of one behaviour: the disabled variant first, then every
/// `(visits, people)` pair in input order, without duplicates.
pub fn behaviour_variants(values: &AppInputValues, behaviour: &str) -> Result<Vec<BehaviourVariant>> {
    let visits = values
        .num_visits
        .get(behaviour)
        .ok_or_else(|| Error::config(format!("no num_visits values for behaviour {behaviour:?}")))?;
    let people = values
        .num_people
        .get(behaviour)
        .ok_or_else(|| Error::config(format!("no num_people values for behaviour {behaviour:?}")))?;

    let mut variants = vec![BehaviourVariant::disabled(behaviour)];
    for &v in visits {
        for &p in people {
            let variant = BehaviourVariant::new(behaviour, v, p);
            if !variants.contains(&variant) {
                variants.push(variant);
            }
        }
    }
    Ok(variants)
}

/// Cartesian product of every behaviour's variants, in a stable order.
pub fn enumerate(values: &AppInputValues) -> Result<Vec<BehaviourCombination>> {
    values.validate()?;
    let mut combinations: Vec<Vec<BehaviourVariant>> = vec![Vec::new()];
    for behaviour in &values.behaviour {
        let variants = behaviour_variants(values, behaviour)?;
        combinations = combinations
            .into_iter()
            .flat_map(|prefix| {
                variants.iter().map(move |variant| {
                    let mut next = prefix.clone();
                    next.push(variant.clone());
                    next
                })
            })
            .collect();
    }
    Ok(combinations.into_iter().map(BehaviourCombination::new).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn values() -> AppInputValues {
        AppInputValues {
            community: vec!["Town".into()],
            behaviour: vec!["food_shopping".into(), "church".into()],
            num_visits: BTreeMap::from([
                ("food_shopping".to_string(), vec![1, 2, 3]),
                ("church".to_string(), vec![1, 2]),
            ]),
            num_people: BTreeMap::from([
                ("food_shopping".to_string(), vec![5]),
                ("church".to_string(), vec![20]),
            ]),
            local_behaviours: vec!["food_shopping".into()],
        }
    }

    #[test]
    fn test_variant_text_form() {
        let v: BehaviourVariant = "food_shopping_2_10".parse().unwrap();
        assert_eq!(v, BehaviourVariant::new("food_shopping", 2, 10));
        assert_eq!(v.to_string(), "food_shopping_2_10");
        assert!("shopping_2".parse::<BehaviourVariant>().is_err());
        assert!("_1_2".parse::<BehaviourVariant>().is_err());
        assert!("shopping_x_2".parse::<BehaviourVariant>().is_err());
    }

    #[test]
    fn test_disabled_variants() {
        assert!(BehaviourVariant::disabled("church").is_disabled());
        assert!(BehaviourVariant::new("church", 3, 0).is_disabled());
        assert!(!BehaviourVariant::new("church", 3, 1).is_disabled());
    }

    #[test]
    fn test_enumerate_includes_zero_variant_per_behaviour() {
        let combos = enumerate(&values()).unwrap();
        // (3 + 1) food_shopping variants times (2 + 1) church variants
        assert_eq!(combos.len(), 12);
        let unique: BTreeSet<_> = combos.iter().map(BehaviourCombination::key).collect();
        assert_eq!(unique.len(), 12);
        assert_eq!(combos[0].key(), "food_shopping_0_0/church_0_0");
        assert!(combos[0].is_baseline());
        assert!(unique.contains("food_shopping_3_5/church_2_20"));
    }

    #[test]
    fn test_duplicate_input_values_collapse() {
        let mut input = values();
        input.num_visits.insert("church".into(), vec![1, 1, 0]);
        input.num_people.insert("church".into(), vec![0]);
        let variants = behaviour_variants(&input, "church").unwrap();
        // 1_0 is distinct from 0_0 even though both are disabled
        assert_eq!(
            variants.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["church_0_0", "church_1_0"]
        );
    }

    #[test]
    fn test_key_and_file_stem() {
        let combo = BehaviourCombination::from_key("food_shopping_1_5/church_0_0").unwrap();
        assert_eq!(combo.variants().len(), 2);
        assert_eq!(combo.file_stem(), "food_shopping_1_5+church_0_0");
        assert_eq!(combo.to_string(), combo.key());
        let json = serde_json::to_string(&combo).unwrap();
        assert_eq!(json, r#"["food_shopping_1_5","church_0_0"]"#);
    }

    #[test]
    fn test_missing_values_are_configuration_errors() {
        let mut input = values();
        input.num_people.remove("church");
        assert!(matches!(enumerate(&input), Err(Error::Configuration(_))));
    }
}
