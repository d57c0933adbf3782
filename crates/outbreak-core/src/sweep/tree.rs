//! Nested results keyed by behaviour variant, one level per behaviour.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::BehaviourCombination;
use crate::components::AveragedResult;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultTree {
    Leaf(AveragedResult),
    Branch(BTreeMap<String, ResultTree>),
}

impl Default for ResultTree {
    fn default() -> Self {
        ResultTree::Branch(BTreeMap::new())
    }
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `result` at the combination's path. Inserting the same path
    /// twice replaces the earlier leaf.
    pub fn insert(&mut self, combination: &BehaviourCombination, result: AveragedResult) -> Result<()> {
        let path = combination.path();
        let Some((last, parents)) = path.split_last() else {
            return Err(Error::config("cannot insert a result for an empty combination"));
        };

        let mut node = self;
        for segment in parents {
            let ResultTree::Branch(children) = node else {
                return Err(Error::config(format!(
                    "path {} runs through a result leaf",
                    combination.key()
                )));
            };
            node = children.entry(segment.clone()).or_default();
        }
        match node {
            ResultTree::Branch(children) => {
                if matches!(children.get(last), Some(ResultTree::Branch(_))) {
                    return Err(Error::config(format!(
                        "path {} ends at a branch",
                        combination.key()
                    )));
                }
                children.insert(last.clone(), ResultTree::Leaf(result));
                Ok(())
            }
            ResultTree::Leaf(_) => Err(Error::config(format!(
                "path {} runs through a result leaf",
                combination.key()
            ))),
        }
    }

    /// Look up a `/`-separated key.
    pub fn get(&self, key: &str) -> Option<&AveragedResult> {
        let mut node = self;
        for segment in key.split('/') {
            match node {
                ResultTree::Branch(children) => node = children.get(segment)?,
                ResultTree::Leaf(_) => return None,
            }
        }
        match node {
            ResultTree::Leaf(result) => Some(result),
            ResultTree::Branch(_) => None,
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            ResultTree::Leaf(_) => 1,
            ResultTree::Branch(children) => children.values().map(ResultTree::leaf_count).sum(),
        }
    }

    /// Every leaf with its `/`-joined key, in key order.
    pub fn leaves(&self) -> Vec<(String, &AveragedResult)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &mut Vec<&'a str>, out: &mut Vec<(String, &'a AveragedResult)>) {
        match self {
            ResultTree::Leaf(result) => out.push((prefix.join("/"), result)),
            ResultTree::Branch(children) => {
                for (segment, child) in children {
                    prefix.push(segment);
                    child.collect_leaves(prefix, out);
                    prefix.pop();
                }
            }
        }
    }
}
