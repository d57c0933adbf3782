//! Temporary contacts layered over the static graph.
//!
//! Behaviours never add edges to a [`ContactGraph`]. A [`ContactModel`]
//! fills a [`DailyContacts`] overlay at the start of each day and the engine
//! clears it once the day's infections have been drawn.

use rand::seq::index;

use crate::error::{Error, Result};
use crate::generation::ContactGraph;
use crate::rng::SimRng;
use crate::sweep::BehaviourCombination;

/// Extra partners per node for the current day.
#[derive(Debug, Clone, Default)]
pub struct DailyContacts {
    partners: Vec<Vec<u32>>,
    pairs: usize,
}

impl DailyContacts {
    pub fn new(node_count: usize) -> Self {
        Self {
            partners: vec![Vec::new(); node_count],
            pairs: 0,
        }
    }

    /// Record a contact unless it is a self-contact, a static edge or
    /// already recorded today.
    pub fn add(&mut self, graph: &ContactGraph, a: u32, b: u32) -> bool {
        if a == b || graph.has_edge(a, b) || self.partners[a as usize].contains(&b) {
            return false;
        }
        self.partners[a as usize].push(b);
        self.partners[b as usize].push(a);
        self.pairs += 1;
        true
    }

    pub fn partners(&self, node: u32) -> &[u32] {
        &self.partners[node as usize]
    }

    /// Number of distinct contact pairs recorded today.
    pub fn len(&self) -> usize {
        self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }

    pub fn clear(&mut self) {
        for list in &mut self.partners {
            list.clear();
        }
        self.pairs = 0;
    }
}

/// Source of per-day contacts for one run at a time.
pub trait ContactModel: Send {
    /// Forget any per-run state before a new run on `graph`.
    fn reset(&mut self, graph: &ContactGraph);

    /// Add the contacts for `day` (counted from zero).
    fn add_contacts(
        &mut self,
        day: u32,
        graph: &ContactGraph,
        rng: &mut SimRng,
        contacts: &mut DailyContacts,
    );
}

/// The static graph alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticContacts;

impl ContactModel for StaticContacts {
    fn reset(&mut self, _graph: &ContactGraph) {}

    fn add_contacts(
        &mut self,
        _day: u32,
        _graph: &ContactGraph,
        _rng: &mut SimRng,
        _contacts: &mut DailyContacts,
    ) {
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Visit {
    behaviour: String,
    per_week: u32,
    group_size: u32,
    local: bool,
}

/// Weekly group visits, one schedule per behaviour.
///
/// Every seventh day each node picks `visits_per_week` distinct weekdays
/// for each behaviour. On those days it meets `people_per_visit` others:
/// close nodes for local behaviours (joined to the visitor only), anyone in
/// the population otherwise (the whole group forms a clique).
#[derive(Debug, Clone)]
pub struct GroupVisits {
    visits: Vec<Visit>,
    /// schedule[node][visit] is a bitmask of weekdays
    schedule: Vec<Vec<u8>>,
}

impl GroupVisits {
    pub fn new(combination: &BehaviourCombination, local_behaviours: &[String]) -> Result<Self> {
        let mut visits = Vec::new();
        for variant in combination.variants() {
            if variant.visits_per_week > 7 {
                return Err(Error::config(format!(
                    "behaviour {:?} has {} visits per week, at most 7 allowed",
                    variant.behaviour, variant.visits_per_week
                )));
            }
            if variant.is_disabled() {
                continue;
            }
            visits.push(Visit {
                behaviour: variant.behaviour.clone(),
                per_week: variant.visits_per_week,
                group_size: variant.people_per_visit,
                local: local_behaviours.contains(&variant.behaviour),
            });
        }
        Ok(Self {
            visits,
            schedule: Vec::new(),
        })
    }

    /// Behaviours that contribute contacts.
    pub fn active_behaviours(&self) -> impl Iterator<Item = &str> {
        self.visits.iter().map(|v| v.behaviour.as_str())
    }

    fn plan_week(&mut self, node: usize, rng: &mut SimRng) {
        for (slot, visit) in self.visits.iter().enumerate() {
            let mut days = 0u8;
            for day in index::sample(rng, 7, visit.per_week as usize) {
                days |= 1 << day;
            }
            self.schedule[node][slot] = days;
        }
    }

    fn meet(visit: &Visit, node: u32, graph: &ContactGraph, rng: &mut SimRng, contacts: &mut DailyContacts) {
        if visit.local {
            let close = graph.close_nodes(node);
            let size = (visit.group_size as usize).min(close.len());
            for i in index::sample(rng, close.len(), size) {
                contacts.add(graph, node, close[i]);
            }
            return;
        }

        let others = graph.node_count().saturating_sub(1);
        let size = (visit.group_size as usize).min(others);
        let mut group: Vec<u32> = index::sample(rng, others, size)
            .into_iter()
            .map(|i| if i as u32 >= node { i as u32 + 1 } else { i as u32 })
            .collect();
        group.push(node);
        for (i, &a) in group.iter().enumerate() {
            for &b in &group[i + 1..] {
                contacts.add(graph, a, b);
            }
        }
    }
}

impl ContactModel for GroupVisits {
    fn reset(&mut self, graph: &ContactGraph) {
        self.schedule = vec![vec![0; self.visits.len()]; graph.node_count()];
    }

    fn add_contacts(
        &mut self,
        day: u32,
        graph: &ContactGraph,
        rng: &mut SimRng,
        contacts: &mut DailyContacts,
    ) {
        if self.visits.is_empty() {
            return;
        }
        if self.schedule.len() != graph.node_count() {
            self.reset(graph);
        }

        let weekday = day % 7;
        for node in 0..graph.node_count() {
            if weekday == 0 {
                self.plan_week(node, rng);
            }
            for (slot, visit) in self.visits.iter().enumerate() {
                if self.schedule[node][slot] & (1 << weekday) != 0 {
                    Self::meet(visit, node as u32, graph, rng, contacts);
                }
            }
        }
    }
}
