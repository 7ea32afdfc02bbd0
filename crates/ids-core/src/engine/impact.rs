use super::scoring::round2;
use crate::loader::RegistrySnapshot;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysis {
    pub entity_id: String,
    pub direct_consumers: Vec<String>,
    pub indirect_consumers: Vec<String>,
    pub total_affected: usize,
    /// Share of the registry affected, rounded to two decimals.
    pub percentage: f64,
}

/// id → consumers adjacency, built once per query. Only edges that resolve
/// to a registered entity are kept; orphans are the healer's business.
pub struct ConsumerGraph<'a> {
    consumers: HashMap<&'a str, Vec<&'a str>>,
    total_entities: usize,
}

impl<'a> ConsumerGraph<'a> {
    pub fn build(snapshot: &'a RegistrySnapshot) -> Self {
        let mut consumers: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
        for ie in snapshot.entities() {
            let id = ie.entity.id.as_str();
            let mut seen = HashSet::new();
            let edges: Vec<&'a str> = ie
                .entity
                .used_by
                .iter()
                .map(String::as_str)
                .filter(|c| *c != id && snapshot.contains(c) && seen.insert(*c))
                .collect();
            consumers.insert(id, edges);
        }
        Self {
            consumers,
            total_entities: snapshot.entity_count(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.consumers.contains_key(id)
    }

    /// Breadth-first walk over `usedBy`: direct consumers first, then every
    /// consumer reachable through them. Cycles are visited once.
    pub fn impact(&self, id: &str) -> ImpactAnalysis {
        let direct: Vec<String> = self
            .consumers
            .get(id)
            .map(|c| c.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(id);
        let mut queue: VecDeque<&str> = VecDeque::new();
        for &c in self.consumers.get(id).into_iter().flatten() {
            if visited.insert(c) {
                queue.push_back(c);
            }
        }

        let mut indirect = Vec::new();
        while let Some(node) = queue.pop_front() {
            for &next in self.consumers.get(node).into_iter().flatten() {
                if visited.insert(next) {
                    indirect.push(next.to_string());
                    queue.push_back(next);
                }
            }
        }

        let total_affected = direct.len() + indirect.len();
        let percentage = if self.total_entities == 0 {
            0.0
        } else {
            round2(total_affected as f64 / self.total_entities as f64)
        };
        ImpactAnalysis {
            entity_id: id.to_string(),
            direct_consumers: direct,
            indirect_consumers: indirect,
            total_affected,
            percentage,
        }
    }
}

/// Impact of changing `id`, or `None` when it is not registered.
pub fn calculate_impact(snapshot: &RegistrySnapshot, id: &str) -> Option<ImpactAnalysis> {
    let graph = ConsumerGraph::build(snapshot);
    graph.contains(id).then(|| graph.impact(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Entity, Registry};

    fn snapshot(edges: Vec<(&str, Vec<&str>)>) -> RegistrySnapshot {
        let mut reg = Registry::default();
        for (id, used_by) in edges {
            let mut e = Entity::new(id, format!("tasks/{id}.md"), "task");
            e.used_by = used_by.iter().map(|s| s.to_string()).collect();
            reg.upsert_entity("tasks", e);
        }
        RegistrySnapshot::build(reg).unwrap()
    }

    #[test]
    fn empty_used_by_has_no_impact() {
        let snap = snapshot(vec![("a", vec![]), ("b", vec![])]);
        let impact = calculate_impact(&snap, "a").unwrap();
        assert_eq!(impact.total_affected, 0);
        assert_eq!(impact.percentage, 0.0);
    }

    #[test]
    fn direct_and_indirect_consumers() {
        // a <- b <- c <- d ; e unrelated
        let snap = snapshot(vec![
            ("a", vec!["b"]),
            ("b", vec!["c"]),
            ("c", vec!["d"]),
            ("d", vec![]),
            ("e", vec![]),
        ]);
        let impact = calculate_impact(&snap, "a").unwrap();
        assert_eq!(impact.direct_consumers, vec!["b"]);
        assert_eq!(impact.indirect_consumers, vec!["c", "d"]);
        assert_eq!(impact.total_affected, 3);
        assert_eq!(impact.percentage, 0.6);
    }

    #[test]
    fn cycles_and_orphans_counted_once() {
        let snap = snapshot(vec![
            ("a", vec!["b", "ghost", "b"]),
            ("b", vec!["a", "c"]),
            ("c", vec!["b"]),
        ]);
        let impact = calculate_impact(&snap, "a").unwrap();
        assert_eq!(impact.direct_consumers, vec!["b"]);
        assert_eq!(impact.indirect_consumers, vec!["c"]);
        assert_eq!(impact.total_affected, 2);
        assert_eq!(impact.percentage, 0.67);
    }

    #[test]
    fn unknown_entity_has_no_analysis() {
        let snap = snapshot(vec![("a", vec![])]);
        assert!(calculate_impact(&snap, "zzz").is_none());
    }
}
