use std::collections::{HashMap, HashSet, VecDeque};

use crate::graph::Company;

/// Every company reachable from `start_id` through the child relation
/// ("C is a child of P" when `P` is listed in `C.parent_ids`).
///
/// `start_id` itself is never part of the result, even when a cycle leads
/// back to it. Each company is enqueued at most once, so cycles terminate.
pub fn descendants(start_id: &str, companies: &[Company]) -> HashSet<String> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for company in companies {
        for parent in &company.parent_ids {
            children
                .entry(parent.as_str())
                .or_default()
                .push(company.id.as_str());
        }
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(start_id);

    while let Some(current) = queue.pop_front() {
        let Some(direct) = children.get(current) else {
            continue;
        };
        for &child in direct {
            if child == start_id || visited.contains(child) {
                continue;
            }
            visited.insert(child.to_string());
            queue.push_back(child);
        }
    }

    visited
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(set: &HashSet<String>) -> Vec<&str> {
        let mut out: Vec<&str> = set.iter().map(String::as_str).collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn collects_transitive_children_once() {
        let companies = vec![
            Company::new("H", "H"),
            Company::new("A", "A").with_parents(["H"]),
            Company::new("B", "B").with_parents(["H"]),
            Company::new("C", "C").with_parents(["A", "B"]),
            Company::new("Z", "Z"),
        ];

        assert_eq!(ids(&descendants("H", &companies)), vec!["A", "B", "C"]);
        assert_eq!(ids(&descendants("B", &companies)), vec!["C"]);
        assert!(descendants("C", &companies).is_empty());
        assert!(descendants("unknown", &companies).is_empty());
    }

    #[test]
    fn terminates_on_cycles_and_excludes_start() {
        let companies = vec![
            Company::new("A", "A").with_parents(["C"]),
            Company::new("B", "B").with_parents(["A"]),
            Company::new("C", "C").with_parents(["B"]),
            Company::new("D", "D").with_parents(["C"]),
        ];

        assert_eq!(ids(&descendants("A", &companies)), vec!["B", "C", "D"]);
        assert_eq!(ids(&descendants("D", &companies)), Vec::<&str>::new());
    }
}
