// ABOUTME: Start order for a whole application: declared services, then volatile ones.
// ABOUTME: Volatile containers are ordered from the position labels written at create time.

use crate::build::{LABEL_POSITION, LABEL_SERVICE};
use crate::error::Result;
use crate::runtime::{ContainerFilters, ContainerOps, ContainerSummary};
use crate::types::{AppName, Position};
use std::cmp::Ordering;

/// One entry of the computed start order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedService {
    pub name: String,
    /// Present on the engine but no longer declared in the manifest.
    pub volatile: bool,
}

#[derive(Debug, Clone)]
struct Volatile {
    name: String,
    position: Position,
}

/// Declared services in manifest order, followed by recovered volatile ones.
pub fn start_order(declared: &[&str], containers: &[ContainerSummary]) -> Vec<OrderedService> {
    let mut volatile: Vec<Volatile> = containers
        .iter()
        .filter(|c| {
            let prefix = c.name.split('.').next().unwrap_or_default();
            !declared.contains(&prefix)
        })
        .map(|c| Volatile {
            name: c
                .labels
                .get(LABEL_SERVICE)
                .cloned()
                .unwrap_or_else(|| c.name.split('.').next().unwrap_or_default().to_string()),
            position: Position::from_label(c.labels.get(LABEL_POSITION).map(String::as_str)),
        })
        .collect();
    insertion_sort(&mut volatile, compare);

    declared
        .iter()
        .map(|name| OrderedService {
            name: name.to_string(),
            volatile: false,
        })
        .chain(volatile.into_iter().map(|v| OrderedService {
            name: v.name,
            volatile: true,
        }))
        .collect()
}

/// List the application's containers and compute the start order.
pub async fn app_order<R: ContainerOps + ?Sized>(
    runtime: &R,
    app: &AppName,
    declared: &[&str],
) -> Result<Vec<OrderedService>> {
    let containers = runtime
        .list_containers(&ContainerFilters::for_app(app.as_str()))
        .await?;
    Ok(start_order(declared, &containers))
}

/// Best-effort partial order from neighbour pointers. Ties resolve to "after".
fn compare(a: &Volatile, b: &Volatile) -> Ordering {
    let (pa, pb) = (&a.position, &b.position);
    if pa.before.is_none()
        || pb.after.is_none()
        || pa.after.as_deref() == Some(b.name.as_str())
        || pb.before.as_deref() == Some(a.name.as_str())
    {
        return Ordering::Greater;
    }
    if pa.after.is_none()
        || pb.before.is_none()
        || pa.before.as_deref() == Some(b.name.as_str())
        || pb.after.as_deref() == Some(a.name.as_str())
    {
        return Ordering::Less;
    }
    Ordering::Equal
}

/// Stable insertion sort. The comparator is not a total order, so `sort_by`
/// is not an option.
fn insertion_sort<T>(items: &mut [T], cmp: impl Fn(&T, &T) -> Ordering) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && cmp(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContainerId;
    use std::collections::HashMap;

    fn summary(name: &str, after: Option<&str>, before: Option<&str>) -> ContainerSummary {
        let service = name.split('.').next().unwrap().to_string();
        let position = Position {
            after: after.map(String::from),
            before: before.map(String::from),
        };
        ContainerSummary {
            id: ContainerId::new(format!("id-{}", name)),
            name: name.to_string(),
            state: "exited".to_string(),
            labels: HashMap::from([
                (LABEL_SERVICE.to_string(), service),
                (LABEL_POSITION.to_string(), position.to_label()),
            ]),
        }
    }

    fn names(order: &[OrderedService]) -> Vec<&str> {
        order.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn declared_order_comes_first() {
        let containers = vec![summary("b.shop", None, None), summary("a.shop", None, None)];
        let order = start_order(&["a", "b"], &containers);
        assert_eq!(names(&order), vec!["a", "b"]);
        assert!(order.iter().all(|s| !s.volatile));
    }

    #[test]
    fn volatile_chain_is_recovered_from_positions() {
        for containers in [
            vec![
                summary("a.shop", None, Some("b")),
                summary("b.shop", Some("a"), Some("c")),
                summary("c.shop", Some("b"), None),
            ],
            vec![
                summary("c.shop", Some("b"), None),
                summary("b.shop", Some("a"), Some("c")),
                summary("a.shop", None, Some("b")),
            ],
        ] {
            let order = start_order(&["a"], &containers);
            assert_eq!(names(&order), vec!["a", "b", "c"]);
            assert!(!order[0].volatile);
            assert!(order[1].volatile && order[2].volatile);
        }
    }

    fn permutations(items: Vec<ContainerSummary>) -> Vec<Vec<ContainerSummary>> {
        if items.len() <= 1 {
            return vec![items];
        }
        let mut all = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.clone();
            let head = rest.remove(i);
            for mut tail in permutations(rest) {
                tail.insert(0, head.clone());
                all.push(tail);
            }
        }
        all
    }

    #[test]
    fn all_volatile_chain_sorts_from_any_listing_order() {
        let chain = vec![
            summary("a.shop", None, Some("b")),
            summary("b.shop", Some("a"), Some("c")),
            summary("c.shop", Some("b"), Some("d")),
            summary("d.shop", Some("c"), None),
        ];
        let listings = permutations(chain);
        assert_eq!(listings.len(), 24);
        for containers in listings {
            let order = start_order(&[], &containers);
            assert_eq!(names(&order), vec!["a", "b", "c", "d"]);
            assert!(order.iter().all(|s| s.volatile));
        }
    }

    #[test]
    fn chain_with_a_removed_middle_keeps_its_ends() {
        let chain = vec![
            summary("a.shop", None, Some("b")),
            summary("b.shop", Some("a"), Some("c")),
            summary("d.shop", Some("c"), Some("e")),
            summary("e.shop", Some("d"), None),
        ];
        for containers in permutations(chain) {
            let order = start_order(&[], &containers);
            let order = names(&order);
            assert_eq!(order.first(), Some(&"a"));
            assert_eq!(order.last(), Some(&"e"));

            // b and d no longer share a neighbour, so they keep listing order
            let listed: Vec<&str> = containers
                .iter()
                .map(|c| &c.name[..1])
                .filter(|n| *n == "b" || *n == "d")
                .collect();
            let sorted: Vec<&str> = order
                .iter()
                .copied()
                .filter(|n| *n == "b" || *n == "d")
                .collect();
            assert_eq!(sorted, listed);
        }
    }

    #[test]
    fn chain_missing_its_head_keeps_its_order() {
        let chain = vec![
            summary("b.shop", Some("a"), Some("c")),
            summary("c.shop", Some("b"), Some("d")),
            summary("d.shop", Some("c"), None),
        ];
        for containers in permutations(chain) {
            let order = start_order(&["a"], &containers);
            assert_eq!(names(&order), vec!["a", "b", "c", "d"]);
            assert!(!order[0].volatile);
        }
    }

    #[test]
    fn unrelated_middles_keep_listing_order() {
        let containers = vec![
            summary("y.shop", Some("p"), Some("q")),
            summary("x.shop", Some("r"), Some("s")),
        ];
        assert_eq!(names(&start_order(&[], &containers)), vec!["y", "x"]);

        let containers = vec![
            summary("x.shop", Some("r"), Some("s")),
            summary("y.shop", Some("p"), Some("q")),
        ];
        assert_eq!(names(&start_order(&[], &containers)), vec!["x", "y"]);
    }

    #[test]
    fn unlabelled_containers_fall_back_to_their_name() {
        let containers = vec![ContainerSummary {
            id: ContainerId::new("id-old"),
            name: "old.shop".to_string(),
            state: "exited".to_string(),
            labels: HashMap::new(),
        }];
        let order = start_order(&[], &containers);
        assert_eq!(
            order,
            vec![OrderedService {
                name: "old".to_string(),
                volatile: true
            }]
        );
    }
}
