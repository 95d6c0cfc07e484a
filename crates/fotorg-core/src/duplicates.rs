use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::hashing::HashAlgorithm;
use crate::item::Item;

/// Items sharing one content hash, original first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub content_hash: String,
    /// Member paths; index 0 is the item kept as original
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    pub fn original(&self) -> &Path {
        &self.paths[0]
    }

    pub fn duplicates(&self) -> &[PathBuf] {
        self.paths.get(1..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Flags byte-identical items as duplicates.
///
/// Must run before planning: the planner reads the duplicate flag it sets.
#[derive(Debug, Clone, Default)]
pub struct DuplicateDetector {
    algorithm: HashAlgorithm,
}

impl DuplicateDetector {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash what is missing, group by hash and mark everything but the
    /// original of each group as duplicate.
    pub fn detect(&self, items: &mut [Item]) -> Vec<DuplicateGroup> {
        // Group order follows the first appearance of each hash
        let mut order: Vec<String> = Vec::new();
        let mut by_hash: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, item) in items.iter_mut().enumerate() {
            if item.content_hash().is_none() {
                item.compute_hash(self.algorithm);
            }
            let Some(hash) = item.content_hash() else {
                continue;
            };
            let members = by_hash.entry(hash.to_string()).or_insert_with(|| {
                order.push(hash.to_string());
                Vec::new()
            });
            members.push(i);
        }

        let mut groups = Vec::new();
        for hash in order {
            let members = &by_hash[&hash];
            if members.len() <= 1 {
                continue;
            }

            let Some(original) = members
                .iter()
                .copied()
                .min_by(|&a, &b| original_order(&items[a], &items[b]))
            else {
                continue;
            };

            let mut ordered = Vec::with_capacity(members.len());
            ordered.push(original);
            ordered.extend(members.iter().copied().filter(|&i| i != original));

            for &idx in &ordered[1..] {
                items[idx].mark_as_duplicate();
            }

            groups.push(DuplicateGroup {
                content_hash: hash,
                paths: ordered.iter().map(|&i| items[i].path().to_path_buf()).collect(),
            });
        }

        log::debug!("{} duplicate group(s) among {} item(s)", groups.len(), items.len());
        groups
    }

    /// Run detection and return how many items were marked duplicate.
    pub fn mark_duplicates(&self, items: &mut [Item]) -> usize {
        self.detect(items).iter().map(|g| g.len() - 1).sum()
    }
}

/// Earliest capture time first (missing dates last), then smallest path.
fn original_order(a: &Item, b: &Item) -> Ordering {
    let by_date = match (a.capture_time(), b.capture_time()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_date.then_with(|| a.path().to_string_lossy().cmp(&b.path().to_string_lossy()))
}
