use std::path::{Path, PathBuf};

use crate::item::ItemRecord;
use crate::operation::Operation;
use crate::paths::resolve;
use crate::rule::OrganizationRule;

pub const REASON_NO_PATH: &str = "item has no path (incompatible with planning)";
pub const REASON_DUPLICATE: &str = "Duplicate";
pub const REASON_ALREADY_THERE: &str = "already at destination";

/// Turns items into a plan. Reads nothing but path metadata and never
/// creates or moves anything.
///
/// Duplicate flags must already be set (run the detector first).
pub struct OperationPlanner<R> {
    rule: R,
    root: PathBuf,
}

impl<R: OrganizationRule> OperationPlanner<R> {
    pub fn new(rule: R, root: impl Into<PathBuf>) -> Self {
        Self {
            rule,
            root: root.into(),
        }
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// One operation per item, in item order.
    pub fn generate<I: ItemRecord>(&self, items: &[I]) -> Vec<Operation> {
        let plan: Vec<Operation> = items.iter().map(|item| self.plan_one(item)).collect();
        log::debug!(
            "planned {} operation(s), {} move(s)",
            plan.len(),
            plan.iter().filter(|op| op.is_move()).count()
        );
        plan
    }

    fn plan_one(&self, item: &dyn ItemRecord) -> Operation {
        let (Some(source), Some(file_name)) = (item.path(), item.file_name()) else {
            return Operation::skip(PathBuf::new(), &self.root, REASON_NO_PATH);
        };

        // Duplicates stay where they are; the rule is not consulted
        if item.is_duplicate() {
            return Operation::skip(source, source, REASON_DUPLICATE);
        }

        let folder = self.rule.compute_destination(item, &self.root);
        let destination = folder.join(file_name);

        if resolve(&destination) == resolve(source) {
            return Operation::skip(source, destination, REASON_ALREADY_THERE);
        }

        Operation::move_to(source, destination)
    }
}
