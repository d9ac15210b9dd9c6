//! Definition diffs between two snapshots of a namespace.

use crate::namespace::Snapshot;

/// Names that appeared, vanished or changed identity between two snapshots.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct DefinitionDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl DefinitionDiff {
    /// Compares snapshots taken before and after an evaluation.
    ///
    /// Values are compared with `===`, so a reassigned `NaN` counts as changed and a
    /// mutated object does not.
    pub fn between(before: &Snapshot, after: &Snapshot) -> Self {
        let mut diff = Self::default();
        for (name, value) in after {
            match before.get(name) {
                None => diff.added.push(name.clone()),
                Some(previous) if !previous.strict_equals(value) => diff.changed.push(name.clone()),
                Some(_) => {}
            }
        }
        diff.removed = before.keys().filter(|name| !after.contains_key(*name)).cloned().collect();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::interp::Value;

    fn snapshot(entries: &[(&str, Value)]) -> Snapshot {
        entries.iter().map(|(name, value)| ((*name).to_owned(), value.clone())).collect()
    }

    #[test]
    fn reports_added_removed_and_changed() {
        let before = snapshot(&[("a", Value::from(1.0)), ("gone", Value::Null), ("same", Value::from("s"))]);
        let after = snapshot(&[("a", Value::from(9.0)), ("same", Value::from("s")), ("b", Value::from(2.0))]);
        let diff = DefinitionDiff::between(&before, &after);
        assert_eq!(
            diff,
            DefinitionDiff {
                added: vec!["b".to_owned()],
                removed: vec!["gone".to_owned()],
                changed: vec!["a".to_owned()],
            }
        );
    }

    #[test]
    fn nan_is_never_equal_to_itself() {
        let before = snapshot(&[("n", Value::from(f64::NAN))]);
        let after = snapshot(&[("n", Value::from(f64::NAN))]);
        assert_eq!(DefinitionDiff::between(&before, &after).changed, vec!["n".to_owned()]);
    }

    #[test]
    fn identical_snapshots_are_empty() {
        let before = snapshot(&[("x", Value::from(true))]);
        assert!(DefinitionDiff::between(&before, &before.clone()).is_empty());
    }
}
