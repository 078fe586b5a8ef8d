//! Pairing of old and new columns during a migration.

use super::record::SchemeRecord;

/// One column copied from the old table into the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPair {
    /// Column in the old table.
    pub old: String,
    /// Column in the new table.
    pub new: String,
}

impl FieldPair {
    /// Creates a pair.
    #[must_use]
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }
}

/// Decides which columns survive a migration.
///
/// An empty result refuses the migration.
pub trait FieldMatcher: Send + Sync {
    /// Pairs the fields of the applied shape with the declared one.
    fn match_fields(&self, old: &SchemeRecord, new: &SchemeRecord) -> Vec<FieldPair>;
}

impl<F> FieldMatcher for F
where
    F: Fn(&SchemeRecord, &SchemeRecord) -> Vec<FieldPair> + Send + Sync,
{
    fn match_fields(&self, old: &SchemeRecord, new: &SchemeRecord) -> Vec<FieldPair> {
        self(old, new)
    }
}

/// Matches by column name first, then by source field name.
///
/// New fields are walked in declaration order and each old field is used
/// at most once, so a renamed column keeps its data as long as the struct
/// field kept its name.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameTolerant;

impl FieldMatcher for RenameTolerant {
    fn match_fields(&self, old: &SchemeRecord, new: &SchemeRecord) -> Vec<FieldPair> {
        let candidates = old.ordered_fields();
        let mut used = vec![false; candidates.len()];
        let mut pairs = Vec::new();

        for field in new.ordered_fields() {
            let unused = |i: &usize| !used[*i];
            let found = (0..candidates.len())
                .filter(unused)
                .find(|&i| candidates[i].remote_name == field.remote_name)
                .or_else(|| {
                    (0..candidates.len())
                        .filter(unused)
                        .find(|&i| candidates[i].local_name == field.local_name)
                });
            if let Some(index) = found {
                used[index] = true;
                pairs.push(FieldPair::new(
                    candidates[index].remote_name.clone(),
                    field.remote_name.clone(),
                ));
            }
        }
        pairs
    }
}
