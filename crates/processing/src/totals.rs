//! Insertion-ordered accumulator of group totals.

use std::collections::HashMap;

/// Running totals keyed by group, iterated in first-seen order.
///
/// Size is bounded by the number of distinct groups, never by row count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupTotals {
    index: HashMap<String, usize>,
    entries: Vec<(String, i64)>,
}

impl GroupTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to `group`, creating the group at the end of the order if unseen.
    pub fn add(&mut self, group: &str, amount: i64) {
        match self.index.get(group) {
            Some(&slot) => {
                let total = &mut self.entries[slot].1;
                *total = total.saturating_add(amount);
            }
            None => {
                self.index.insert(group.to_string(), self.entries.len());
                self.entries.push((group.to_string(), amount));
            }
        }
    }

    pub fn get(&self, group: &str) -> Option<i64> {
        self.index.get(group).map(|&slot| self.entries[slot].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(group, total)| (group.as_str(), *total))
    }
}

impl<'a> FromIterator<(&'a str, i64)> for GroupTotals {
    fn from_iter<T: IntoIterator<Item = (&'a str, i64)>>(iter: T) -> Self {
        let mut totals = Self::new();
        for (group, amount) in iter {
            totals.add(group, amount);
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_seen_order() {
        let totals: GroupTotals = [("b", 1), ("a", 2), ("b", 3), ("c", 4)].into_iter().collect();
        let order: Vec<_> = totals.iter().collect();
        assert_eq!(order, vec![("b", 4), ("a", 2), ("c", 4)]);
    }

    #[test]
    fn grouping_is_case_sensitive() {
        let totals: GroupTotals = [("Toys", 1), ("toys", 2)].into_iter().collect();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals.get("Toys"), Some(1));
        assert_eq!(totals.get("toys"), Some(2));
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let mut totals = GroupTotals::new();
        totals.add("x", i64::MAX);
        totals.add("x", 1);
        assert_eq!(totals.get("x"), Some(i64::MAX));
    }
}
