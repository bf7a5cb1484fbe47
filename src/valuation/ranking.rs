//! Ordering of admitted items.
//!
//! Rare items rank above common ones; within a category the product of
//! profit and stability decides. The sort is stable, so equal keys keep
//! their discovery order and identical inputs always rank identically.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::market::models::ProfitableItem;

/// Sort `items` by (category priority desc, profit × stability desc).
///
/// With `dedupe_by_name`, only the first (highest-ranked) occurrence of each
/// name is kept, so an item found in several partitions appears once.
pub fn rank(mut items: Vec<ProfitableItem>, dedupe_by_name: bool) -> Vec<ProfitableItem> {
    items.sort_by(compare);

    if dedupe_by_name {
        let mut seen = HashSet::new();
        items.retain(|item| seen.insert(item.name.clone()));
    }

    items
}

fn compare(a: &ProfitableItem, b: &ProfitableItem) -> Ordering {
    b.category
        .priority()
        .cmp(&a.category.priority())
        .then_with(|| b.rank_score().total_cmp(&a.rank_score()))
}
