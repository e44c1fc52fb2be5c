//! Cross-item aggregation: the per-section tag index.

use crate::model::Item;
use std::borrow::Borrow;

/// Map each tag to the indexes of the items carrying it, in the items'
/// current order. Grouping is by exact tag string (`Rust` and `rust`
/// are distinct tags); only the index ordering ignores case, so `Rust`
/// and `zig` interleave sanely.
pub fn build_tag_index<T: Borrow<Item>>(items: &[T]) -> Vec<(String, Vec<usize>)> {
    let mut index: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, item) in items.iter().enumerate() {
        for tag in &item.borrow().tags {
            match index.iter_mut().find(|(t, _)| t.as_str() == tag.as_str()) {
                Some((_, ids)) => ids.push(i),
                None => index.push((tag.clone(), vec![i])),
            }
        }
    }
    // Exact comparison as tiebreak keeps case variants in a stable order.
    index.sort_by(|(a, _), (b, _)| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
    index
}
