//! Stable ordered insertion
//!
//! Sibling lists are sorted by ascending order key. Items with an equal key
//! keep their insertion order: a new item is always placed after every item
//! whose key is less than or equal to its own.

/// Index at which an item with `order` has to be inserted into `seq`
pub fn ordered_position<T>(seq: &[T], order: f64, order_of: impl Fn(&T) -> f64) -> usize {
    let Some(first) = seq.first() else {
        return 0;
    };

    if order < order_of(first) {
        return 0;
    }

    let len = seq.len();
    if len == 1 || order >= order_of(&seq[len - 1]) {
        return len;
    }

    seq.partition_point(|item| order_of(item) <= order)
}

/// Insert `item` into the sorted `seq`
///
/// Returns `false` (and leaves `seq` untouched) if `item` is already present.
pub fn insert_ordered<T: PartialEq>(
    seq: &mut Vec<T>,
    item: T,
    order: f64,
    order_of: impl Fn(&T) -> f64,
) -> bool {
    if seq.contains(&item) {
        return false;
    }
    let index = ordered_position(seq, order, order_of);
    seq.insert(index, item);
    true
}

/// Remove `item` from `seq`, preserving the order of the rest
pub fn remove_from<T: PartialEq>(seq: &mut Vec<T>, item: &T) -> bool {
    match seq.iter().position(|x| x == item) {
        Some(index) => {
            seq.remove(index);
            true
        }
        None => false,
    }
}
