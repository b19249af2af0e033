//! Set difference over ordered sequences

/// Elements of `a` that do not occur in `b`, in `a`'s order.
///
/// Duplicates in `a` are kept as they are; nothing is added.
///
/// ```
/// use converge::difference;
///
/// let existing = ["u1", "u2", "u3"];
/// let desired = ["u2", "u4"];
/// assert_eq!(difference(&existing, &desired), vec!["u1", "u3"]);
/// assert_eq!(difference(&desired, &existing), vec!["u4"]);
/// ```
pub fn difference<T: PartialEq + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    a.iter().filter(|item| !b.contains(item)).cloned().collect()
}

/// Whether `items` contains `needle`, ignoring ASCII case.
///
/// Object IDs are GUIDs and the directory compares them case-insensitively.
pub fn contains_ignore_case<S: AsRef<str>>(items: &[S], needle: &str) -> bool {
    items.iter().any(|item| item.as_ref().eq_ignore_ascii_case(needle))
}

/// Elements of `a` that do not occur in `b` when compared without ASCII case.
///
/// Used for object IDs, so `"ABCD"` and `"abcd"` are the same entry.
pub fn difference_ignore_case<S: AsRef<str> + Clone>(a: &[S], b: &[S]) -> Vec<S> {
    a.iter()
        .filter(|item| !contains_ignore_case(b, item.as_ref()))
        .cloned()
        .collect()
}
