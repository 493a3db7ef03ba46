use crate::profilestorepb::{Label, LabelSet};
use xxhash_rust::xxh3::Xxh3;

/// is_equal_label compares two label sets position by position.
///
/// `{a=1, b=2}` and `{b=2, a=1}` are different series. A missing label set is
/// the same as an empty one.
pub fn is_equal_label(a: Option<&LabelSet>, b: Option<&LabelSet>) -> bool {
    let a = labels_of(a);
    let b = labels_of(b);

    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|(x, y)| x.name == y.name && x.value == y.value)
}

/// label_set_hash hashes the label sequence in order, so that two sets equal
/// under [`is_equal_label`] always hash the same.
pub fn label_set_hash(ls: Option<&LabelSet>) -> u64 {
    let mut h = Xxh3::new();
    for label in labels_of(ls) {
        h.update(&(label.name.len() as u64).to_le_bytes());
        h.update(label.name.as_bytes());
        h.update(&(label.value.len() as u64).to_le_bytes());
        h.update(label.value.as_bytes());
    }
    h.digest()
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self {
            labels: iter.into_iter().map(|(n, v)| Label::new(n, v)).collect(),
        }
    }
}

fn labels_of(ls: Option<&LabelSet>) -> &[Label] {
    ls.map(|ls| ls.labels.as_slice()).unwrap_or_default()
}
