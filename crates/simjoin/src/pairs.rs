use pipeline::{CandidatePairs, Record, RecordPair};

/// Whether `(i, j)` should be scored at all.
///
/// For a self-join (same slice on both sides) only `j > i` is visited so each
/// unordered pair is scored once.
#[inline]
pub(crate) fn should_compare(
    left: &Record,
    right: &Record,
    i: usize,
    j: usize,
    self_join: bool,
    asymmetric: bool,
) -> bool {
    if self_join && !asymmetric && j <= i {
        return false;
    }
    asymmetric || left.id != right.id
}

pub(crate) fn make_pair(left: &Record, right: &Record, asymmetric: bool) -> RecordPair {
    if asymmetric {
        RecordPair::new(left.clone(), right.clone())
    } else {
        RecordPair::unordered(left.clone(), right.clone())
    }
}

/// Sort by identity and drop duplicates (an unordered pair can be produced
/// from both sides of a two-collection join).
pub(crate) fn finish(mut pairs: Vec<RecordPair>) -> CandidatePairs {
    pairs.sort_unstable();
    pairs.dedup();
    CandidatePairs::new(pairs)
}

pub(crate) fn is_self_join(left: &[Record], right: &[Record]) -> bool {
    std::ptr::eq(left, right)
}
