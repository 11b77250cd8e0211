/// Random subset selection for quick runs
///
/// The chosen ids restrict classification and are handed unchanged to the
/// evaluator, so both stages look at the same lines.
use crate::log_record::{LineId, LogRecord};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashSet;

/// Pick `n` distinct ids out of `ids`, returned in their original order.
/// Ids are treated as opaque, so tabular sources with gaps or non-numeric
/// ids sample correctly. Returns every id when `n >= ids.len()`. A fixed
/// seed makes the draw reproducible.
pub fn sample_line_ids(ids: &[LineId], n: usize, seed: Option<u64>) -> Vec<LineId> {
    if n >= ids.len() {
        return ids.to_vec();
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut picked = rand::seq::index::sample(&mut rng, ids.len(), n).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|idx| ids[idx].clone()).collect()
}

/// Keep the records whose id is in `ids`, preserving input order
pub fn filter_records(records: Vec<LogRecord>, ids: &[LineId]) -> Vec<LogRecord> {
    let wanted: FxHashSet<String> = ids.iter().map(LineId::join_key).collect();
    records
        .into_iter()
        .filter(|r| wanted.contains(&r.line_id.join_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordinals(range: std::ops::RangeInclusive<usize>) -> Vec<LineId> {
        range.map(LineId::from_ordinal).collect()
    }

    #[test]
    fn test_sample_is_sorted_distinct_and_in_range() {
        let ids = sample_line_ids(&ordinals(1..=2000), 50, Some(42));
        assert_eq!(ids.len(), 50);

        let picked: Vec<usize> = ids.iter().filter_map(LineId::ordinal).collect();
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        assert!(picked.iter().all(|&i| (1..=2000).contains(&i)));
    }

    #[test]
    fn test_seed_is_reproducible() {
        let all = ordinals(1..=500);
        assert_eq!(sample_line_ids(&all, 10, Some(7)), sample_line_ids(&all, 10, Some(7)));
    }

    #[test]
    fn test_oversized_sample_takes_everything() {
        let all = ordinals(1..=3);
        assert_eq!(sample_line_ids(&all, 50, None), all);
        assert!(sample_line_ids(&[], 5, None).is_empty());
    }

    #[test]
    fn test_sample_draws_from_actual_ids() {
        let ids: Vec<LineId> = ["10", "20", "30", "40", "A7"]
            .into_iter()
            .map(LineId::from_cell)
            .collect();
        let picked = sample_line_ids(&ids, 2, Some(1));

        assert_eq!(picked.len(), 2);
        assert!(picked.iter().all(|id| ids.contains(id)));
        assert_ne!(picked[0], picked[1]);

        let records: Vec<LogRecord> = ids
            .iter()
            .map(|id| LogRecord::unknown(id.clone(), "x"))
            .collect();
        assert_eq!(filter_records(records, &picked).len(), 2);
    }

    #[test]
    fn test_filter_records_keeps_order() {
        let records: Vec<LogRecord> = (1..=5)
            .map(|i| LogRecord::unknown(LineId::from_ordinal(i), &format!("line {}", i)))
            .collect();
        let kept = filter_records(records, &[LineId::from_ordinal(4), LineId::from_ordinal(2)]);
        let ids: Vec<_> = kept.iter().map(|r| r.line_id.to_string()).collect();
        assert_eq!(ids, vec!["2", "4"]);
    }
}
