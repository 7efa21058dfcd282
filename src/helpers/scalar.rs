use crate::processor::{AggregateOp, AggregateResult, FilterPredicate};

/// Reduces integer values; `None` for an empty slice.
pub fn aggregate_i64(values: &[i64], op: AggregateOp) -> Option<AggregateResult> {
    let first = *values.first()?;
    let result = match op {
        AggregateOp::Sum => AggregateResult::Int(values.iter().sum()),
        AggregateOp::Count => AggregateResult::Int(values.len() as i64),
        AggregateOp::Avg => {
            let sum: i128 = values.iter().map(|&v| v as i128).sum();
            AggregateResult::Float(sum as f64 / values.len() as f64)
        }
        AggregateOp::Min => AggregateResult::Int(values.iter().copied().fold(first, i64::min)),
        AggregateOp::Max => AggregateResult::Int(values.iter().copied().fold(first, i64::max)),
    };
    Some(result)
}

/// Reduces float values; `None` for an empty slice.
pub fn aggregate_f64(values: &[f64], op: AggregateOp) -> Option<AggregateResult> {
    let first = *values.first()?;
    let result = match op {
        AggregateOp::Sum => AggregateResult::Float(values.iter().sum()),
        AggregateOp::Count => AggregateResult::Int(values.len() as i64),
        AggregateOp::Avg => {
            AggregateResult::Float(values.iter().sum::<f64>() / values.len() as f64)
        }
        AggregateOp::Min => AggregateResult::Float(values.iter().copied().fold(first, f64::min)),
        AggregateOp::Max => AggregateResult::Float(values.iter().copied().fold(first, f64::max)),
    };
    Some(result)
}

/// Row indices whose value satisfies a numeric predicate.
///
/// Returns `None` when a predicate operand is not numeric.
pub fn filter_numeric(
    values: impl Iterator<Item = f64>,
    predicate: &FilterPredicate,
) -> Option<Vec<usize>> {
    let test: Box<dyn Fn(f64) -> bool> = match predicate {
        FilterPredicate::Equals(v) => {
            let target = v.as_f64()?;
            Box::new(move |x| x == target)
        }
        FilterPredicate::GreaterThan(v) => {
            let target = v.as_f64()?;
            Box::new(move |x| x > target)
        }
        FilterPredicate::LessThan(v) => {
            let target = v.as_f64()?;
            Box::new(move |x| x < target)
        }
        FilterPredicate::Between(lo, hi) => {
            let (lo, hi) = (lo.as_f64()?, hi.as_f64()?);
            Box::new(move |x| x >= lo && x <= hi)
        }
    };

    Some(
        values
            .enumerate()
            .filter_map(|(i, x)| test(x).then_some(i))
            .collect(),
    )
}
