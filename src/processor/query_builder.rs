use crate::processor::columnar_processor::ColumnarProcessor;
use crate::processor::{AggregateOp, AggregateResult, FilterPredicate, ProcessorError, Value};
use std::collections::HashMap;

/// Query results
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Single aggregation result
    Aggregate(AggregateResult),
    /// Multiple aggregation results, keyed by measure name
    MultiAggregate(HashMap<String, AggregateResult>),
    /// One row per distinct group key
    MultiDimensional(MultiDimensionalResult),
}

/// Represents a multi-dimensional aggregation result
#[derive(Debug, Clone, PartialEq)]
pub struct MultiDimensionalResult {
    /// The dimensions used for grouping (e.g., ["name", "rs", "threads"])
    pub dimensions: Vec<String>,
    /// The aggregations computed (e.g., ["iterations", "exp_time_in_sec"])
    pub measures: Vec<String>,
    /// Vec of (dimension_values, measure_values), sorted by dimension values.
    /// dimension_values[i] corresponds to dimensions[i]
    pub data: Vec<(Vec<Value>, HashMap<String, AggregateResult>)>,
}

/// Query builder supporting filters, multi-column grouping and aliased aggregations
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    processor: &'a ColumnarProcessor,
    filters: Vec<(String, FilterPredicate)>,
    group_by_columns: Vec<String>,
    aggregations: Vec<(String, AggregateOp, Option<String>)>, // (column, op, alias)
}

impl<'a> QueryBuilder<'a> {
    pub fn new(processor: &'a ColumnarProcessor) -> Self {
        Self {
            processor,
            filters: Vec::new(),
            group_by_columns: Vec::new(),
            aggregations: Vec::new(),
        }
    }

    /// Add a filter condition
    pub fn filter(mut self, column: &str, predicate: FilterPredicate) -> Self {
        self.filters.push((column.to_string(), predicate));
        self
    }

    /// Add a single group-by column
    pub fn group_by(mut self, column: &str) -> Self {
        self.group_by_columns.push(column.to_string());
        self
    }

    /// Add multiple group-by columns
    pub fn group_by_multi(mut self, columns: &[&str]) -> Self {
        self.group_by_columns
            .extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Add an aggregation named `<column>_<op>`
    pub fn aggregate(mut self, column: &str, op: AggregateOp) -> Self {
        self.aggregations.push((column.to_string(), op, None));
        self
    }

    /// Add an aggregation with a custom alias
    pub fn aggregate_as(mut self, column: &str, op: AggregateOp, alias: &str) -> Self {
        self.aggregations
            .push((column.to_string(), op, Some(alias.to_string())));
        self
    }

    /// Execute the query
    pub fn execute(self) -> Result<QueryResult, ProcessorError> {
        let rows = self.apply_filters()?;

        match (self.group_by_columns.len(), self.aggregations.len()) {
            (0, 1) => {
                let (col, op, _) = &self.aggregations[0];
                let result = self.processor.aggregate_rows(col, *op, &rows)?;
                Ok(QueryResult::Aggregate(result))
            }

            (0, agg_count) if agg_count > 1 => {
                let mut results = HashMap::new();
                for (col, op, alias) in &self.aggregations {
                    let result = self.processor.aggregate_rows(col, *op, &rows)?;
                    results.insert(measure_name(col, *op, alias), result);
                }
                Ok(QueryResult::MultiAggregate(results))
            }

            (_, agg_count) if agg_count >= 1 => {
                let result = self.execute_multi_dimensional(rows)?;
                Ok(QueryResult::MultiDimensional(result))
            }

            _ => Err(ProcessorError::Parse(
                "Query needs at least one aggregation".into(),
            )),
        }
    }

    /// Apply all filters and return the matching row indices, ascending
    fn apply_filters(&self) -> Result<Vec<usize>, ProcessorError> {
        let mut filtered_rows: Option<Vec<usize>> = None;

        for (column, predicate) in &self.filters {
            let current = self.processor.filter(column, predicate)?;
            filtered_rows = Some(match filtered_rows {
                None => current,
                Some(existing) => intersect_sorted_vecs(existing, current),
            });
        }

        Ok(filtered_rows.unwrap_or_else(|| (0..self.processor.row_count()).collect()))
    }

    fn execute_multi_dimensional(
        &self,
        rows: Vec<usize>,
    ) -> Result<MultiDimensionalResult, ProcessorError> {
        // Fail early on unknown dimensions, even when no row survives the filters
        for col in &self.group_by_columns {
            self.processor.get_col(col)?;
        }

        let mut groups: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
        for row_idx in rows {
            let key = self
                .group_by_columns
                .iter()
                .map(|col| self.processor.value(col, row_idx))
                .collect::<Result<Vec<Value>, _>>()?;
            groups.entry(key).or_default().push(row_idx);
        }

        let mut data = Vec::with_capacity(groups.len());
        for (group_key, group_rows) in groups {
            let mut measures = HashMap::new();
            for (agg_col, agg_op, alias) in &self.aggregations {
                let result = self.processor.aggregate_rows(agg_col, *agg_op, &group_rows)?;
                measures.insert(measure_name(agg_col, *agg_op, alias), result);
            }
            data.push((group_key, measures));
        }
        data.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(MultiDimensionalResult {
            dimensions: self.group_by_columns.clone(),
            measures: self
                .aggregations
                .iter()
                .map(|(col, op, alias)| measure_name(col, *op, alias))
                .collect(),
            data,
        })
    }
}

fn measure_name(column: &str, op: AggregateOp, alias: &Option<String>) -> String {
    alias
        .clone()
        .unwrap_or_else(|| format!("{}_{}", column, format!("{:?}", op).to_lowercase()))
}

/// Helper function to intersect sorted vectors
fn intersect_sorted_vecs(a: Vec<usize>, b: Vec<usize>) -> Vec<usize> {
    let mut result = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }

    result
}

impl ColumnarProcessor {
    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }
}
