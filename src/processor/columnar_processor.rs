use log::{debug, warn};
use memchr::{memchr, memchr_iter, memchr2_iter};
use memmap2::Mmap;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::{
    borrow::Cow,
    collections::HashSet,
    fs::File,
    path::Path,
    str,
};

use crate::{
    helpers::scalar::{aggregate_f64, aggregate_i64, filter_numeric},
    processor::{
        AggregateOp, AggregateResult, FilterPredicate, ParseError, ParseSummary, ProcessorError,
        Value,
        column::{Column, ColumnType},
    },
};

/// Per-chunk output of the parse pass, merged into [`Column`] chunks in file order
struct BatchResult {
    int64_batches: Vec<Vec<i64>>,
    float64_batches: Vec<Vec<f64>>,
    str_batches: Vec<Vec<(usize, usize)>>,
    row_count: usize,
    errors: Vec<ParseError>,
}

/// Per-chunk output of the schema pass
struct ChunkShape {
    line_count: usize,
    types: Vec<Option<ColumnType>>,
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Clone, Copy)]
enum Cell {
    Int(i64),
    Float(f64),
    Str(usize, usize),
}

/// Columnar view over a memory-mapped CSV file
///
/// # Examples
///
/// ```no_run
/// # use throughput_report::processor::{AggregateOp, columnar_processor::ColumnarProcessor};
/// let mut processor = ColumnarProcessor::new();
/// processor.load_csv("results.csv".as_ref()).unwrap();
/// let total = processor.aggregate("iterations", AggregateOp::Sum).unwrap();
/// println!("Total iterations: {:?}", total);
/// ```
#[derive(Debug, Default)]
pub struct ColumnarProcessor {
    mmap: Option<Mmap>,   // owns the CSV bytes
    columns: Vec<Column>, // dynamic columns by name
    row_count: usize,
    headers: Vec<String>,
}

impl ColumnarProcessor {
    /// Create an empty processor
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a CSV file using memory mapping
    ///
    /// The first non-blank line is the header; a leading UTF-8 BOM is dropped.
    /// Blank lines are skipped and a trailing `\r` is ignored. Fields may be
    /// wrapped in double quotes, which protect commas, with `""` standing for
    /// a literal quote. Quoted fields cannot span lines. Column types are inferred from every data
    /// row: `Int64` if all fields are integers, `Float64` if all are numbers,
    /// `Str` otherwise.
    ///
    /// # Errors
    /// Returns a [`ProcessorError`] if:
    /// - File cannot be opened or mapped
    /// - There is no header or no data row
    ///
    /// Rows whose field count differs from the header are skipped and listed
    /// in [`ParseSummary::errors`].
    pub fn load_csv(&mut self, path: &Path) -> Result<ParseSummary, ProcessorError> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(ProcessorError::Parse(format!(
                "Missing header line in {}",
                path.display()
            )));
        }
        // SAFETY: the map is read-only and the file is not modified while loaded
        let mmap = unsafe { Mmap::map(&file)? };
        let buf: &[u8] = &mmap[..];

        // Parse header
        let bom = if buf.starts_with(UTF8_BOM) { UTF8_BOM.len() } else { 0 };
        let (header_offset, header_line) = split_lines(&buf[bom..])
            .find(|(_, line)| !line.is_empty())
            .map(|(offset, line)| (offset + bom, line))
            .ok_or_else(|| {
                ProcessorError::Parse(format!("Missing header line in {}", path.display()))
            })?;
        let mut header_fields = Vec::new();
        split_fields(header_line, &mut header_fields);
        let headers = header_fields
            .iter()
            .map(|field| -> Result<String, ProcessorError> {
                Ok(str::from_utf8(&unescape_quotes(field))?.to_string())
            })
            .collect::<Result<Vec<String>, _>>()?;
        let header_line_no = count_lines(&buf[..header_offset]) + 1;

        let data_start = (header_offset + header_line.len() + 1).min(buf.len());
        let data_start = match buf.get(data_start - 1) {
            // header ended with "\r\n"
            Some(b'\r') => (data_start + 1).min(buf.len()),
            _ => data_start,
        };
        let data = &buf[data_start..];

        // Find chunk boundaries (split by newlines)
        let num_threads = rayon::current_num_threads();
        let chunks = Self::find_chunk_boundaries(data, num_threads);

        // First pass: per-chunk types, widened across chunks
        let shapes: Vec<ChunkShape> = chunks
            .par_iter()
            .map(|(start, end)| Self::infer_chunk_schema(&data[*start..*end], headers.len()))
            .collect();

        let mut schema: Vec<Option<ColumnType>> = vec![None; headers.len()];
        for shape in &shapes {
            for (merged, found) in schema.iter_mut().zip(&shape.types) {
                if let Some(found) = found {
                    *merged = Some(merged.map_or(*found, |t| t.widen(*found)));
                }
            }
        }
        let schema: Vec<ColumnType> = schema
            .into_iter()
            .map(|t| t.unwrap_or(ColumnType::Str))
            .collect();

        // Line number of the first line in each chunk
        let mut first_lines = Vec::with_capacity(shapes.len());
        let mut next_line = header_line_no + 1;
        for shape in &shapes {
            first_lines.push(next_line);
            next_line += shape.line_count;
        }

        // Second pass: parse chunks in parallel
        let jobs: Vec<(usize, usize, usize)> = chunks
            .iter()
            .zip(&first_lines)
            .map(|(&(start, end), &line)| (start, end, line))
            .collect();
        let batch_results: Vec<BatchResult> = jobs
            .par_iter()
            .map(|&(start, end, first_line)| {
                Self::parse_chunk(
                    &data[start..end],
                    &schema,
                    &headers,
                    data_start + start, // Absolute offset in file
                    first_line,
                )
            })
            .collect();

        // Merge batch results into chunked columns
        let mut columns: Vec<Column> = schema.iter().map(|t| Column::new(*t)).collect();
        let mut total_rows = 0;
        let mut all_errors = Vec::new();

        for mut batch in batch_results {
            total_rows += batch.row_count;
            all_errors.append(&mut batch.errors);

            for (col_idx, column) in columns.iter_mut().enumerate() {
                match column {
                    Column::Int64(chunks) => {
                        chunks.push(std::mem::take(&mut batch.int64_batches[col_idx]))
                    }
                    Column::Float64(chunks) => {
                        chunks.push(std::mem::take(&mut batch.float64_batches[col_idx]))
                    }
                    Column::Str(chunks) => {
                        chunks.push(std::mem::take(&mut batch.str_batches[col_idx]))
                    }
                }
            }
        }

        if total_rows == 0 {
            return Err(ProcessorError::EmptyInput(path.display().to_string()));
        }

        debug!(
            "loaded {} rows x {} columns from {} ({} chunks, {} skipped lines)",
            total_rows,
            headers.len(),
            path.display(),
            chunks.len(),
            all_errors.len()
        );
        for err in &all_errors {
            warn!("skipped {}", err);
        }

        self.mmap = Some(mmap);
        self.columns = columns;
        self.headers = headers;
        self.row_count = total_rows;

        Ok(ParseSummary {
            rows_processed: total_rows,
            errors: all_errors,
        })
    }

    fn find_chunk_boundaries(data: &[u8], num_chunks: usize) -> Vec<(usize, usize)> {
        if data.is_empty() {
            return vec![];
        }

        let num_chunks = num_chunks.max(1);
        let chunk_size = data.len() / num_chunks;
        let mut boundaries = Vec::with_capacity(num_chunks);
        let mut start = 0;

        for i in 0..num_chunks - 1 {
            let mut end = ((i + 1) * chunk_size).max(start);

            // Find next newline
            match memchr(b'\n', &data[end..]) {
                Some(pos) => end += pos + 1, // Include the newline
                None => end = data.len(),
            }

            if start < end {
                boundaries.push((start, end));
            }
            start = end;
        }

        // Last chunk gets everything remaining
        if start < data.len() {
            boundaries.push((start, data.len()));
        }

        boundaries
    }

    fn infer_chunk_schema(chunk: &[u8], num_cols: usize) -> ChunkShape {
        let mut types: Vec<Option<ColumnType>> = vec![None; num_cols];
        let mut fields = Vec::with_capacity(num_cols);
        let mut line_count = 0;

        for (_, line) in split_lines(chunk) {
            line_count += 1;
            if line.is_empty() {
                continue;
            }

            split_fields(line, &mut fields);
            if fields.len() != num_cols {
                continue;
            }

            for (slot, field) in types.iter_mut().zip(&fields) {
                if *slot == Some(ColumnType::Str) {
                    continue;
                }
                let found = ColumnType::of_field(field);
                *slot = Some(slot.map_or(found, |t| t.widen(found)));
            }
        }

        ChunkShape { line_count, types }
    }

    fn parse_chunk(
        chunk: &[u8],
        schema: &[ColumnType],
        headers: &[String],
        chunk_offset: usize, // Absolute offset of this chunk in the file
        first_line: usize,
    ) -> BatchResult {
        let num_cols = schema.len();
        let mut int64_cols: Vec<Vec<i64>> = vec![Vec::new(); num_cols];
        let mut float64_cols: Vec<Vec<f64>> = vec![Vec::new(); num_cols];
        let mut str_cols: Vec<Vec<(usize, usize)>> = vec![Vec::new(); num_cols];

        let mut errors = Vec::new();
        let mut row_count = 0;
        let mut fields = Vec::with_capacity(num_cols);
        let mut cells = Vec::with_capacity(num_cols);

        'lines: for (line_idx, (line_offset, line)) in split_lines(chunk).enumerate() {
            if line.is_empty() {
                continue;
            }
            let line_no = first_line + line_idx;

            split_fields(line, &mut fields);
            if fields.len() != num_cols {
                errors.push(ParseError {
                    line: line_no,
                    column: String::new(),
                    value: format!("Expected {} fields, got {}", num_cols, fields.len()),
                });
                continue;
            }

            // A row is committed only when every field parses
            cells.clear();
            for (col_idx, field) in fields.iter().enumerate() {
                let cell = match schema[col_idx] {
                    ColumnType::Int64 => atoi_simd::parse::<i64>(field).ok().map(Cell::Int),
                    ColumnType::Float64 => {
                        fast_float::parse::<f64, _>(field).ok().map(Cell::Float)
                    }
                    ColumnType::Str => {
                        let start = chunk_offset + line_offset + field_start(line, field);
                        Some(Cell::Str(start, start + field.len()))
                    }
                };
                match cell {
                    Some(cell) => cells.push(cell),
                    None => {
                        errors.push(ParseError {
                            line: line_no,
                            column: headers[col_idx].clone(),
                            value: String::from_utf8_lossy(field).to_string(),
                        });
                        continue 'lines;
                    }
                }
            }

            for (col_idx, cell) in cells.iter().enumerate() {
                match *cell {
                    Cell::Int(v) => int64_cols[col_idx].push(v),
                    Cell::Float(v) => float64_cols[col_idx].push(v),
                    Cell::Str(s, e) => str_cols[col_idx].push((s, e)),
                }
            }
            row_count += 1;
        }

        BatchResult {
            int64_batches: int64_cols,
            float64_batches: float64_cols,
            str_batches: str_cols,
            row_count,
            errors,
        }
    }

    /// Helper to get a string value from the mmap using offsets; `""` in a
    /// quoted field comes back as `"`
    pub fn get_string(&self, start: usize, end: usize) -> Result<Cow<'_, str>, ProcessorError> {
        match unescape_quotes(self.slice_bytes(start, end)?) {
            Cow::Borrowed(bytes) => Ok(Cow::Borrowed(str::from_utf8(bytes)?)),
            Cow::Owned(bytes) => Ok(Cow::Owned(
                String::from_utf8(bytes).map_err(|e| e.utf8_error())?,
            )),
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    /// Helper to slice mmap and return bytes for given offset
    pub fn slice_bytes(&self, start: usize, end: usize) -> Result<&[u8], ProcessorError> {
        let mmap = self.mmap.as_ref().ok_or(ProcessorError::MmapNotLoaded)?;

        if end > mmap.len() || start > end {
            return Err(ProcessorError::Parse("Invalid byte range".into()));
        }

        Ok(&mmap[start..end])
    }

    pub fn get_col(&self, col_name: &str) -> Result<&Column, ProcessorError> {
        let col_pos = self
            .headers
            .iter()
            .position(|cn| cn == col_name)
            .ok_or_else(|| ProcessorError::MissingColumn(col_name.to_string()))?;

        self.columns
            .get(col_pos)
            .ok_or_else(|| ProcessorError::MissingColumn(col_name.to_string()))
    }

    /// Fails on the first of `names` that is not a column
    pub fn require_columns(&self, names: &[&str]) -> Result<(), ProcessorError> {
        for name in names {
            self.get_col(name)?;
        }
        Ok(())
    }

    /// Owned value of one cell
    pub fn value(&self, column: &str, row: usize) -> Result<Value, ProcessorError> {
        let col = self.get_col(column)?;
        let out_of_range =
            || ProcessorError::Parse(format!("Row {} out of range for column {}", row, column));

        match col {
            Column::Int64(_) => col.get_i64(row).map(Value::Int).ok_or_else(out_of_range),
            Column::Float64(_) => col.get_f64(row).map(Value::Float).ok_or_else(out_of_range),
            Column::Str(_) => {
                let (start, end) = col.get_str_offsets(row).ok_or_else(out_of_range)?;
                Ok(Value::Str(self.get_string(start, end)?.into_owned()))
            }
        }
    }

    /// Distinct values of a column in order of first appearance
    pub fn distinct_values(&self, column: &str) -> Result<Vec<Value>, ProcessorError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in 0..self.row_count {
            let value = self.value(column, row)?;
            if seen.insert(value.clone()) {
                out.push(value);
            }
        }
        Ok(out)
    }

    /// Row indices matching a predicate
    ///
    /// Numeric columns accept every predicate with numeric operands; string
    /// columns accept `Equals` with a string operand.
    pub fn filter(
        &self,
        column: &str,
        predicate: &FilterPredicate,
    ) -> Result<Vec<usize>, ProcessorError> {
        let col = self.get_col(column)?;

        match (col, predicate) {
            (Column::Str(_), FilterPredicate::Equals(Value::Str(target))) => {
                let mut out = Vec::new();
                for (i, (s, e)) in col.iter_str().into_iter().flatten().enumerate() {
                    if &*unescape_quotes(self.slice_bytes(s, e)?) == target.as_bytes() {
                        out.push(i);
                    }
                }
                Ok(out)
            }
            (Column::Int64(_) | Column::Float64(_), _) => col
                .iter_f64()
                .and_then(|values| filter_numeric(values, predicate))
                .ok_or_else(|| {
                    ProcessorError::Parse(format!(
                        "Predicate {:?} not supported on numeric column {}",
                        predicate, column
                    ))
                }),
            _ => Err(ProcessorError::Parse(format!(
                "Predicate {:?} not supported on string column {}",
                predicate, column
            ))),
        }
    }

    /// Aggregates a whole numeric column
    pub fn aggregate(
        &self,
        column: &str,
        op: AggregateOp,
    ) -> Result<AggregateResult, ProcessorError> {
        let rows: Vec<usize> = (0..self.row_count).collect();
        self.aggregate_rows(column, op, &rows)
    }

    /// Aggregates the given rows of a numeric column
    pub fn aggregate_rows(
        &self,
        column: &str,
        op: AggregateOp,
        rows: &[usize],
    ) -> Result<AggregateResult, ProcessorError> {
        let col = self.get_col(column)?;
        let missing = || ProcessorError::Parse(format!("Cannot aggregate empty rows of {}", column));

        match col {
            Column::Int64(_) => {
                let values: Vec<i64> = rows.iter().filter_map(|&i| col.get_i64(i)).collect();
                aggregate_i64(&values, op).ok_or_else(missing)
            }
            Column::Float64(_) => {
                let values: Vec<f64> = rows.iter().filter_map(|&i| col.get_f64(i)).collect();
                aggregate_f64(&values, op).ok_or_else(missing)
            }
            Column::Str(_) => Err(ProcessorError::TypeMismatch {
                column: column.to_string(),
                expected: "number",
                found: ColumnType::Str.name(),
            }),
        }
    }
}

/// Lines of `chunk` with their offset; the trailing `\r` is dropped
fn split_lines(chunk: &[u8]) -> impl Iterator<Item = (usize, &[u8])> + '_ {
    let mut start = 0;
    memchr_iter(b'\n', chunk)
        .chain(std::iter::once(chunk.len()))
        .filter_map(move |end| {
            let line_start = start;
            start = end + 1;
            if end == chunk.len() && line_start >= end {
                return None;
            }
            let line = &chunk[line_start..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            Some((line_start, line))
        })
}

fn count_lines(bytes: &[u8]) -> usize {
    memchr_iter(b'\n', bytes).count()
}

/// Splits a line at commas outside double quotes.
///
/// Enclosing quotes are removed from each field; escaped `""` pairs are left
/// in place for [`unescape_quotes`], so every field stays a slice of `line`.
fn split_fields<'a>(line: &'a [u8], fields: &mut Vec<&'a [u8]>) {
    fields.clear();
    let mut field_start = 0;
    let mut in_quotes = false;
    for pos in memchr2_iter(b',', b'"', line) {
        if line[pos] == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            fields.push(unquote(&line[field_start..pos]));
            field_start = pos + 1;
        }
    }
    fields.push(unquote(&line[field_start..]));
}

fn unquote(field: &[u8]) -> &[u8] {
    match field {
        [b'"', inner @ .., b'"'] => inner,
        _ => field,
    }
}

/// Collapses `""` to `"`; borrows when there is nothing to collapse
fn unescape_quotes(field: &[u8]) -> Cow<'_, [u8]> {
    if memchr(b'"', field).is_none() {
        return Cow::Borrowed(field);
    }
    let mut out = Vec::with_capacity(field.len());
    let mut rest = field;
    while let Some(pos) = memchr(b'"', rest) {
        out.extend_from_slice(&rest[..=pos]);
        rest = match rest.get(pos + 1) {
            Some(b'"') => &rest[pos + 2..],
            _ => &rest[pos + 1..],
        };
    }
    out.extend_from_slice(rest);
    Cow::Owned(out)
}

fn field_start(line: &[u8], field: &[u8]) -> usize {
    field.as_ptr() as usize - line.as_ptr() as usize
}
