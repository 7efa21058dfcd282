#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Str,
}

impl ColumnType {
    /// Narrowest type able to hold a single field
    pub fn of_field(field: &[u8]) -> Self {
        if atoi_simd::parse::<i64>(field).is_ok() {
            ColumnType::Int64
        } else if fast_float::parse::<f64, _>(field).is_ok() {
            ColumnType::Float64
        } else {
            ColumnType::Str
        }
    }

    /// Smallest type able to hold values of both `self` and `other`
    pub fn widen(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (ColumnType::Str, _) | (_, ColumnType::Str) => ColumnType::Str,
            (ColumnType::Float64, _) | (_, ColumnType::Float64) => ColumnType::Float64,
            (ColumnType::Int64, ColumnType::Int64) => ColumnType::Int64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int64 => "int",
            ColumnType::Float64 => "float",
            ColumnType::Str => "string",
        }
    }
}

/// Column data, stored as one chunk per parse batch
#[derive(Debug, Clone)]
pub enum Column {
    Int64(Vec<Vec<i64>>),
    Float64(Vec<Vec<f64>>),
    Str(Vec<Vec<(usize, usize)>>), // Absolute offsets into mmap
}

impl Column {
    pub fn new(col_type: ColumnType) -> Self {
        match col_type {
            ColumnType::Int64 => Column::Int64(Vec::new()),
            ColumnType::Float64 => Column::Float64(Vec::new()),
            ColumnType::Str => Column::Str(Vec::new()),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Int64(_) => ColumnType::Int64,
            Column::Float64(_) => ColumnType::Float64,
            Column::Str(_) => ColumnType::Str,
        }
    }

    /// Numeric iteration; `Int64` columns are widened
    pub fn iter_f64(&self) -> Option<Box<dyn Iterator<Item = f64> + '_>> {
        match self {
            Column::Int64(chunks) => Some(Box::new(
                chunks.iter().flat_map(|chunk| chunk.iter().map(|&v| v as f64)),
            )),
            Column::Float64(chunks) => {
                Some(Box::new(chunks.iter().flat_map(|chunk| chunk.iter().copied())))
            }
            Column::Str(_) => None,
        }
    }

    pub fn iter_str(&self) -> Option<impl Iterator<Item = (usize, usize)> + '_> {
        match self {
            Column::Str(chunks) => Some(chunks.iter().flat_map(|chunk| chunk.iter().copied())),
            _ => None,
        }
    }

    // Random access
    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        match self {
            Column::Int64(chunks) => locate(chunks, idx).copied(),
            _ => None,
        }
    }

    pub fn get_f64(&self, idx: usize) -> Option<f64> {
        match self {
            Column::Int64(chunks) => locate(chunks, idx).map(|&v| v as f64),
            Column::Float64(chunks) => locate(chunks, idx).copied(),
            Column::Str(_) => None,
        }
    }

    pub fn get_str_offsets(&self, idx: usize) -> Option<(usize, usize)> {
        match self {
            Column::Str(chunks) => locate(chunks, idx).copied(),
            _ => None,
        }
    }

    pub fn total_len(&self) -> usize {
        match self {
            Column::Int64(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::Float64(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::Str(chunks) => chunks.iter().map(|c| c.len()).sum(),
        }
    }
}

fn locate<T>(chunks: &[Vec<T>], idx: usize) -> Option<&T> {
    let mut remaining = idx;
    for chunk in chunks {
        if remaining < chunk.len() {
            return chunk.get(remaining);
        }
        remaining -= chunk.len();
    }
    None
}
