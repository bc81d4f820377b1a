//! Columnar, name-addressed trajectory table.
//!
//! Float columns hold joint coordinates; a missing value is NaN in memory and
//! an empty cell on disk. The only integer column is `frames`.

use jtrack_models::{
    raw_columns, FrameLandmarks, JointPosition, Trajectory, JOINT_COUNT,
};

use crate::error::{MediaError, MediaResult};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Float(Vec<f64>),
    Index(Vec<u64>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Float(v) => v.len(),
            ColumnData::Index(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn float(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Float(values),
        }
    }

    pub fn index(name: impl Into<String>, values: Vec<u64>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Index(values),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_float(&self) -> Option<&[f64]> {
        match &self.data {
            ColumnData::Float(v) => Some(v),
            ColumnData::Index(_) => None,
        }
    }
}

/// Ordered set of equally long, uniquely named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Empty table with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(columns: Vec<Column>) -> MediaResult<Self> {
        let mut table = Self::new();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    /// Append a column. Its length must match the table's row count unless
    /// the table has no columns yet.
    pub fn push_column(&mut self, column: Column) -> MediaResult<()> {
        if self.has_column(&column.name) {
            return Err(MediaError::schema(format!("duplicate column '{}'", column.name)));
        }
        if self.columns.is_empty() {
            self.rows = column.len();
        } else if column.len() != self.rows {
            return Err(MediaError::schema(format!(
                "column '{}' has {} rows, table has {}",
                column.name,
                column.len(),
                self.rows
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Float column by name.
    pub fn float(&self, name: &str) -> Option<&[f64]> {
        self.column(name).and_then(Column::as_float)
    }

    fn required_float(&self, name: &str) -> MediaResult<&[f64]> {
        match self.column(name) {
            Some(column) => column
                .as_float()
                .ok_or_else(|| MediaError::schema(format!("column '{}' is not numeric", name))),
            None => Err(MediaError::schema(format!("missing column '{}'", name))),
        }
    }

    /// Check that all 99 raw coordinate columns are present.
    pub fn validate_raw(&self) -> MediaResult<()> {
        for name in raw_columns() {
            self.required_float(&name)?;
        }
        Ok(())
    }

    /// Raw table for a trajectory: 99 columns in joint order, one row per
    /// record. Missing records become all-NaN rows.
    pub fn from_trajectory(trajectory: &Trajectory) -> Self {
        let names = raw_columns();
        let mut data: Vec<Vec<f64>> = vec![Vec::with_capacity(trajectory.len()); names.len()];

        for row in trajectory.rows() {
            match row {
                Some(landmarks) => {
                    for (column, value) in data.iter_mut().zip(landmarks.values()) {
                        column.push(value);
                    }
                }
                None => data.iter_mut().for_each(|column| column.push(f64::NAN)),
            }
        }

        Self {
            columns: names
                .into_iter()
                .zip(data)
                .map(|(name, values)| Column::float(name, values))
                .collect(),
            rows: trajectory.len(),
        }
    }

    /// Rebind raw columns by name into a trajectory. A row where every raw
    /// value is missing becomes a missing record.
    pub fn to_trajectory(&self) -> MediaResult<Trajectory> {
        let names = raw_columns();
        let columns = names
            .iter()
            .map(|name| self.required_float(name))
            .collect::<MediaResult<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(self.rows);
        for r in 0..self.rows {
            if columns.iter().all(|c| c[r].is_nan()) {
                rows.push(None);
                continue;
            }
            let positions: Vec<JointPosition> = (0..JOINT_COUNT)
                .map(|j| JointPosition::new(columns[3 * j][r], columns[3 * j + 1][r], columns[3 * j + 2][r]))
                .collect();
            rows.push(Some(FrameLandmarks::from_slice(&positions)?));
        }
        Ok(Trajectory::from_rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jtrack_models::RAW_COLUMN_COUNT;

    fn frame(seed: f64) -> FrameLandmarks {
        let positions: Vec<JointPosition> = (0..JOINT_COUNT)
            .map(|i| JointPosition::new(seed + i as f64, seed * 2.0 + i as f64, -0.01 * i as f64))
            .collect();
        FrameLandmarks::from_slice(&positions).unwrap()
    }

    #[test]
    fn test_from_trajectory_shape() {
        let mut trajectory = Trajectory::new();
        trajectory.push_detected(frame(1.0));
        trajectory.push_missing();

        let table = Table::from_trajectory(&trajectory);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns().len(), RAW_COLUMN_COUNT);
        assert_eq!(table.column_names().next(), Some("nose_x"));
        assert_eq!(table.float("nose_y").unwrap()[0], 2.0);
        assert!(table.float("nose_y").unwrap()[1].is_nan());
    }

    #[test]
    fn test_trajectory_rebinding() {
        let trajectory = Trajectory::from_rows(vec![Some(frame(3.0)), None, Some(frame(4.5))]);
        let back = Table::from_trajectory(&trajectory).to_trajectory().unwrap();
        assert_eq!(back, trajectory);
    }

    #[test]
    fn test_empty_trajectory_has_header() {
        let table = Table::from_trajectory(&Trajectory::new());
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.columns().len(), RAW_COLUMN_COUNT);
        table.validate_raw().unwrap();
    }

    #[test]
    fn test_push_column_checks_length() {
        let mut table = Table::with_columns(vec![Column::float("a", vec![1.0, 2.0])]).unwrap();
        assert!(table.push_column(Column::float("b", vec![1.0])).is_err());
        assert!(table.push_column(Column::float("a", vec![1.0, 2.0])).is_err());
        table.push_column(Column::index("frames", vec![1, 2])).unwrap();
        assert!(table.float("frames").is_none());
        assert!(table.has_column("frames"));
    }

    #[test]
    fn test_missing_raw_column_is_schema_error() {
        let table = Table::with_columns(vec![Column::float("nose_x", vec![])]).unwrap();
        let err = table.validate_raw().unwrap_err();
        assert!(matches!(err, MediaError::Schema(_)));
    }
}
