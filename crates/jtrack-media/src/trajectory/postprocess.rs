//! Trajectory post-processing: vertical re-origin, per-channel zero-phase
//! filtering and the 1-based `frames` column.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use jtrack_models::{filtered_column_name, is_vertical_column, raw_columns, FRAMES_COLUMN};

use super::serializer::{deserialize_table, write_table};
use super::filter::{ButterworthLowPass, FilterConfig};
use super::table::{Column, Table};
use crate::error::{MediaError, MediaResult};

/// What to do with a trajectory too short for the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortTrajectoryPolicy {
    /// Copy raw values into the filtered columns and log a warning.
    #[default]
    Passthrough,
    /// Fail with `TrajectoryTooShort`.
    Fail,
}

impl ShortTrajectoryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShortTrajectoryPolicy::Passthrough => "passthrough",
            ShortTrajectoryPolicy::Fail => "fail",
        }
    }
}

impl fmt::Display for ShortTrajectoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShortTrajectoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passthrough" | "pass" => Ok(ShortTrajectoryPolicy::Passthrough),
            "fail" | "strict" => Ok(ShortTrajectoryPolicy::Fail),
            other => Err(format!("unknown short-trajectory policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PostProcessOptions {
    pub filter: FilterConfig,
    pub short_policy: ShortTrajectoryPolicy,
}

/// Move a vertical coordinate between top-left and bottom-left origin.
/// Applying it twice returns the original value.
pub fn reorigin_y(value: f64, height: f64) -> f64 {
    height - value
}

/// True once a table carries the post-processing output.
pub fn is_augmented(table: &Table) -> bool {
    table.has_column(FRAMES_COLUMN)
}

/// Build the augmented table from a raw one.
///
/// Output columns: the 99 raw columns (vertical ones re-originated) in
/// joint order, their `_filt` counterparts in the same order, then `frames`.
pub fn augment(raw: &Table, height: u32, options: &PostProcessOptions) -> MediaResult<Table> {
    raw.validate_raw()?;
    let filter = ButterworthLowPass::design(options.filter)?;
    let rows = raw.row_count();
    let height = height as f64;

    let passthrough = if rows > 0 && rows < ButterworthLowPass::MIN_LEN {
        match options.short_policy {
            ShortTrajectoryPolicy::Fail => {
                return Err(MediaError::TrajectoryTooShort {
                    rows,
                    required: ButterworthLowPass::MIN_LEN,
                })
            }
            ShortTrajectoryPolicy::Passthrough => {
                warn!(
                    rows,
                    required = ButterworthLowPass::MIN_LEN,
                    "Trajectory too short to filter, copying raw values"
                );
                true
            }
        }
    } else {
        rows == 0
    };

    let mut raw_out = Vec::new();
    let mut filtered_out = Vec::new();

    for name in raw_columns() {
        let values = raw
            .float(&name)
            .ok_or_else(|| MediaError::schema(format!("missing column '{}'", name)))?;

        let values: Vec<f64> = if is_vertical_column(&name) {
            values.iter().map(|v| reorigin_y(*v, height)).collect()
        } else {
            values.to_vec()
        };

        let filtered = if passthrough {
            values.clone()
        } else {
            filter.filtfilt_with_gaps(&values)?
        };

        filtered_out.push(Column::float(filtered_column_name(&name), filtered));
        raw_out.push(Column::float(name, values));
    }

    let mut columns = raw_out;
    columns.extend(filtered_out);
    columns.push(Column::index(FRAMES_COLUMN, (1..=rows as u64).collect()));
    Table::with_columns(columns)
}

/// Post-process the raw table at `path` in place.
///
/// A table that already carries `frames` is returned as is, which makes the
/// stage idempotent. Returns the augmented table and whether it was computed.
pub async fn postprocess_file(
    path: &Path,
    height: u32,
    options: &PostProcessOptions,
) -> MediaResult<(Table, bool)> {
    let table = deserialize_table(path).await?;
    if is_augmented(&table) {
        info!(path = %path.display(), "Trajectory already post-processed");
        return Ok((table, false));
    }

    let augmented = augment(&table, height, options)?;
    write_table(&augmented, path).await?;
    info!(
        path = %path.display(),
        rows = augmented.row_count(),
        cutoff_hz = options.filter.cutoff_hz,
        sample_rate_hz = options.filter.sample_rate_hz,
        "Post-processed trajectory"
    );
    Ok((augmented, true))
}
