//! Trajectory tables: CSV persistence, filtering and post-processing.

pub mod filter;
pub mod postprocess;
pub mod serializer;
pub mod table;

pub use filter::{ButterworthLowPass, FilterConfig};
pub use postprocess::{
    augment, is_augmented, postprocess_file, reorigin_y, PostProcessOptions, ShortTrajectoryPolicy,
};
pub use serializer::{deserialize_table, read_table, serialize_trajectory, write_table};
pub use table::{Column, ColumnData, Table};
