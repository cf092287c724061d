//! # sprawl-io: Raster Codecs and Persisted Run State
//!
//! File formats for the sprawl simulator: the grayscale PGM raster codec,
//! input-layer loading with cross-layer validation and road
//! normalization, the restart checkpoint, the binary grow logs consumed
//! by the Monte Carlo aggregation, and raw grid dump/slurp for the
//! inter-realization cumulate scratch file.

pub mod dump;
pub mod growlog;
pub mod layers;
pub mod pgm;
pub mod probfile;
pub mod restart;

pub use dump::{dump_grid, slurp_grid};
pub use growlog::{append_record, grow_log_path, read_records, remove_log, GrowLogRecord};
pub use layers::{parse_dated_name, InputLayers, LayerSpec, EXCLUDED_THRESHOLD, MAX_ROAD_VALUE};
pub use pgm::{read_pgm, read_pgm_into, write_pgm};
pub use restart::{read_restart, restart_path, write_restart, RestartState, RESTART_FILE};
