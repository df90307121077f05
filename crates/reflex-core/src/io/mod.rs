pub mod manifest;
pub mod normalisation;
pub mod writer;

pub use manifest::{build_scan, load_counts, FrameSource, ManifestSource, ScanManifest, ScanSource};
pub use normalisation::{parse_normalisation_table, read_normalisation_file};
pub use writer::{write_reflectivity, write_table};
