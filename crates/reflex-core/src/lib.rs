pub mod background;
pub mod consts;
pub mod corrections;
pub mod error;
pub mod fit;
pub mod image;
pub mod io;
pub mod metadata;
pub mod pipeline;
pub mod profile;
pub mod region;
pub mod scan;
pub mod stitching;
