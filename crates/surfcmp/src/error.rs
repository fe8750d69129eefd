//! Error taxonomy for the comparison core.
//!
//! Every failure is fatal for the run that raised it; there is no partial
//! recovery or in-core retry. Detection failures propagate untouched.

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unrecognized or mixed tile naming in a volume directory, or a missing
    /// required parameter.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A requested region extends past the volume extents. `lo`/`hi` are the
    /// requested half-open bounds per (Z, Y, X) axis; negative lows come from
    /// centers closer than `radius` to the origin.
    #[error("region out of bounds: lo {lo:?}, hi {hi:?}, volume extents {extents:?}")]
    OutOfBounds {
        lo: [i64; 3],
        hi: [i64; 3],
        extents: [usize; 3],
    },

    /// The external detection collaborator failed or returned malformed
    /// output (wrong label shape, mismatched point/normal cardinality).
    #[error("detection failure: {0}")]
    Detection(String),

    /// The comparison engine received a zero-length point cloud.
    #[error("point cloud {side} is empty")]
    EmptyCloud { side: u8 },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A 2D slice tile failed to decode.
    #[error("slice tile decode error: {0}")]
    Image(#[from] image::ImageError),

    /// A 3D cell tile failed to decode.
    #[error("cell tile decode error: {0}")]
    Tiff(#[from] tiff::TiffError),
}
