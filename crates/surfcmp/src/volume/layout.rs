//! Tile filename classification.
//!
//! Two on-disk layouts are recognized, mirroring the scroll-archive
//! conventions:
//!
//! - *Slice*: purely numeric stems (`0.tif`, `1.tif`, …), one 2D image per
//!   Z index. Slices sort by numeric value, not lexicographically.
//! - *Cell*: `cell_yxz_<Y>_<X>_<Z>.tif`, a 3D cuboid tile at the given
//!   (Y, X, Z) grid position.
//!
//! A directory must resolve to exactly one layout; anything else is a
//! configuration error raised by the caller.

/// Parsed tile filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TileName {
    /// Numeric-stem 2D slice with its numeric sort key.
    Slice { sort_key: u64 },
    /// 3D cuboid cell at a (Y, X, Z) grid position.
    Cell { y: usize, x: usize, z: usize },
}

const CELL_PREFIX: &str = "cell_yxz_";

/// Classify a filename stem (extension already stripped).
///
/// Returns `None` for stems following neither convention.
pub(crate) fn parse_tile_name(stem: &str) -> Option<TileName> {
    if !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()) {
        return Some(TileName::Slice {
            sort_key: numeric_sort_key(stem)?,
        });
    }

    let rest = stem.strip_prefix(CELL_PREFIX)?;
    let mut groups = rest.split('_');
    let y = groups.next()?.parse().ok()?;
    let x = groups.next()?.parse().ok()?;
    let z = groups.next()?.parse().ok()?;
    if groups.next().is_some() {
        return None;
    }
    Some(TileName::Cell { y, x, z })
}

/// Numeric value of the digit characters of a name, ignoring separators.
///
/// This is the slice sort key: `2.tif` must sort before `10.tif`.
pub(crate) fn numeric_sort_key(name: &str) -> Option<u64> {
    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// True for the `.tif`/`.tiff` extensions the volume reader accepts.
pub(crate) fn is_tiff_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".tif") || lower.ends_with(".tiff")
}

/// Strip the TIFF extension from a tile filename.
pub(crate) fn tile_stem(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}
