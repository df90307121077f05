use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ReflexError, Result};
use crate::image::Image;

/// An axis-aligned pixel rectangle, half-open on both axes.
///
/// `x` indexes the first array axis (rows) and `y` the second (columns), so a
/// region selects `array[x_start..x_end, y_start..y_end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RegionBounds", into = "RegionBounds")]
pub struct Region {
    x_start: usize,
    x_end: usize,
    y_start: usize,
    y_end: usize,
}

/// Unchecked serde mirror of [`Region`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct RegionBounds {
    x_start: usize,
    x_end: usize,
    y_start: usize,
    y_end: usize,
}

impl TryFrom<RegionBounds> for Region {
    type Error = ReflexError;

    fn try_from(b: RegionBounds) -> Result<Self> {
        Region::new(b.x_start, b.x_end, b.y_start, b.y_end)
    }
}

impl From<Region> for RegionBounds {
    fn from(r: Region) -> Self {
        Self {
            x_start: r.x_start,
            x_end: r.x_end,
            y_start: r.y_start,
            y_end: r.y_end,
        }
    }
}

impl Region {
    pub fn new(x_start: usize, x_end: usize, y_start: usize, y_end: usize) -> Result<Self> {
        if x_start >= x_end || y_start >= y_end {
            return Err(ReflexError::Validation(format!(
                "region bounds must satisfy start < end, got x {x_start}..{x_end}, y {y_start}..{y_end}"
            )));
        }
        Ok(Self {
            x_start,
            x_end,
            y_start,
            y_end,
        })
    }

    /// Build a region from a mapping with the keys `x_start`, `x_end`,
    /// `y_start` and `y_end`.
    pub fn from_map(map: &HashMap<String, i64>) -> Result<Self> {
        let get = |key: &str| -> Result<usize> {
            let value = *map.get(key).ok_or_else(|| {
                ReflexError::Validation(format!("region is missing the `{key}` key"))
            })?;
            usize::try_from(value).map_err(|_| {
                ReflexError::Validation(format!("region `{key}` must be non-negative, got {value}"))
            })
        };
        Self::new(get("x_start")?, get("x_end")?, get("y_start")?, get("y_end")?)
    }

    /// A region of at most `x_size` by `y_size` pixels centred on the
    /// brightest pixel of `image`, clipped to the image bounds.
    pub fn around_peak(image: &Image, x_size: usize, y_size: usize) -> Result<Self> {
        let (nx, ny) = image.shape();
        if nx == 0 || ny == 0 {
            return Err(ReflexError::Validation("cannot locate a peak in an empty image".into()));
        }
        let mut peak = (0, 0);
        let mut best = f64::NEG_INFINITY;
        for ((x, y), &v) in image.values().indexed_iter() {
            if v > best {
                best = v;
                peak = (x, y);
            }
        }
        let x_start = peak.0.saturating_sub(x_size / 2);
        let y_start = peak.1.saturating_sub(y_size / 2);
        let x_end = (peak.0 + x_size.div_ceil(2)).min(nx).max(x_start + 1);
        let y_end = (peak.1 + y_size.div_ceil(2)).min(ny).max(y_start + 1);
        Self::new(x_start, x_end, y_start, y_end)
    }

    pub fn x_start(&self) -> usize {
        self.x_start
    }

    pub fn x_end(&self) -> usize {
        self.x_end
    }

    pub fn y_start(&self) -> usize {
        self.y_start
    }

    pub fn y_end(&self) -> usize {
        self.y_end
    }

    pub fn x_length(&self) -> usize {
        self.x_end - self.x_start
    }

    pub fn y_length(&self) -> usize {
        self.y_end - self.y_start
    }

    pub fn num_pixels(&self) -> usize {
        self.x_length() * self.y_length()
    }

    /// Whether the region fits inside an array of the given shape.
    pub fn fits_within(&self, shape: (usize, usize)) -> bool {
        self.x_end <= shape.0 && self.y_end <= shape.1
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.x_start..self.x_end).contains(&x) && (self.y_start..self.y_end).contains(&y)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x {}..{}, y {}..{}",
            self.x_start, self.x_end, self.y_start, self.y_end
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths_and_pixels() {
        let r = Region::new(1056, 1124, 150, 250).unwrap();
        assert_eq!(r.x_length(), 68);
        assert_eq!(r.y_length(), 100);
        assert_eq!(r.num_pixels(), 6800);
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        assert!(matches!(
            Region::new(2, 1, 3, 4),
            Err(ReflexError::Validation(_))
        ));
        assert!(Region::new(1, 1, 3, 4).is_err());
    }

    #[test]
    fn test_from_map_missing_key() {
        let mut map = HashMap::new();
        map.insert("x_start".to_string(), 0);
        map.insert("x_end".to_string(), 4);
        map.insert("y_start".to_string(), 0);
        assert!(matches!(
            Region::from_map(&map),
            Err(ReflexError::Validation(_))
        ));
        map.insert("y_end".to_string(), 2);
        assert_eq!(Region::from_map(&map).unwrap(), Region::new(0, 4, 0, 2).unwrap());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Region = toml::from_str("x_start = 1\nx_end = 3\ny_start = 0\ny_end = 2").unwrap();
        assert_eq!(ok.num_pixels(), 4);
        let bad: std::result::Result<Region, _> =
            toml::from_str("x_start = 3\nx_end = 1\ny_start = 0\ny_end = 2");
        assert!(bad.is_err());
    }
}
