//! Color assignment for newly fetched feeds.
//!
//! The color is an opaque palette index; nothing here interprets it. Which
//! indices are pleasant to look at is decided by whoever builds the palette.

use rf_model::NEUTRAL_COLOR;

pub trait ColorAssigner: Send + Sync {
    /// Pick a color for the feed identified by `feed_link`.
    fn assign(&self, feed_link: &str) -> i32;
}

/// Uniform random pick from a palette of indices.
#[derive(Debug, Clone)]
pub struct RandomColors {
    palette: Vec<i32>,
}

impl RandomColors {
    pub fn new(palette: Vec<i32>) -> Self {
        Self { palette }
    }
}

impl Default for RandomColors {
    /// The full 256-color terminal palette.
    fn default() -> Self {
        Self::new((0..256).collect())
    }
}

impl ColorAssigner for RandomColors {
    fn assign(&self, _feed_link: &str) -> i32 {
        if self.palette.is_empty() {
            return NEUTRAL_COLOR;
        }
        self.palette[fastrand::usize(..self.palette.len())]
    }
}

/// Always the same color.
#[derive(Debug, Clone, Copy)]
pub struct FixedColor(pub i32);

impl ColorAssigner for FixedColor {
    fn assign(&self, _feed_link: &str) -> i32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_stays_in_palette() {
        let colors = RandomColors::new(vec![3, 7, 11]);
        for _ in 0..50 {
            assert!([3, 7, 11].contains(&colors.assign("u")));
        }
    }

    #[test]
    fn default_palette_is_256_colors() {
        let colors = RandomColors::default();
        for _ in 0..50 {
            assert!((0..256).contains(&colors.assign("u")));
        }
    }

    #[test]
    fn empty_palette_falls_back_to_neutral() {
        assert_eq!(RandomColors::new(Vec::new()).assign("u"), NEUTRAL_COLOR);
    }

    #[test]
    fn fixed_color_includes_zero() {
        assert_eq!(FixedColor(0).assign("u"), 0);
    }
}
