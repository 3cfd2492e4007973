use serde::Deserialize;

use crate::LayoutError;

/// Tunable geometry for page understanding.
///
/// Pixel values are at capture resolution. Ratios are fractions of the
/// enclosing band (frame height, column width or card rows).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Fraction of the frame height covered by the fixed navigation header.
    pub header_ratio: f32,
    /// Fraction of the frame height covered by the fixed tab bar.
    pub footer_ratio: f32,
    /// Width of the left column as a fraction of the content band.
    pub column_split_ratio: f32,

    pub min_card_area_ratio: f32,
    pub min_card_width_ratio: f32,
    pub min_card_height: u32,
    /// Minimum Sobel `|gx| + |gy|` on the blurred plane to count as an edge.
    pub edge_threshold: f32,
    pub dilate_kernel_width: u32,
    pub dilate_kernel_height: u32,
    pub dilate_iterations: u32,

    /// Boxes taller than `split_height_ratio * column_width` are re-split.
    pub split_height_ratio: f32,
    pub max_split_depth: u32,
    pub min_gap_rows: u32,
    pub gap_max_edge_density: f32,
    pub gap_max_dark_density: f32,
    pub gap_min_light_density: f32,
    pub dark_luma: u8,
    pub light_luma: u8,

    pub meta_ratio: f32,
    pub meta_min_height: u32,
    pub meta_max_height: u32,
    pub boundary_search_radius: u32,
    pub smooth_window: u32,
    pub title_line_height: u32,
    pub title_padding: u32,
    pub title_min_height: u32,
    pub title_max_height: u32,
    pub title_min_ink: f32,
    pub min_image_height: u32,
    pub min_meta_height: u32,
    /// Rows with less ink than this are whitespace padding.
    pub trim_ink: f32,

    pub min_visible_ratio: f32,
    pub content_margin: i32,
    pub max_image_title_ratio: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            header_ratio: 0.15,
            footer_ratio: 0.10,
            column_split_ratio: 0.5,
            min_card_area_ratio: 0.05,
            min_card_width_ratio: 0.70,
            min_card_height: 50,
            edge_threshold: 96.0,
            dilate_kernel_width: 5,
            dilate_kernel_height: 15,
            dilate_iterations: 2,
            split_height_ratio: 1.2,
            max_split_depth: 2,
            min_gap_rows: 6,
            gap_max_edge_density: 0.02,
            gap_max_dark_density: 0.02,
            gap_min_light_density: 0.90,
            dark_luma: 80,
            light_luma: 200,
            meta_ratio: 0.12,
            meta_min_height: 24,
            meta_max_height: 60,
            boundary_search_radius: 8,
            smooth_window: 5,
            title_line_height: 28,
            title_padding: 10,
            title_min_height: 30,
            title_max_height: 120,
            title_min_ink: 0.01,
            min_image_height: 40,
            min_meta_height: 8,
            trim_ink: 0.002,
            min_visible_ratio: 0.85,
            content_margin: 2,
            max_image_title_ratio: 5.0,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), LayoutError> {
        check_fraction("header_ratio", self.header_ratio, 0.0, 1.0)?;
        check_fraction("footer_ratio", self.footer_ratio, 0.0, 1.0)?;
        if self.header_ratio + self.footer_ratio >= 1.0 {
            return Err(LayoutError::invalid(
                "footer_ratio",
                format!(
                    "{} (header_ratio + footer_ratio must stay below 1)",
                    self.footer_ratio
                ),
            ));
        }
        check_open_fraction("column_split_ratio", self.column_split_ratio)?;
        check_fraction("min_card_area_ratio", self.min_card_area_ratio, 0.0, 1.0)?;
        check_fraction("min_card_width_ratio", self.min_card_width_ratio, 0.0, 1.0)?;
        check_fraction("gap_max_edge_density", self.gap_max_edge_density, 0.0, 1.0)?;
        check_fraction("gap_max_dark_density", self.gap_max_dark_density, 0.0, 1.0)?;
        check_fraction("gap_min_light_density", self.gap_min_light_density, 0.0, 1.0)?;
        check_fraction("meta_ratio", self.meta_ratio, 0.0, 1.0)?;
        check_fraction("title_min_ink", self.title_min_ink, 0.0, 1.0)?;
        check_fraction("trim_ink", self.trim_ink, 0.0, 1.0)?;
        check_fraction("min_visible_ratio", self.min_visible_ratio, 0.0, 1.0)?;

        check_positive("min_card_height", self.min_card_height)?;
        check_positive("dilate_kernel_width", self.dilate_kernel_width)?;
        check_positive("dilate_kernel_height", self.dilate_kernel_height)?;
        check_positive("min_gap_rows", self.min_gap_rows)?;
        check_positive("title_line_height", self.title_line_height)?;
        check_positive("smooth_window", self.smooth_window)?;

        if !(self.edge_threshold > 0.0) {
            return Err(LayoutError::invalid(
                "edge_threshold",
                self.edge_threshold.to_string(),
            ));
        }
        if !(self.split_height_ratio > 0.0) {
            return Err(LayoutError::invalid(
                "split_height_ratio",
                self.split_height_ratio.to_string(),
            ));
        }
        if !(self.max_image_title_ratio > 0.0) {
            return Err(LayoutError::invalid(
                "max_image_title_ratio",
                self.max_image_title_ratio.to_string(),
            ));
        }
        if self.meta_min_height > self.meta_max_height {
            return Err(LayoutError::invalid(
                "meta_min_height",
                format!("{} > meta_max_height {}", self.meta_min_height, self.meta_max_height),
            ));
        }
        if self.title_min_height > self.title_max_height {
            return Err(LayoutError::invalid(
                "title_min_height",
                format!(
                    "{} > title_max_height {}",
                    self.title_min_height, self.title_max_height
                ),
            ));
        }
        if self.dark_luma >= self.light_luma {
            return Err(LayoutError::invalid(
                "dark_luma",
                format!("{} >= light_luma {}", self.dark_luma, self.light_luma),
            ));
        }
        if self.content_margin < 0 {
            return Err(LayoutError::invalid(
                "content_margin",
                self.content_margin.to_string(),
            ));
        }
        Ok(())
    }
}

fn check_fraction(field: &'static str, value: f32, lo: f32, hi: f32) -> Result<(), LayoutError> {
    if value >= lo && value <= hi {
        Ok(())
    } else {
        Err(LayoutError::invalid(field, value.to_string()))
    }
}

fn check_open_fraction(field: &'static str, value: f32) -> Result<(), LayoutError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(LayoutError::invalid(field, value.to_string()))
    }
}

fn check_positive(field: &'static str, value: u32) -> Result<(), LayoutError> {
    if value > 0 {
        Ok(())
    } else {
        Err(LayoutError::invalid(field, value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        LayoutConfig::default().validate().unwrap();
    }

    #[test]
    fn overlapping_chrome_bands_are_rejected() {
        let config = LayoutConfig {
            header_ratio: 0.6,
            footer_ratio: 0.5,
            ..LayoutConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LayoutError::InvalidConfig { field: "footer_ratio", .. }));
    }

    #[test]
    fn inverted_title_bounds_are_rejected() {
        let config = LayoutConfig {
            title_min_height: 200,
            ..LayoutConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
