//! Output size computation

/// Fit a source into an optional bounding box, preserving aspect ratio
///
/// Width is clamped first. If the resulting height still exceeds the height
/// bound, height is clamped and width recomputed from it, so the width bound
/// wins whenever both bounds are given. Sources are only ever scaled down,
/// and no dimension drops below one pixel.
pub fn fit_dimensions(
    source_width: u32,
    source_height: u32,
    max_width: Option<u32>,
    max_height: Option<u32>,
) -> (u32, u32) {
    if source_width == 0 || source_height == 0 {
        return (source_width, source_height);
    }

    let mut width = source_width as f64;
    let mut height = source_height as f64;

    if let Some(bound) = max_width.filter(|b| *b > 0) {
        let bound = bound as f64;
        if width > bound {
            height = height * bound / width;
            width = bound;
        }
    }

    if let Some(bound) = max_height.filter(|b| *b > 0) {
        let bound = bound as f64;
        if height > bound {
            width = width * bound / height;
            height = bound;
        }
    }

    (to_pixels(width), to_pixels(height))
}

fn to_pixels(value: f64) -> u32 {
    (value.round() as u32).max(1)
}
