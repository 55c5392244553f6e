//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Fit `source` inside `bounds`, preserving aspect ratio and never upscaling.
///
/// Images already within both bounds are returned unchanged. Otherwise the
/// dominant axis (the longer side) is clamped to its bound and the other side
/// is derived from the aspect ratio. When the bounds are not square the
/// derived side can still overflow its own bound, in which case that side is
/// clamped and the first one re-derived.
///
/// Results are rounded to the nearest pixel and never drop below 1.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `bounds` - Maximum allowed dimensions (width, height)
///
/// # Examples
/// ```
/// # use pixel_budget::imaging::fit_within;
/// // 4000x3000 landscape into a 1920 box → 1920x1440
/// assert_eq!(fit_within((4000, 3000), (1920, 1920)), (1920, 1440));
///
/// // Already small enough → untouched
/// assert_eq!(fit_within((200, 150), (1920, 1920)), (200, 150));
/// ```
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;

    if src_w <= max_w && src_h <= max_h {
        return source;
    }
    if src_w == 0 || src_h == 0 {
        return (src_w.min(max_w), src_h.min(max_h));
    }

    let aspect = src_w as f64 / src_h as f64;

    let (mut w, mut h) = if src_w > src_h {
        // Landscape: width leads
        let w = src_w.min(max_w) as f64;
        (w, w / aspect)
    } else {
        // Portrait or square: height leads
        let h = src_h.min(max_h) as f64;
        (h * aspect, h)
    };

    // Non-square bounds: the derived side may still be too large
    if h > max_h as f64 {
        h = max_h as f64;
        w = h * aspect;
    }
    if w > max_w as f64 {
        w = max_w as f64;
        h = w / aspect;
    }

    let w = (w.round() as u32).clamp(1, max_w.max(1));
    let h = (h.round() as u32).clamp(1, max_h.max(1));
    (w, h)
}
