//! # Coordinate Mapper Module
//!
//! Converts pointer positions on the video display into frame pixels.
//!
//! The frame is the turret's own view of the video image and its size is
//! authoritative once reported. The display is whatever box the image is
//! shown in locally. The same point on the image maps to the same frame
//! coordinate whatever the display size, so calibration samples stay valid
//! across window resizes.

/// Frame size used until the turret reports one. Must match the turret's own
/// default.
pub const FALLBACK_FRAME: FrameGeometry = FrameGeometry {
    width: 640,
    height: 480,
};

/// Pixel dimensions of the video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Map a display point to frame coordinates
///
/// A zero, negative or non-finite display dimension means layout is not
/// complete; the point is returned unscaled.
///
/// # Examples
///
/// ```
/// use turret_console::view::coords::{to_frame_coords, FrameGeometry};
///
/// let frame = FrameGeometry::new(640, 480);
/// assert_eq!(to_frame_coords(160.0, 120.0, 320.0, 240.0, frame), (320.0, 240.0));
/// assert_eq!(to_frame_coords(160.0, 120.0, 0.0, 240.0, frame), (160.0, 120.0));
/// ```
#[must_use]
pub fn to_frame_coords(
    display_x: f64,
    display_y: f64,
    display_w: f64,
    display_h: f64,
    frame: FrameGeometry,
) -> (f64, f64) {
    let usable = |d: f64| d.is_finite() && d > 0.0;
    if !usable(display_w) || !usable(display_h) {
        return (display_x, display_y);
    }

    let scale_x = frame.width as f64 / display_w;
    let scale_y = frame.height as f64 / display_h;
    (display_x * scale_x, display_y * scale_y)
}

/// Tracks the authoritative frame size
#[derive(Debug, Clone)]
pub struct CoordinateMapper {
    reported: Option<FrameGeometry>,
    fallback: FrameGeometry,
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        Self::new(FALLBACK_FRAME)
    }
}

impl CoordinateMapper {
    #[must_use]
    pub fn new(fallback: FrameGeometry) -> Self {
        Self {
            reported: None,
            fallback,
        }
    }

    /// Record a frame size reported by the turret. Zero sizes are ignored.
    pub fn set_reported(&mut self, geometry: FrameGeometry) {
        if geometry.width == 0 || geometry.height == 0 {
            return;
        }
        self.reported = Some(geometry);
    }

    /// Whether the turret has reported a frame size yet
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.reported.is_some()
    }

    /// Frame size currently in effect
    #[must_use]
    pub fn geometry(&self) -> FrameGeometry {
        self.reported.unwrap_or(self.fallback)
    }

    /// Map a display point using the frame size currently in effect
    #[must_use]
    pub fn to_frame(&self, display_x: f64, display_y: f64, display_w: f64, display_h: f64) -> (f64, f64) {
        to_frame_coords(display_x, display_y, display_w, display_h, self.geometry())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_size_display() {
        let mapper = CoordinateMapper::default();
        assert_eq!(mapper.to_frame(160.0, 120.0, 320.0, 240.0), (320.0, 240.0));
    }

    #[test]
    fn test_zero_display_passes_through() {
        let mapper = CoordinateMapper::default();
        assert_eq!(mapper.to_frame(12.5, 7.0, 0.0, 240.0), (12.5, 7.0));
        assert_eq!(mapper.to_frame(12.5, 7.0, 320.0, 0.0), (12.5, 7.0));
    }

    #[test]
    fn test_invalid_display_passes_through() {
        let frame = FrameGeometry::new(640, 480);
        assert_eq!(to_frame_coords(1.0, 2.0, f64::NAN, 240.0, frame), (1.0, 2.0));
        assert_eq!(to_frame_coords(1.0, 2.0, -320.0, 240.0, frame), (1.0, 2.0));
        assert_eq!(to_frame_coords(1.0, 2.0, f64::INFINITY, 240.0, frame), (1.0, 2.0));
    }

    #[test]
    fn test_fallback_until_reported() {
        let mut mapper = CoordinateMapper::default();
        assert!(!mapper.is_confirmed());
        assert_eq!(mapper.geometry(), FrameGeometry::new(640, 480));

        mapper.set_reported(FrameGeometry::new(1280, 720));
        assert!(mapper.is_confirmed());
        assert_eq!(mapper.to_frame(640.0, 360.0, 1280.0, 720.0), (640.0, 360.0));
        assert_eq!(mapper.to_frame(100.0, 100.0, 640.0, 360.0), (200.0, 200.0));
    }

    #[test]
    fn test_zero_report_ignored() {
        let mut mapper = CoordinateMapper::default();
        mapper.set_reported(FrameGeometry::new(800, 600));
        mapper.set_reported(FrameGeometry::new(0, 600));
        assert_eq!(mapper.geometry(), FrameGeometry::new(800, 600));
    }

    #[test]
    fn test_same_point_any_display_size() {
        let frame = FrameGeometry::new(640, 480);
        // Centre of the image at three window sizes
        for &(w, h) in &[(320.0, 240.0), (640.0, 480.0), (1280.0, 960.0)] {
            assert_eq!(to_frame_coords(w / 2.0, h / 2.0, w, h, frame), (320.0, 240.0));
        }
    }

    #[test]
    fn test_anisotropic_scaling() {
        let frame = FrameGeometry::new(640, 480);
        assert_eq!(to_frame_coords(100.0, 100.0, 1280.0, 480.0, frame), (50.0, 100.0));
    }
}
