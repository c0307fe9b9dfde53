// Video surface placement: windowed/fullscreen layout, aspect ratio, transform

use crate::error::{PlayerError, Result};

/// Aspect ratio used before the first video frame size is known
pub const DEFAULT_ASPECT_RATIO: f32 = 1.778;

pub const IDENTITY_TRANSFORM: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Surface placement inside the host window. `None` sizes fill the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layout {
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub top: i32,
    pub left: i32,
}

impl Layout {
    pub const FILL: Layout = Layout {
        width: None,
        height: None,
        top: 0,
        left: 0,
    };
}

#[derive(Debug, Clone)]
pub struct Viewport {
    windowed: Layout,
    fullscreen: bool,
    transform: [f32; 9],
}

impl Viewport {
    /// A viewport without an explicit size starts out fullscreen
    pub fn new(width: Option<i32>, height: Option<i32>, top: Option<i32>, left: Option<i32>) -> Self {
        Self {
            windowed: Layout {
                width,
                height,
                top: top.unwrap_or(0),
                left: left.unwrap_or(0),
            },
            fullscreen: width.is_none() && height.is_none(),
            transform: IDENTITY_TRANSFORM,
        }
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Switch mode and return the layout to apply
    pub fn set_fullscreen(&mut self, fullscreen: bool) -> Layout {
        self.fullscreen = fullscreen;
        self.layout()
    }

    pub fn layout(&self) -> Layout {
        if self.fullscreen {
            Layout::FILL
        } else {
            self.windowed
        }
    }

    pub fn transform(&self) -> [f32; 9] {
        self.transform
    }

    /// Accept a row-major 3x3 matrix
    pub fn set_transform(&mut self, values: &[f64]) -> Result<[f32; 9]> {
        if values.len() != 9 {
            return Err(PlayerError::InvalidTransform(values.len()));
        }
        let mut matrix = [0f32; 9];
        for (slot, value) in matrix.iter_mut().zip(values) {
            *slot = *value as f32;
        }
        self.transform = matrix;
        Ok(matrix)
    }
}

/// Pick the ratio to display: an explicit request wins, then the video size
pub fn resolve_aspect_ratio(requested: Option<f32>, video_size: Option<(u32, u32)>) -> f32 {
    if let Some(ratio) = requested {
        return ratio;
    }
    match video_size {
        Some((width, height)) if height > 0 => width as f32 / height as f32,
        _ => DEFAULT_ASPECT_RATIO,
    }
}

/// Subtitle caption colors (ARGB); the edge is drawn as an outline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtitleStyle {
    pub foreground: u32,
    pub background: u32,
    pub window: u32,
    pub edge_color: u32,
}

impl SubtitleStyle {
    /// `[foreground, background, window, edge]`; any other length is ignored
    pub fn from_colors(colors: &[u32]) -> Option<Self> {
        match colors {
            [foreground, background, window, edge_color] => Some(Self {
                foreground: *foreground,
                background: *background,
                window: *window,
                edge_color: *edge_color,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsized_viewport_starts_fullscreen() {
        let viewport = Viewport::new(None, None, None, None);
        assert!(viewport.is_fullscreen());
        assert_eq!(viewport.layout(), Layout::FILL);
    }

    #[test]
    fn test_windowed_layout_round_trip() {
        let mut viewport = Viewport::new(Some(640), Some(360), Some(20), Some(10));
        assert!(!viewport.is_fullscreen());
        assert_eq!(viewport.set_fullscreen(true), Layout::FILL);
        let windowed = viewport.set_fullscreen(false);
        assert_eq!(
            windowed,
            Layout {
                width: Some(640),
                height: Some(360),
                top: 20,
                left: 10
            }
        );
    }

    #[test]
    fn test_transform_needs_nine_values() {
        let mut viewport = Viewport::new(None, None, None, None);
        assert!(matches!(
            viewport.set_transform(&[1.0, 0.0]),
            Err(PlayerError::InvalidTransform(2))
        ));
        let scaled = viewport
            .set_transform(&[2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0])
            .unwrap();
        assert_eq!(scaled[0], 2.0);
        assert_eq!(viewport.transform(), scaled);
    }

    #[test]
    fn test_aspect_ratio_resolution() {
        assert_eq!(resolve_aspect_ratio(Some(2.35), Some((1920, 1080))), 2.35);
        assert_eq!(resolve_aspect_ratio(None, Some((1600, 1200))), 4.0 / 3.0);
        assert_eq!(resolve_aspect_ratio(None, Some((1920, 0))), DEFAULT_ASPECT_RATIO);
        assert_eq!(resolve_aspect_ratio(None, None), DEFAULT_ASPECT_RATIO);
    }

    #[test]
    fn test_subtitle_style_needs_four_colors() {
        assert!(SubtitleStyle::from_colors(&[1, 2, 3]).is_none());
        let style = SubtitleStyle::from_colors(&[0xFFFFFFFF, 0, 0, 0xFF000000]).unwrap();
        assert_eq!(style.foreground, 0xFFFFFFFF);
        assert_eq!(style.edge_color, 0xFF000000);
    }
}
