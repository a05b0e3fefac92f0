//! Geometric primitives in PDF user space.
//!
//! Coordinates follow the PDF convention: origin at the bottom-left corner of
//! the page, y growing upwards, one unit per point.

use crate::error::{Error, Result};

/// A rectangle in document space, anchored at its lower-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// X coordinate of the lower-left corner
    pub x: f32,
    /// Y coordinate of the lower-left corner
    pub y: f32,
    /// Width of rectangle
    pub width: f32,
    /// Height of rectangle
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle from position and dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_seal::geometry::Rect;
    ///
    /// let rect = Rect::new(50.0, 50.0, 200.0, 70.0);
    /// assert_eq!(rect.right(), 250.0);
    /// assert_eq!(rect.top(), 120.0);
    /// ```
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from two opposite corners, in any order.
    ///
    /// PDF rectangles (`/MediaBox`, `/Rect`) may list their corners in either
    /// order, so the result is normalized.
    ///
    /// ```
    /// use pdf_seal::geometry::Rect;
    ///
    /// let rect = Rect::from_points(612.0, 792.0, 0.0, 0.0);
    /// assert_eq!(rect, Rect::new(0.0, 0.0, 612.0, 792.0));
    /// ```
    pub fn from_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// Right edge x-coordinate.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Top edge y-coordinate.
    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    /// Reject rectangles that cannot hold an annotation.
    ///
    /// Only the dimensions are checked; keeping the box on the page is the
    /// caller's job.
    pub fn validate_dimensions(&self) -> Result<()> {
        let all_finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::InvalidRect(format!("non-finite coordinates in {:?}", self)));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(Error::InvalidRect(format!(
                "width and height must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.top() <= self.top()
    }

    /// Corners as a PDF rectangle array `[llx lly urx ury]`.
    pub fn to_pdf_array(&self) -> [f32; 4] {
        [self.x, self.y, self.right(), self.top()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_dimensions() {
        assert!(Rect::new(50.0, 50.0, 200.0, 70.0).validate_dimensions().is_ok());
        assert!(Rect::new(50.0, 50.0, 0.0, 70.0).validate_dimensions().is_err());
        assert!(Rect::new(50.0, 50.0, 200.0, -1.0).validate_dimensions().is_err());
        assert!(Rect::new(f32::NAN, 50.0, 200.0, 70.0)
            .validate_dimensions()
            .is_err());
    }

    #[test]
    fn test_contains() {
        let page = Rect::new(0.0, 0.0, 612.0, 792.0);
        assert!(page.contains(&Rect::new(50.0, 50.0, 200.0, 70.0)));
        assert!(!page.contains(&Rect::new(500.0, 50.0, 200.0, 70.0)));
    }

    #[test]
    fn test_to_pdf_array() {
        let rect = Rect::new(50.0, 50.0, 200.0, 70.0);
        assert_eq!(rect.to_pdf_array(), [50.0, 50.0, 250.0, 120.0]);
    }
}
