use serde::{Deserialize, Serialize};
use std::fmt;

/// Ссылка на окно (X11 window id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowRef(pub u64);

impl WindowRef {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Прямоугольник в пикселях: левая, верхняя, правая, нижняя границы
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> (i32, i32) {
        (self.left + self.width() / 2, self.top + self.height() / 2)
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Пересечение; None если прямоугольники не перекрываются
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let rect = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (rect.width() > 0 && rect.height() > 0).then_some(rect)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}) {}x{}",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

/// Состояние размещения окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Placement {
    Normal,
    Maximized,
    Minimized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_dimensions() {
        let rect = Rect::from_xywh(10, 20, 800, 600);
        assert_eq!(rect, Rect::new(10, 20, 810, 620));
        assert_eq!(rect.width(), 800);
        assert_eq!(rect.height(), 600);
        assert_eq!(rect.center(), (410, 320));
    }

    #[test]
    fn test_rect_intersection() {
        let monitor = Rect::new(1920, 0, 3840, 1080);
        let workarea = Rect::new(0, 27, 3840, 1080);
        assert_eq!(monitor.intersect(&workarea), Some(Rect::new(1920, 27, 3840, 1080)));

        let left = Rect::new(0, 0, 100, 100);
        let right = Rect::new(100, 0, 200, 100);
        assert_eq!(left.intersect(&right), None);
    }

    #[test]
    fn test_window_ref_display() {
        assert_eq!(WindowRef(0x3a00007).to_string(), "0x03a00007");
    }
}
