//! Чистые функции раскладки: целевой прямоугольник по доле рабочей области
//! и сравнение прямоугольников с допуском.

use crate::events::Rect;
use serde::{Deserialize, Serialize};

/// Направление цикла: к какой стороне рабочей области привязано окно
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleAxis {
    Left,
    Right,
    Top,
    Bottom,
}

impl CycleAxis {
    /// Left/Right масштабируют ширину, Top/Bottom высоту
    pub fn is_horizontal(&self) -> bool {
        matches!(self, CycleAxis::Left | CycleAxis::Right)
    }
}

/// Все четыре границы отличаются не больше чем на `tolerance`
pub fn rects_close(a: &Rect, b: &Rect, tolerance: i32) -> bool {
    (a.left - b.left).abs() <= tolerance
        && (a.top - b.top).abs() <= tolerance
        && (a.right - b.right).abs() <= tolerance
        && (a.bottom - b.bottom).abs() <= tolerance
}

/// Размер стороны по доле; половины округляются к чётному
fn scaled(length: i32, ratio: f64) -> i32 {
    (f64::from(length) * ratio).round_ties_even() as i32
}

/// Прямоугольник для доли `ratio` с привязкой к стороне `axis`.
///
/// Для Top/Bottom горизонтальное положение берётся из `current`: ширина не
/// больше рабочей области, правый край не выходит за её пределы.
pub fn target_rect(work_area: &Rect, ratio: f64, axis: CycleAxis, current: &Rect) -> Rect {
    match axis {
        CycleAxis::Left => {
            let width = scaled(work_area.width(), ratio);
            Rect::new(work_area.left, work_area.top, work_area.left + width, work_area.bottom)
        }
        CycleAxis::Right => {
            let width = scaled(work_area.width(), ratio);
            Rect::new(work_area.right - width, work_area.top, work_area.right, work_area.bottom)
        }
        CycleAxis::Top | CycleAxis::Bottom => {
            let height = scaled(work_area.height(), ratio);
            let width = current.width().clamp(0, work_area.width());
            let mut left = current.left;
            if left + width > work_area.right {
                left = work_area.right - width;
            }
            let left = left.max(work_area.left);

            let (top, bottom) = if axis == CycleAxis::Top {
                (work_area.top, work_area.top + height)
            } else {
                (work_area.bottom - height, work_area.bottom)
            };
            Rect::new(left, top, left + width, bottom)
        }
    }
}

/// Кандидаты цикла в порядке долей
pub fn candidates(work_area: &Rect, ratios: &[f64], axis: CycleAxis, current: &Rect) -> Vec<Rect> {
    ratios
        .iter()
        .map(|ratio| target_rect(work_area, *ratio, axis, current))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORK: Rect = Rect::new(0, 0, 1920, 1040);

    #[test]
    fn test_rects_close_tolerance() {
        let a = Rect::new(0, 0, 968, 1040);
        let b = Rect::new(2, -1, 966, 1042);
        assert!(rects_close(&a, &b, 2));
        assert!(rects_close(&b, &a, 2));
        assert!(!rects_close(&a, &b, 1));
        assert!(!rects_close(&b, &a, 1));

        let c = Rect::new(0, 0, 965, 1040);
        assert!(!rects_close(&a, &c, 2));
    }

    #[test]
    fn test_rects_close_zero_tolerance_is_equality() {
        let a = Rect::new(10, 20, 30, 40);
        assert!(rects_close(&a, &a, 0));
        assert!(!rects_close(&a, &Rect::new(10, 20, 30, 41), 0));
        assert!(!rects_close(&Rect::new(11, 20, 30, 40), &a, 0));
    }

    #[test]
    fn test_left_and_right_anchoring() {
        let current = Rect::new(100, 100, 500, 500);

        let left = target_rect(&WORK, 0.5040, CycleAxis::Left, &current);
        assert_eq!(left, Rect::new(0, 0, 968, 1040));

        let right = target_rect(&WORK, 0.5040, CycleAxis::Right, &current);
        assert_eq!(right, Rect::new(952, 0, 1920, 1040));

        let narrow = target_rect(&WORK, 0.3372, CycleAxis::Left, &current);
        assert_eq!(narrow.width(), 647);
        let wide = target_rect(&WORK, 0.6707, CycleAxis::Right, &current);
        assert_eq!(wide.width(), 1288);
        assert_eq!(wide.right, 1920);
    }

    #[test]
    fn test_offset_work_area() {
        // Второй монитор справа, панель сверху
        let work = Rect::new(1920, 27, 3840, 1080);
        let rect = target_rect(&work, 0.5, CycleAxis::Right, &work);
        assert_eq!(rect, Rect::new(2880, 27, 3840, 1080));
    }

    #[test]
    fn test_rounding_half_to_even() {
        let work = Rect::new(0, 0, 5, 100);
        assert_eq!(target_rect(&work, 0.5, CycleAxis::Left, &work).width(), 2);
        let work = Rect::new(0, 0, 7, 100);
        assert_eq!(target_rect(&work, 0.5, CycleAxis::Left, &work).width(), 4);
    }

    #[test]
    fn test_vertical_inherits_horizontal_placement() {
        let current = Rect::new(200, 300, 900, 700);

        let top = target_rect(&WORK, 0.5, CycleAxis::Top, &current);
        assert_eq!(top, Rect::new(200, 0, 900, 520));

        let bottom = target_rect(&WORK, 0.3333, CycleAxis::Bottom, &current);
        assert_eq!(bottom.left, 200);
        assert_eq!(bottom.right, 900);
        assert_eq!(bottom.bottom, 1040);
        assert_eq!(bottom.height(), 347);
    }

    #[test]
    fn test_vertical_clamps_to_work_area() {
        // Выходит за правый край: сдвигается влево
        let overflow = Rect::new(1500, 0, 2200, 500);
        let rect = target_rect(&WORK, 0.5, CycleAxis::Top, &overflow);
        assert_eq!(rect, Rect::new(1220, 0, 1920, 520));

        // Шире рабочей области: ширина обрезается
        let huge = Rect::new(-50, 0, 2500, 500);
        let rect = target_rect(&WORK, 0.5, CycleAxis::Bottom, &huge);
        assert_eq!(rect, Rect::new(0, 520, 1920, 1040));
    }

    #[test]
    fn test_candidates_keep_ratio_order() {
        let ratios = [0.5040, 0.3372, 0.6707];
        let rects = candidates(&WORK, &ratios, CycleAxis::Left, &WORK);
        let widths: Vec<i32> = rects.iter().map(Rect::width).collect();
        assert_eq!(widths, vec![968, 647, 1288]);
    }
}
