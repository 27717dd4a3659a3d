use super::types::Viewport;
use crate::ir::{Position, Size};

/// A node box as the flat engines see it. `position` is `None` when the
/// engine produced no coordinates for the node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placed {
    pub position: Option<Position>,
    pub size: Size,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    min_x: f64,
    min_y: f64,
    width: f64,
    height: f64,
}

fn bounding_box(boxes: &[Placed]) -> Bounds {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for placed in boxes {
        let Some(position) = placed.position else {
            continue;
        };
        min_x = min_x.min(position.x);
        min_y = min_y.min(position.y);
        max_x = max_x.max(position.x + placed.size.width);
        max_y = max_y.max(position.y + placed.size.height);
    }
    if !min_x.is_finite() || !min_y.is_finite() {
        return Bounds {
            min_x: 0.0,
            min_y: 0.0,
            width: 1.0,
            height: 1.0,
        };
    }
    Bounds {
        min_x,
        min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    }
}

/// Scales and centres the boxes into the viewport minus its padding.
///
/// The scale is uniform. Sizes shrink along with positions when the layout is
/// larger than the viewport, and are kept as they are otherwise.
pub fn fit_to_viewport(boxes: &[Placed], viewport: &Viewport) -> Vec<Placed> {
    let padding = viewport.padding;
    let inner_width = (viewport.width - 2.0 * padding).max(1.0);
    let inner_height = (viewport.height - 2.0 * padding).max(1.0);
    let bounds = bounding_box(boxes);
    let scale = (inner_width / bounds.width.max(1.0)).min(inner_height / bounds.height.max(1.0));
    let offset_x = padding + (inner_width - bounds.width * scale) / 2.0 - bounds.min_x * scale;
    let offset_y = padding + (inner_height - bounds.height * scale) / 2.0 - bounds.min_y * scale;
    let size_scale = scale.min(1.0);

    boxes
        .iter()
        .map(|placed| match placed.position {
            Some(position) => Placed {
                position: Some(Position::new(
                    position.x * scale + offset_x,
                    position.y * scale + offset_y,
                )),
                size: Size::new(placed.size.width * size_scale, placed.size.height * size_scale),
            },
            None => *placed,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed(x: f64, y: f64, width: f64, height: f64) -> Placed {
        Placed {
            position: Some(Position::new(x, y)),
            size: Size::new(width, height),
        }
    }

    fn assert_within(boxes: &[Placed], viewport: &Viewport) {
        let eps = 1e-6;
        for item in boxes {
            let position = item.position.unwrap();
            assert!(position.x >= viewport.padding - eps);
            assert!(position.y >= viewport.padding - eps);
            assert!(position.x + item.size.width <= viewport.width - viewport.padding + eps);
            assert!(position.y + item.size.height <= viewport.height - viewport.padding + eps);
        }
    }

    #[test]
    fn large_layouts_shrink_into_the_viewport() {
        let viewport = Viewport::new(800.0, 600.0).with_padding(20.0);
        let boxes = vec![placed(-500.0, -300.0, 180.0, 60.0), placed(2400.0, 1800.0, 180.0, 60.0)];
        let fitted = fit_to_viewport(&boxes, &viewport);
        assert_within(&fitted, &viewport);
    }

    #[test]
    fn small_layouts_grow_and_centre() {
        let viewport = Viewport::new(800.0, 600.0).with_padding(20.0);
        let boxes = vec![placed(0.0, 0.0, 10.0, 10.0), placed(30.0, 0.0, 10.0, 10.0)];
        let fitted = fit_to_viewport(&boxes, &viewport);
        assert_within(&fitted, &viewport);
        let first = fitted[0].position.unwrap();
        assert!((first.x - 20.0).abs() < 1e-6);
        assert_eq!(fitted[0].size, Size::new(10.0, 10.0));
    }

    #[test]
    fn empty_and_unplaced_inputs_pass_through() {
        let viewport = Viewport::new(800.0, 600.0);
        assert!(fit_to_viewport(&[], &viewport).is_empty());

        let unplaced = Placed {
            position: None,
            size: Size::new(5.0, 5.0),
        };
        assert_eq!(fit_to_viewport(&[unplaced], &viewport), vec![unplaced]);
    }

    #[test]
    fn single_point_does_not_divide_by_zero() {
        let viewport = Viewport::new(100.0, 100.0).with_padding(10.0);
        let fitted = fit_to_viewport(&[placed(5.0, 5.0, 0.0, 0.0)], &viewport);
        let position = fitted[0].position.unwrap();
        assert!(position.x.is_finite() && position.y.is_finite());
    }
}
