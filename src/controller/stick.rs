//! On-screen analog stick
//!
//! The first contact becomes the stick center. Dragging away from it deflects
//! the stick; the deflection saturates at `radius` view units.

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickSide {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct AnalogStick {
    radius: f32,
    center: Option<(f32, f32)>,
    value: (f32, f32),
}

impl AnalogStick {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            center: None,
            value: (0.0, 0.0),
        }
    }

    /// Current deflection, each component in [-1, 1]
    pub fn value(&self) -> (f32, f32) {
        self.value
    }

    pub fn is_held(&self) -> bool {
        self.center.is_some()
    }

    /// Feeds the contact position, or `None` once it is lifted.
    /// Returns the new deflection.
    pub fn update(&mut self, position: Option<(f32, f32)>) -> (f32, f32) {
        if self.radius <= 0.0 {
            return self.value;
        }

        let Some((x, y)) = position else {
            self.center = None;
            self.value = (0.0, 0.0);
            return self.value;
        };

        let (cx, cy) = *self.center.get_or_insert((x, y));
        let (dx, dy) = (x - cx, y - cy);
        let length = dx.hypot(dy);
        self.value = if length > 0.0 {
            let strength = (length / self.radius).min(1.0);
            let (nx, ny) = (dx / length, dy / length);
            // stretch the circle onto the unit square so diagonals reach full travel
            let scale = nx.abs().max(ny.abs());
            (nx / scale * strength, ny / scale * strength)
        } else {
            (0.0, 0.0)
        };
        trace!("Stick deflection {:?}", self.value);
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-5 && (a.1 - b.1).abs() < 1e-5
    }

    #[test]
    fn first_contact_is_center() {
        let mut stick = AnalogStick::new(50.0);
        assert_eq!(stick.update(Some((100.0, 100.0))), (0.0, 0.0));
        assert!(stick.is_held());
        assert!(close(stick.update(Some((125.0, 100.0))), (0.5, 0.0)));
    }

    #[test]
    fn saturates_at_radius() {
        let mut stick = AnalogStick::new(50.0);
        stick.update(Some((0.0, 0.0)));
        assert!(close(stick.update(Some((0.0, -400.0))), (0.0, -1.0)));
    }

    #[test]
    fn diagonal_reaches_corner() {
        let mut stick = AnalogStick::new(10.0);
        stick.update(Some((0.0, 0.0)));
        assert!(close(stick.update(Some((100.0, 100.0))), (1.0, 1.0)));
    }

    #[test]
    fn release_recenters() {
        let mut stick = AnalogStick::new(10.0);
        stick.update(Some((0.0, 0.0)));
        stick.update(Some((5.0, 0.0)));
        assert_eq!(stick.update(None), (0.0, 0.0));
        assert!(!stick.is_held());

        // the next contact defines a new center
        assert_eq!(stick.update(Some((50.0, 50.0))), (0.0, 0.0));
    }

    #[test]
    fn zero_radius_is_inert() {
        let mut stick = AnalogStick::new(0.0);
        assert_eq!(stick.update(Some((10.0, 10.0))), (0.0, 0.0));
        assert!(!stick.is_held());
    }
}
