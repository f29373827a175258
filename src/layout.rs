/// Width state of a side panel docked to the right of the main content,
/// resized by dragging the divider between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPane {
    width: f64,
    min: f64,
    max: f64,
    resizing: bool,
}

impl SplitPane {
    /// `initial` is clamped into `[min, max]`; bounds given in the wrong
    /// order are swapped. A non-finite `min` becomes 0, a non-finite `max`
    /// leaves the width unbounded above, and a non-finite `initial` starts
    /// at `min`.
    pub fn new(initial: f64, min: f64, max: f64) -> Self {
        let min = if min.is_finite() { min } else { 0.0 };
        let max = if max.is_finite() { max } else { f64::INFINITY };
        let initial = if initial.is_finite() { initial } else { min };
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self { width: initial.clamp(min, max), min, max, resizing: false }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn is_resizing(&self) -> bool {
        self.resizing
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn start_resize(&mut self) {
        self.resizing = true;
    }

    /// Recomputes the width from the pointer. Returns whether it changed.
    /// Moves outside a drag are ignored.
    pub fn resize_to(&mut self, pointer_x: f64, container_right: f64) -> bool {
        if !self.resizing || !pointer_x.is_finite() || !container_right.is_finite() {
            return false;
        }
        let width = (container_right - pointer_x).clamp(self.min, self.max);
        let changed = width != self.width;
        self.width = width;
        changed
    }

    pub fn stop_resize(&mut self) {
        self.resizing = false;
    }
}
