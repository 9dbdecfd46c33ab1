use glide_motion::element::{InstanceAdapter, RenderState};
use glide_motion::projection::geometry::Rect;
use glide_motion::{AnimatableValue, MotionError, Result};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// In-memory instance with a settable box.
#[derive(Default)]
pub struct TestInstance {
    pub computed: RefCell<BTreeMap<String, AnimatableValue>>,
    pub bounds: Cell<Option<Rect>>,
    pub renders: RefCell<Vec<RenderState>>,
}

impl TestInstance {
    pub fn with_bounds(bounds: Rect) -> Self {
        let instance = Self::default();
        instance.bounds.set(Some(bounds));
        instance
    }

    pub fn last_style(&self, key: &str) -> Option<String> {
        self.renders.borrow().last().and_then(|state| state.style.get(key).cloned())
    }
}

impl InstanceAdapter for TestInstance {
    fn read_value(&self, key: &str) -> Option<AnimatableValue> {
        self.computed.borrow().get(key).cloned()
    }

    fn render(&self, state: &RenderState) {
        self.renders.borrow_mut().push(state.clone());
    }

    fn measure_viewport_box(&self) -> Result<Rect> {
        self.bounds
            .get()
            .ok_or_else(|| MotionError::Measurement("instance detached".into()))
    }
}
