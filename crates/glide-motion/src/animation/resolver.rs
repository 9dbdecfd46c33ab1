//! Keyframe resolution.
//!
//! Keyframes may contain `None` ("use the current value"), CSS variable
//! references, `"none"` placeholders, or positional values whose units
//! can't be mixed (`"auto"` to `"100px"`). A [`KeyframeResolver`] turns
//! them into concrete values before an animation starts.
//!
//! Resolvers without an element resolve synchronously. Resolvers owned by
//! an element are batched on a [`ResolverQueue`]: every pending resolver
//! reads during the `read` phase, then the ones that need geometry are
//! measured together during `resolve_keyframes`:
//!
//! 1. strip non-translational transforms from every affected element and render
//! 2. measure each origin
//! 3. jump each value to its target, render and restore the transforms
//! 4. measure each target

use crate::element::{VisualElement, WeakVisualElement, is_numerical_string};
use crate::frameloop::{Phase, Process, Scheduler, process};
use crate::interpolate::complex::{ComplexValue, Token};
use crate::projection::geometry::Rect;
use crate::types::{AnimatableValue, is_positional_key, parse_float};
use crate::value::WeakMotionValue;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

/// Receives the resolved keyframes and the value to leave behind once the
/// animation completes.
pub type ResolvedCallback = Box<dyn FnOnce(Vec<AnimatableValue>, Option<AnimatableValue>)>;

const MAX_VARIABLE_DEPTH: usize = 4;

struct QueueInner {
    scheduler: Scheduler,
    pending: RefCell<Vec<KeyframeResolver>>,
    is_scheduled: Cell<bool>,
    read_job: Process,
    measure_job: Process,
}

/// Batches element-bound resolvers so every read happens before any write.
///
/// Cloning gives another handle to the same queue.
#[derive(Clone)]
pub struct ResolverQueue {
    inner: Rc<QueueInner>,
}

impl ResolverQueue {
    pub fn new(scheduler: &Scheduler) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<QueueInner>| {
            let read = weak.clone();
            let measure = weak.clone();
            QueueInner {
                scheduler: scheduler.clone(),
                pending: RefCell::new(Vec::new()),
                is_scheduled: Cell::new(false),
                read_job: process(move |_| {
                    if let Some(inner) = read.upgrade() {
                        ResolverQueue { inner }.read_all();
                    }
                }),
                measure_job: process(move |_| {
                    if let Some(inner) = measure.upgrade() {
                        ResolverQueue { inner }.measure_all();
                    }
                }),
            }
        });
        Self { inner }
    }

    /// Number of resolvers waiting for the next batch.
    pub fn len(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pending.borrow().is_empty()
    }

    fn enqueue(&self, resolver: &KeyframeResolver) {
        {
            let mut pending = self.inner.pending.borrow_mut();
            if !pending.iter().any(|r| r.ptr_eq(resolver)) {
                pending.push(resolver.clone());
            }
        }
        if !self.inner.is_scheduled.replace(true) {
            let scheduler = &self.inner.scheduler;
            scheduler.schedule(Phase::Read, self.inner.read_job.clone(), false, false);
            scheduler.schedule(Phase::ResolveKeyframes, self.inner.measure_job.clone(), false, false);
        }
    }

    fn remove(&self, resolver: &KeyframeResolver) {
        self.inner.pending.borrow_mut().retain(|r| !r.ptr_eq(resolver));
    }

    fn snapshot(&self) -> Vec<KeyframeResolver> {
        self.inner.pending.borrow().clone()
    }

    fn read_all(&self) {
        for resolver in self.snapshot() {
            resolver.read_keyframes();
        }
    }

    fn measure_all(&self) {
        let resolvers = self.snapshot();
        for resolver in resolvers.iter().filter(|r| !r.inner.has_read.get()) {
            resolver.read_keyframes();
        }

        let to_measure: Vec<&KeyframeResolver> = resolvers.iter().filter(|r| r.inner.needs_measurement.get()).collect();
        if !to_measure.is_empty() {
            debug!(count = to_measure.len(), "measuring positional keyframes");
            let mut elements: Vec<VisualElement> = Vec::new();
            for resolver in &to_measure {
                if let Some(element) = resolver.element() {
                    if !elements.iter().any(|e| e.ptr_eq(&element)) {
                        elements.push(element);
                    }
                }
            }

            let removed: Vec<_> = elements
                .iter()
                .map(|element| {
                    let removed = element.remove_non_translational_transforms();
                    element.render();
                    removed
                })
                .collect();

            for resolver in &to_measure {
                resolver.measure_initial_state();
            }

            for (element, removed) in elements.iter().zip(removed) {
                element.render();
                for (key, value) in removed {
                    if let Some(motion_value) = element.get_value(&key) {
                        motion_value.jump_without_stopping(value);
                    }
                }
            }

            for resolver in &to_measure {
                resolver.measure_end_state();
            }
        }

        self.inner.is_scheduled.set(false);
        let pending = std::mem::take(&mut *self.inner.pending.borrow_mut());
        for resolver in pending {
            resolver.complete();
        }
    }

    /// Resolve everything pending right now instead of waiting for a frame.
    pub fn flush(&self) {
        if self.is_empty() {
            return;
        }
        let scheduler = &self.inner.scheduler;
        scheduler.cancel(&self.inner.read_job);
        scheduler.cancel(&self.inner.measure_job);
        self.read_all();
        self.measure_all();
    }
}

struct ResolverInner {
    queue: Weak<QueueInner>,
    keyframes: RefCell<Vec<Option<AnimatableValue>>>,
    final_keyframe: RefCell<Option<AnimatableValue>>,
    name: Option<String>,
    motion_value: Option<WeakMotionValue>,
    element: Option<WeakVisualElement>,
    is_async: bool,
    is_complete: Cell<bool>,
    is_scheduled: Cell<bool>,
    has_read: Cell<bool>,
    needs_measurement: Cell<bool>,
    measured_origin: RefCell<Option<AnimatableValue>>,
    on_complete: RefCell<Option<ResolvedCallback>>,
}

/// Fills in the unresolved parts of a keyframe list.
#[derive(Clone)]
pub struct KeyframeResolver {
    inner: Rc<ResolverInner>,
}

impl KeyframeResolver {
    /// Create a resolver. Nothing happens until [`Self::schedule_resolve`].
    pub fn new(
        queue: &ResolverQueue,
        keyframes: Vec<Option<AnimatableValue>>,
        name: Option<String>,
        motion_value: Option<WeakMotionValue>,
        element: Option<WeakVisualElement>,
        on_complete: ResolvedCallback,
    ) -> Self {
        Self {
            inner: Rc::new(ResolverInner {
                queue: Rc::downgrade(&queue.inner),
                keyframes: RefCell::new(keyframes),
                final_keyframe: RefCell::new(None),
                name,
                motion_value,
                is_async: element.is_some(),
                element,
                is_complete: Cell::new(false),
                is_scheduled: Cell::new(false),
                has_read: Cell::new(false),
                needs_measurement: Cell::new(false),
                measured_origin: RefCell::new(None),
                on_complete: RefCell::new(Some(on_complete)),
            }),
        }
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn queue(&self) -> Option<ResolverQueue> {
        self.inner.queue.upgrade().map(|inner| ResolverQueue { inner })
    }

    fn element(&self) -> Option<VisualElement> {
        self.inner.element.as_ref().and_then(WeakVisualElement::upgrade)
    }

    pub fn is_async(&self) -> bool {
        self.inner.is_async
    }

    pub fn is_complete(&self) -> bool {
        self.inner.is_complete.get()
    }

    pub fn is_scheduled(&self) -> bool {
        self.inner.is_scheduled.get()
    }

    pub fn needs_measurement(&self) -> bool {
        self.inner.needs_measurement.get()
    }

    /// Current (possibly partially resolved) keyframes.
    pub fn keyframes(&self) -> Vec<Option<AnimatableValue>> {
        self.inner.keyframes.borrow().clone()
    }

    /// Resolve now (no element) or on the next batch (element-bound).
    pub fn schedule_resolve(&self) {
        self.inner.is_scheduled.set(true);
        if self.inner.is_async {
            if let Some(queue) = self.queue() {
                queue.enqueue(self);
                return;
            }
        }
        self.read_keyframes();
        self.complete();
    }

    /// Withdraw from the pending batch.
    pub fn cancel(&self) {
        self.inner.is_scheduled.set(false);
        if self.inner.is_async {
            if let Some(queue) = self.queue() {
                queue.remove(self);
            }
        }
    }

    /// Reschedule after [`Self::cancel`], unless already complete.
    pub fn resume(&self) {
        if !self.is_complete() {
            self.schedule_resolve();
        }
    }

    fn read_keyframes(&self) {
        self.inner.has_read.set(true);
        let element = self.element();
        if self.inner.is_async && element.is_none() {
            return;
        }

        self.fill_wildcards(element.as_ref());
        if let Some(element) = &element {
            self.resolve_variables(element);
        }
        self.resolve_none_keyframes();

        let Some(name) = self.inner.name.as_deref() else {
            return;
        };
        if element.is_none() || !is_positional_key(name) {
            return;
        }
        let mut keyframes = self.inner.keyframes.borrow_mut();
        if keyframes.len() != 2 {
            return;
        }
        let (Some(origin), Some(target)) = (keyframes[0].clone(), keyframes[1].clone()) else {
            return;
        };
        let (origin_type, target_type) = (dimension_type(&origin), dimension_type(&target));
        if origin_type == target_type {
            return;
        }
        if is_num_or_px(origin_type) && is_num_or_px(target_type) {
            for keyframe in keyframes.iter_mut().flatten() {
                if let AnimatableValue::Text(s) = keyframe {
                    if let Some(n) = parse_float(s) {
                        *keyframe = AnimatableValue::Number(n);
                    }
                }
            }
        } else {
            self.inner.needs_measurement.set(true);
        }
    }

    fn fill_wildcards(&self, element: Option<&VisualElement>) {
        let mut keyframes = self.inner.keyframes.borrow_mut();
        let Some(last) = keyframes.last().cloned() else {
            return;
        };
        if keyframes[0].is_none() {
            let current = self.inner.motion_value.as_ref().and_then(WeakMotionValue::upgrade).map(|v| v.get());
            let read = || match (element, self.inner.name.as_deref()) {
                (Some(element), Some(name)) => element.read_value(name),
                _ => None,
            };
            keyframes[0] = current.or_else(read).or(last);
        }
        for i in 1..keyframes.len() {
            if keyframes[i].is_none() {
                keyframes[i] = keyframes[i - 1].clone();
            }
        }
    }

    fn resolve_variables(&self, element: &VisualElement) {
        let adapter = element.adapter().clone();
        let mut keyframes = self.inner.keyframes.borrow_mut();
        let last_index = keyframes.len().saturating_sub(1);
        let mut unresolved = Vec::new();

        for (i, keyframe) in keyframes.iter_mut().enumerate() {
            let Some(AnimatableValue::Text(text)) = keyframe else {
                continue;
            };
            let token = text.trim().to_string();
            if !token.starts_with("var(--") {
                continue;
            }
            match resolve_variable(&token, &|name| adapter.read_css_variable(name), 1) {
                Some(resolved) => *keyframe = Some(resolved),
                None => unresolved.push(i),
            }
            if i == last_index {
                *self.inner.final_keyframe.borrow_mut() = Some(AnimatableValue::Text(token));
            }
        }

        let last = keyframes.last().cloned().flatten();
        for i in unresolved {
            warn!(
                key = self.inner.name.as_deref().unwrap_or_default(),
                keyframe = ?keyframes[i],
                "css variable has no value, using the final keyframe"
            );
            if i != last_index {
                keyframes[i] = last.clone();
            }
        }
    }

    /// Give `none` placeholders a zeroed copy of an animatable sibling's
    /// template, so `"none"` → `"blur(10px)"` mixes from `"blur(0px)"`.
    fn resolve_none_keyframes(&self) {
        let mut keyframes = self.inner.keyframes.borrow_mut();
        let none_indexes: Vec<usize> = keyframes
            .iter()
            .enumerate()
            .filter(|(_, k)| k.as_ref().is_none_or(is_none))
            .map(|(i, _)| i)
            .collect();
        if none_indexes.is_empty() {
            return;
        }

        let template = keyframes.iter().flatten().find_map(|k| match k {
            AnimatableValue::Text(s) if !matches!(s.trim(), "none" | "0" | "auto") => {
                let analysed = ComplexValue::analyse(s);
                (!analysed.tokens.is_empty()).then_some(analysed)
            }
            _ => None,
        });
        let Some(template) = template else {
            return;
        };
        let none = animatable_none(&template);
        for i in none_indexes {
            keyframes[i] = Some(AnimatableValue::Text(none.clone()));
        }
    }

    fn positional_value(&self, element: &VisualElement, bounds: &Rect) -> Option<AnimatableValue> {
        let name = self.inner.name.as_deref()?;
        let adapter = element.adapter();
        let read = |key: &str| adapter.read_value(key).and_then(|v| v.as_f64());
        let value = match name {
            "width" => bounds.width() - read("paddingLeft").unwrap_or(0.0) - read("paddingRight").unwrap_or(0.0),
            "height" => bounds.height() - read("paddingTop").unwrap_or(0.0) - read("paddingBottom").unwrap_or(0.0),
            "top" => read("top").unwrap_or(bounds.y.min),
            "left" => read("left").unwrap_or(bounds.x.min),
            "bottom" => read("top").unwrap_or(bounds.y.min) + bounds.height(),
            "right" => read("left").unwrap_or(bounds.x.min) + bounds.width(),
            "x" | "translateX" | "y" | "translateY" => read(name).unwrap_or(0.0),
            _ => return None,
        };
        Some(AnimatableValue::Number(value))
    }

    fn measure_initial_state(&self) {
        let Some(element) = self.element() else {
            return;
        };
        let bounds = match element.measure_viewport_box() {
            Ok(bounds) => bounds,
            Err(err) => {
                warn!(error = %err, "skipping keyframe measurement");
                return;
            }
        };
        let Some(origin) = self.positional_value(&element, &bounds) else {
            return;
        };
        let last = {
            let mut keyframes = self.inner.keyframes.borrow_mut();
            keyframes[0] = Some(origin.clone());
            keyframes.last().cloned().flatten()
        };
        *self.inner.measured_origin.borrow_mut() = Some(origin);

        if let (Some(last), Some(name)) = (last, self.inner.name.as_deref()) {
            element.get_or_create_value(name, last.clone()).jump_without_stopping(last);
        }
    }

    fn measure_end_state(&self) {
        let Some(element) = self.element() else {
            return;
        };
        let origin = self.inner.measured_origin.borrow().clone();
        let Some(origin) = origin else {
            return;
        };
        if let Some(value) = self.inner.name.as_deref().and_then(|name| element.get_value(name)) {
            value.jump_without_stopping(origin);
        }

        let bounds = match element.measure_viewport_box() {
            Ok(bounds) => bounds,
            Err(err) => {
                warn!(error = %err, "skipping keyframe measurement");
                return;
            }
        };
        if let Some(target) = self.positional_value(&element, &bounds) {
            let mut keyframes = self.inner.keyframes.borrow_mut();
            if let Some(last) = keyframes.last_mut() {
                let original = last.replace(target);
                let mut final_keyframe = self.inner.final_keyframe.borrow_mut();
                if final_keyframe.is_none() {
                    *final_keyframe = original;
                }
            }
        }
        self.resolve_none_keyframes();
    }

    fn complete(&self) {
        if self.inner.is_complete.replace(true) {
            return;
        }
        self.inner.is_scheduled.set(false);
        let keyframes: Vec<AnimatableValue> = self.inner.keyframes.borrow().iter().flatten().cloned().collect();
        let final_keyframe = self.inner.final_keyframe.borrow().clone();
        if self.inner.is_async {
            if let Some(queue) = self.queue() {
                queue.remove(self);
            }
        }
        let on_complete = self.inner.on_complete.borrow_mut().take();
        if let Some(on_complete) = on_complete {
            on_complete(keyframes, final_keyframe);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DimensionType {
    Number,
    Px,
    Percent,
    Em,
    Rem,
    Vw,
    Vh,
    Deg,
    Auto,
    Other,
}

fn dimension_type(value: &AnimatableValue) -> DimensionType {
    match value {
        AnimatableValue::Number(_) => DimensionType::Number,
        AnimatableValue::Text(s) if s.trim() == "auto" => DimensionType::Auto,
        AnimatableValue::Text(s) if is_numerical_string(s) => DimensionType::Number,
        AnimatableValue::Text(_) => match value.unit() {
            Some("px") => DimensionType::Px,
            Some("%") => DimensionType::Percent,
            Some("em") => DimensionType::Em,
            Some("rem") => DimensionType::Rem,
            Some("vw") => DimensionType::Vw,
            Some("vh") => DimensionType::Vh,
            Some("deg") => DimensionType::Deg,
            _ => DimensionType::Other,
        },
    }
}

fn is_num_or_px(kind: DimensionType) -> bool {
    matches!(kind, DimensionType::Number | DimensionType::Px)
}

/// Whether `value` is a "nothing" placeholder: `0`, `"none"`, `"0"` or a
/// zero with a unit such as `"0px"`.
pub fn is_none(value: &AnimatableValue) -> bool {
    match value {
        AnimatableValue::Number(n) => *n == 0.0,
        AnimatableValue::Text(s) => {
            let s = s.trim();
            s == "none" || s == "0" || (s.starts_with('0') && s.len() > 1 && !s[1..].contains(['.', ' ']) && !s[1..].starts_with(|c: char| c.is_ascii_digit()))
        }
    }
}

fn animatable_none(template: &ComplexValue) -> String {
    let tokens: Vec<Token> = template
        .tokens
        .iter()
        .map(|token| match token {
            Token::Number(_) => Token::Number(0.0),
            other => other.clone(),
        })
        .collect();
    template.render(&tokens)
}

/// Split `var(--name, fallback)` into its name and fallback.
fn parse_variable(token: &str) -> Option<(&str, Option<&str>)> {
    let body = token.trim().strip_prefix("var(")?.strip_suffix(')')?;
    let (name, fallback) = match body.split_once(',') {
        Some((name, fallback)) => (name.trim(), Some(fallback.trim())),
        None => (body.trim(), None),
    };
    name.starts_with("--").then_some((name, fallback))
}

fn resolve_variable(token: &str, lookup: &dyn Fn(&str) -> Option<String>, depth: usize) -> Option<AnimatableValue> {
    if depth > MAX_VARIABLE_DEPTH {
        warn!(token, "css variable fallback nested too deeply");
        return None;
    }
    let (name, fallback) = parse_variable(token)?;
    if let Some(resolved) = lookup(name) {
        let resolved = resolved.trim();
        if !resolved.is_empty() {
            return Some(if is_numerical_string(resolved) {
                AnimatableValue::Number(parse_float(resolved)?)
            } else {
                AnimatableValue::Text(resolved.to_string())
            });
        }
    }
    match fallback {
        Some(fallback) if fallback.starts_with("var(--") => resolve_variable(fallback, lookup, depth + 1),
        Some(fallback) if is_numerical_string(fallback) => parse_float(fallback).map(AnimatableValue::Number),
        Some(fallback) => Some(AnimatableValue::Text(fallback.to_string())),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MotionContext;
    use crate::element::testing::MockAdapter;
    use crate::frameloop::ManualClock;
    use crate::value::MotionValue;
    use glide_config::GlideConfig;
    use std::collections::BTreeMap;

    type Captured = Rc<RefCell<Option<(Vec<AnimatableValue>, Option<AnimatableValue>)>>>;

    fn capture() -> (Captured, ResolvedCallback) {
        let captured: Captured = Rc::new(RefCell::new(None));
        let sink = captured.clone();
        (captured, Box::new(move |k, f| *sink.borrow_mut() = Some((k, f))))
    }

    fn context() -> MotionContext {
        MotionContext::new(ManualClock::new(), GlideConfig::default())
    }

    #[test]
    fn test_sync_fill_from_motion_value() {
        let ctx = context();
        let value = MotionValue::new(ctx.scheduler(), "10px");
        let (captured, on_complete) = capture();
        let resolver = KeyframeResolver::new(
            ctx.resolvers(),
            vec![None, Some("20px".into())],
            Some("x".into()),
            Some(value.downgrade()),
            None,
            on_complete,
        );
        resolver.schedule_resolve();
        assert!(resolver.is_complete());
        let (keyframes, final_keyframe) = captured.borrow_mut().take().unwrap();
        assert_eq!(keyframes, vec![AnimatableValue::from("10px"), AnimatableValue::from("20px")]);
        assert_eq!(final_keyframe, None);
    }

    #[test]
    fn test_wildcards_take_previous() {
        let ctx = context();
        let (captured, on_complete) = capture();
        let resolver = KeyframeResolver::new(
            ctx.resolvers(),
            vec![Some(0.0.into()), None, Some(5.0.into()), None],
            None,
            None,
            None,
            on_complete,
        );
        resolver.schedule_resolve();
        let (keyframes, _) = captured.borrow_mut().take().unwrap();
        let numbers: Vec<f64> = keyframes.iter().filter_map(AnimatableValue::as_f64).collect();
        assert_eq!(numbers, vec![0.0, 0.0, 5.0, 5.0]);
    }

    #[test]
    fn test_async_waits_for_frame_and_resolves_variables() {
        let ctx = context();
        let adapter = Rc::new(MockAdapter::default());
        adapter.variables.borrow_mut().insert("--size".into(), " 24 ".into());
        let element = VisualElement::new(&ctx, adapter);
        let value = element.get_or_create_value("opacity", 0.0);
        let (captured, on_complete) = capture();
        let resolver = KeyframeResolver::new(
            ctx.resolvers(),
            vec![None, Some("var(--size)".into())],
            Some("opacity".into()),
            Some(value.downgrade()),
            Some(element.downgrade()),
            on_complete,
        );
        resolver.schedule_resolve();
        assert!(!resolver.is_complete());
        assert_eq!(ctx.resolvers().len(), 1);

        ctx.scheduler().process_frame();
        let (keyframes, final_keyframe) = captured.borrow_mut().take().unwrap();
        assert_eq!(keyframes, vec![AnimatableValue::Number(0.0), AnimatableValue::Number(24.0)]);
        assert_eq!(final_keyframe, Some(AnimatableValue::from("var(--size)")));
        assert!(ctx.resolvers().is_empty());
    }

    #[test]
    fn test_variable_fallbacks() {
        let vars: BTreeMap<&str, &str> = [("--b", "red")].into_iter().collect();
        let lookup = |name: &str| vars.get(name).map(|v| v.to_string());
        assert_eq!(resolve_variable("var(--a, var(--b))", &lookup, 1), Some(AnimatableValue::from("red")));
        assert_eq!(resolve_variable("var(--a, 10)", &lookup, 1), Some(AnimatableValue::Number(10.0)));
        assert_eq!(resolve_variable("var(--a)", &lookup, 1), None);
        assert_eq!(
            resolve_variable("var(--a, var(--a, var(--a, var(--a, var(--a)))))", &lookup, 1),
            None
        );
    }

    #[test]
    fn test_none_keyframes_get_template() {
        let ctx = context();
        let (captured, on_complete) = capture();
        let resolver = KeyframeResolver::new(
            ctx.resolvers(),
            vec![Some("none".into()), Some("blur(10px)".into())],
            Some("filter".into()),
            None,
            None,
            on_complete,
        );
        resolver.schedule_resolve();
        let (keyframes, _) = captured.borrow_mut().take().unwrap();
        assert_eq!(keyframes[0], AnimatableValue::from("blur(0px)"));
    }

    #[test]
    fn test_is_none() {
        assert!(is_none(&AnimatableValue::Number(0.0)));
        assert!(is_none(&"none".into()));
        assert!(is_none(&"0px".into()));
        assert!(!is_none(&"0.5px".into()));
        assert!(!is_none(&"10px".into()));
        assert!(!is_none(&"05".into()));
    }

    #[test]
    fn test_auto_height_is_measured() {
        let ctx = context();
        let adapter = Rc::new(MockAdapter::with_bounds(Rect::from_xywh(0.0, 0.0, 100.0, 40.0)));
        let element = VisualElement::new(&ctx, adapter.clone());
        let height = element.get_or_create_value("height", "auto");
        let (captured, on_complete) = capture();
        let resolver = KeyframeResolver::new(
            ctx.resolvers(),
            vec![None, Some(AnimatableValue::Number(100.0))],
            Some("height".into()),
            Some(height.downgrade()),
            Some(element.downgrade()),
            on_complete,
        );
        resolver.schedule_resolve();
        ctx.resolvers().flush();

        assert!(resolver.needs_measurement());
        let (keyframes, final_keyframe) = captured.borrow_mut().take().unwrap();
        // the mock box never changes, so both ends measure 40
        assert_eq!(keyframes, vec![AnimatableValue::Number(40.0), AnimatableValue::Number(40.0)]);
        assert_eq!(final_keyframe, Some(AnimatableValue::Number(100.0)));
        assert_eq!(height.get(), AnimatableValue::Number(40.0));
        assert!(adapter.rendered.borrow().len() >= 2);
    }

    #[test]
    fn test_cancel_removes_from_queue() {
        let ctx = context();
        let element = VisualElement::new(&ctx, Rc::new(MockAdapter::default()));
        let (captured, on_complete) = capture();
        let resolver = KeyframeResolver::new(
            ctx.resolvers(),
            vec![Some(0.0.into()), Some(1.0.into())],
            Some("opacity".into()),
            None,
            Some(element.downgrade()),
            on_complete,
        );
        resolver.schedule_resolve();
        resolver.cancel();
        ctx.scheduler().process_frame();
        assert!(captured.borrow().is_none());

        resolver.resume();
        ctx.scheduler().process_frame();
        assert!(captured.borrow().is_some());
    }
}
