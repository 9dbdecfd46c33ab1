//! The projection tree.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Every pass that walks the
//! tree computes under one borrow of the arena and only calls out to
//! elements and animations after releasing it, because both can call back
//! into the tree.

use super::geometry::{Delta, Point, Rect, TransformValues, TreeStep, apply_tree_deltas, build_projection_transform};
use super::node::{AnimationOrigin, Measurements, ProjectionNode, Values};
use super::stack::{Promotion, SharedStack};
use super::styles::{ProjectionStyles, mix_values, scale_corrected_styles};
use super::{LayoutAnimation, NodeId, ProjectionEvent, ProjectionOptions, default_layout_transition};
use crate::animation::{Transition, animate_motion_value};
use crate::context::MotionContext;
use crate::element::VisualElement;
use crate::error::{MotionError, Result};
use crate::frameloop::{Phase, Process, process};
use crate::interpolate::complex::format_number;
use crate::types::AnimatableValue;
use crate::value::{MotionValue, ValueEvent};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

const CENTER: Point = Point { x: 0.5, y: 0.5 };
/// Layout animations drive a progress value from 0 to this.
const PROGRESS_END: f64 = 1000.0;
/// Aspect ratio change `PreserveAspect` tolerates before snapping size.
const ASPECT_RATIO_TOLERANCE: f64 = 0.2;

type Nodes = Vec<Option<ProjectionNode>>;
type Stacks = BTreeMap<String, SharedStack>;

fn node(nodes: &Nodes, id: NodeId) -> Option<&ProjectionNode> {
    nodes.get(id.0).and_then(Option::as_ref)
}

fn node_mut(nodes: &mut Nodes, id: NodeId) -> Option<&mut ProjectionNode> {
    nodes.get_mut(id.0).and_then(Option::as_mut)
}

/// Live node ids, parents before children.
fn depth_order(nodes: &Nodes) -> Vec<NodeId> {
    let mut ids: Vec<(usize, NodeId)> = nodes.iter().flatten().map(|n| (n.depth, n.id)).collect();
    ids.sort();
    ids.into_iter().map(|(_, id)| id).collect()
}

/// Ancestors of `id`, root first.
fn ancestors(nodes: &Nodes, id: NodeId) -> Vec<NodeId> {
    let mut path = Vec::new();
    let mut current = node(nodes, id).and_then(|n| n.parent);
    while let Some(parent) = current {
        path.push(parent);
        current = node(nodes, parent).and_then(|n| n.parent);
    }
    path.reverse();
    path
}

/// `id` and every descendant, parents first.
fn subtree(nodes: &Nodes, id: NodeId) -> Vec<NodeId> {
    let mut out = vec![id];
    let mut index = 0;
    while index < out.len() {
        if let Some(n) = node(nodes, out[index]) {
            out.extend(n.children.iter().copied());
        }
        index += 1;
    }
    out
}

fn lead_of(nodes: &Nodes, stacks: &Stacks, id: NodeId) -> NodeId {
    node(nodes, id)
        .and_then(|n| n.options.layout_id.as_ref())
        .and_then(|layout_id| stacks.get(layout_id))
        .and_then(SharedStack::lead)
        .filter(|lead| node(nodes, *lead).is_some())
        .unwrap_or(id)
}

/// The nearest ancestor whose own box is being projected.
///
/// `None` when an ancestor in between carries a translate or scale, which
/// would make a relative target meaningless.
fn closest_projecting_parent(nodes: &Nodes, id: NodeId) -> Option<NodeId> {
    let mut current = node(nodes, id)?.parent;
    while let Some(parent_id) = current {
        let parent = node(nodes, parent_id)?;
        let transform = TransformValues::from_values(&parent.latest_values());
        if transform.has_scale() || transform.has_2d_translate() {
            return None;
        }
        if parent.is_projecting() {
            return Some(parent_id);
        }
        current = parent.parent;
    }
    None
}

fn is_animation_blocked(nodes: &Nodes, id: NodeId) -> bool {
    let mut current = Some(id);
    while let Some(id) = current {
        let Some(n) = node(nodes, id) else {
            return false;
        };
        if n.is_animation_blocked {
            return true;
        }
        current = n.parent;
    }
    false
}

fn round_rect(rect: &mut Rect) {
    for axis in [&mut rect.x, &mut rect.y] {
        axis.min = axis.min.round();
        axis.max = axis.max.round();
    }
}

fn animates_position_only(mode: Option<LayoutAnimation>, snapshot: &Rect, layout: &Rect) -> bool {
    match mode {
        Some(LayoutAnimation::Position) => true,
        Some(LayoutAnimation::PreserveAspect) => (snapshot.aspect_ratio() - layout.aspect_ratio()).abs() > ASPECT_RATIO_TOLERANCE,
        _ => false,
    }
}

/// What a node does after its layout update was compared.
enum LayoutAction {
    Start(Transition),
    /// No animation; optionally jump a running one to its end and complete
    /// an exit.
    Settle { finish: bool, exit: bool },
}

struct TreeInner {
    ctx: MotionContext,
    nodes: RefCell<Nodes>,
    stacks: RefCell<Stacks>,
    events: RefCell<VecDeque<ProjectionEvent>>,
    is_updating: Cell<bool>,
    update_blocked: Cell<bool>,
    projection_job: Process,
}

/// Arena of projection nodes sharing one frame loop.
#[derive(Clone)]
pub struct ProjectionTree {
    inner: Rc<TreeInner>,
}

impl ProjectionTree {
    pub fn new(ctx: &MotionContext) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<TreeInner>| {
            let weak = weak.clone();
            TreeInner {
                ctx: ctx.clone(),
                nodes: RefCell::new(Vec::new()),
                stacks: RefCell::new(BTreeMap::new()),
                events: RefCell::new(VecDeque::new()),
                is_updating: Cell::new(false),
                update_blocked: Cell::new(false),
                projection_job: process(move |_| {
                    if let Some(inner) = weak.upgrade() {
                        ProjectionTree { inner }.update_projection();
                    }
                }),
            }
        });
        Self { inner }
    }

    fn downgrade(&self) -> Weak<TreeInner> {
        Rc::downgrade(&self.inner)
    }

    fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&ProjectionNode) -> R) -> Option<R> {
        node(&self.inner.nodes.borrow(), id).map(f)
    }

    fn with_node_mut<R>(&self, id: NodeId, f: impl FnOnce(&mut ProjectionNode) -> R) -> Option<R> {
        node_mut(&mut self.inner.nodes.borrow_mut(), id).map(f)
    }

    fn emit(&self, event: ProjectionEvent) {
        self.inner.events.borrow_mut().push_back(event);
    }

    // --- structure ---

    /// Add a node under `parent`.
    pub fn mount(&self, parent: Option<NodeId>, element: Option<&VisualElement>, options: ProjectionOptions) -> Result<NodeId> {
        let id = {
            let mut nodes = self.inner.nodes.borrow_mut();
            let depth = match parent {
                Some(p) => node(&nodes, p).ok_or(MotionError::NodeNotFound(p.0))?.depth + 1,
                None => 0,
            };
            let id = NodeId(nodes.len());
            let layout_id = options.layout_id.clone();
            nodes.push(Some(ProjectionNode::new(id, parent, depth, element.map(VisualElement::downgrade), options)));
            if let Some(parent) = parent.and_then(|p| node_mut(&mut nodes, p)) {
                parent.children.push(id);
            }
            debug!(node = id.0, ?parent, ?layout_id, "mounted projection node");
            id
        };
        self.register_shared(id);
        Ok(id)
    }

    /// Bind an element to a node mounted without one.
    pub fn attach_instance(&self, id: NodeId, element: &VisualElement) -> Result<()> {
        self.with_node_mut(id, |n| {
            if n.element().is_some() {
                return Err(MotionError::AlreadyMounted(id.0));
            }
            n.element = Some(element.downgrade());
            n.is_layout_dirty = true;
            Ok(())
        })
        .ok_or(MotionError::NodeNotFound(id.0))?
    }

    /// Remove `id` and its subtree.
    pub fn unmount(&self, id: NodeId) {
        let ids = subtree(&self.inner.nodes.borrow(), id);
        for id in ids.into_iter().rev() {
            self.remove_node(id);
        }
    }

    fn remove_node(&self, id: NodeId) {
        let removed = {
            let mut nodes = self.inner.nodes.borrow_mut();
            let Some(removed) = nodes.get_mut(id.0).and_then(Option::take) else {
                return;
            };
            for other in nodes.iter_mut().flatten() {
                other.children.retain(|c| *c != id);
                if other.resume_from == Some(id) {
                    other.resume_from = None;
                }
                if other.resuming_from == Some(id) {
                    other.resuming_from = None;
                }
                if other.relative_parent == Some(id) {
                    other.relative_parent = None;
                    other.relative_target = None;
                }
            }
            removed
        };
        if let Some(job) = &removed.pending_start {
            self.inner.ctx.scheduler().cancel(job);
        }
        if let Some(progress) = &removed.progress {
            progress.destroy();
        }
        if let Some(element) = removed.element() {
            element.set_projection_styles(None);
        }
        if let Some(layout_id) = &removed.options.layout_id {
            let promotion = {
                let mut stacks = self.inner.stacks.borrow_mut();
                let promotion = stacks.get_mut(layout_id).and_then(|s| s.remove(id));
                if stacks.get(layout_id).is_some_and(SharedStack::is_empty) {
                    stacks.remove(layout_id);
                }
                promotion
            };
            if let Some(promotion) = promotion {
                self.apply_promotion(promotion);
            }
        }
        debug!(node = id.0, "unmounted projection node");
    }

    /// Replace a node's options, moving it between shared stacks if its
    /// `layout_id` changed.
    pub fn set_options(&self, id: NodeId, options: ProjectionOptions) -> Result<()> {
        let previous = self
            .with_node_mut(id, |n| std::mem::replace(&mut n.options, options.clone()))
            .ok_or(MotionError::NodeNotFound(id.0))?;
        if previous.layout_id != options.layout_id {
            if let Some(layout_id) = &previous.layout_id {
                let promotion = self.inner.stacks.borrow_mut().get_mut(layout_id).and_then(|s| s.remove(id));
                if let Some(promotion) = promotion {
                    self.apply_promotion(promotion);
                }
            }
            self.register_shared(id);
        }
        Ok(())
    }

    fn register_shared(&self, id: NodeId) {
        let Some(Some(layout_id)) = self.with_node(id, |n| n.options.layout_id.clone()) else {
            return;
        };
        let promotion = {
            let mut stacks = self.inner.stacks.borrow_mut();
            let stack = stacks.entry(layout_id).or_default();
            stack.add(id);
            stack.promote(id)
        };
        if let Some(promotion) = promotion {
            self.apply_promotion(promotion);
        }
    }

    // --- update cycle ---

    /// Snapshot `id` and its subtree before the host changes layout.
    pub fn will_update(&self, id: NodeId) {
        if self.inner.update_blocked.get() {
            return;
        }
        self.inner.is_updating.set(true);
        let ids = subtree(&self.inner.nodes.borrow(), id);
        for id in ids {
            let has_snapshot = self.with_node_mut(id, |n| {
                n.is_layout_dirty = true;
                n.snapshot.is_some()
            });
            if has_snapshot == Some(false) {
                if let Some(snapshot) = self.measure(id) {
                    trace!(node = id.0, ?snapshot.layout_box, "snapshot");
                    self.with_node_mut(id, |n| n.snapshot = Some(snapshot));
                }
            }
        }
    }

    /// Measure dirty nodes after the host committed layout and start layout
    /// animations for everything that moved.
    pub fn did_update(&self) {
        self.inner.is_updating.set(false);
        if self.inner.update_blocked.get() {
            debug!("layout update blocked, discarding snapshots");
            self.clear_snapshots();
            return;
        }

        let dirty: Vec<(NodeId, VisualElement)> = {
            let nodes = self.inner.nodes.borrow();
            depth_order(&nodes)
                .into_iter()
                .filter_map(|id| {
                    let n = node(&nodes, id)?;
                    if !n.is_layout_dirty {
                        return None;
                    }
                    n.element().map(|e| (id, e))
                })
                .collect()
        };

        for (_, element) in &dirty {
            element.set_projection_styles(None);
            element.render();
        }

        let mut measured = Vec::new();
        for (id, _) in &dirty {
            let Some(layout) = self.measure(*id) else {
                continue;
            };
            let layout_box = layout.layout_box;
            self.with_node_mut(*id, |n| {
                n.layout = Some(layout);
                n.is_layout_dirty = false;
                n.projection_delta = None;
            });
            self.emit(ProjectionEvent::Measure { node: *id, layout: layout_box });
            measured.push(*id);
        }

        let mut actions = Vec::new();
        {
            let mut nodes = self.inner.nodes.borrow_mut();
            let stacks = self.inner.stacks.borrow();
            let mut events = Vec::new();
            for id in &measured {
                if let Some(action) = self.notify_layout_update(&mut nodes, &stacks, *id, &mut events) {
                    actions.push((*id, action));
                }
            }
            for n in nodes.iter_mut().flatten() {
                n.snapshot = None;
                n.resume_from = None;
            }
            self.inner.events.borrow_mut().extend(events);
        }

        for (id, action) in actions {
            match action {
                LayoutAction::Start(transition) => self.start_animation(id, transition),
                LayoutAction::Settle { finish, exit } => {
                    if finish {
                        self.finish_animation(id);
                    }
                    if exit {
                        self.exit_complete(id);
                    }
                }
            }
        }

        self.schedule_update_projection();
        self.inner
            .ctx
            .scheduler()
            .flush_steps(&[Phase::Update, Phase::PreRender, Phase::Render]);
    }

    fn clear_snapshots(&self) {
        for n in self.inner.nodes.borrow_mut().iter_mut().flatten() {
            n.snapshot = None;
            n.resume_from = None;
        }
    }

    /// Ignore layout updates until [`Self::unblock_update`].
    pub fn block_update(&self) {
        self.inner.update_blocked.set(true);
    }

    pub fn unblock_update(&self) {
        self.inner.update_blocked.set(false);
    }

    pub fn is_update_blocked(&self) -> bool {
        self.inner.update_blocked.get()
    }

    /// Prevent `id` and its descendants from starting layout animations.
    /// Layout still updates; it just snaps.
    pub fn set_animation_blocked(&self, id: NodeId, blocked: bool) {
        self.with_node_mut(id, |n| n.is_animation_blocked = blocked);
    }

    /// Record the scroll offset of a scroll container (or the root).
    pub fn update_scroll(&self, id: NodeId) {
        let Some(Some(element)) = self.with_node(id, ProjectionNode::element) else {
            return;
        };
        let scroll = element.adapter().measure_scroll();
        self.with_node_mut(id, |n| n.scroll = Some(scroll));
    }

    fn measure(&self, id: NodeId) -> Option<Measurements> {
        let element = self.with_node(id, ProjectionNode::element).flatten()?;
        let viewport_box = match element.measure_viewport_box() {
            Ok(rect) => rect,
            Err(err) => {
                warn!(node = id.0, error = %err, "skipping layout measurement");
                return None;
            }
        };
        let latest_values = element.latest_values();

        let nodes = self.inner.nodes.borrow();
        let path = ancestors(&nodes, id);
        let root = path.first().copied().unwrap_or(id);

        let mut measured_box = viewport_box;
        if let Some(scroll) = node(&nodes, root).and_then(|n| n.scroll) {
            measured_box.translate(scroll);
        }

        let mut layout_box = measured_box;
        for ancestor in path.iter().filter(|a| **a != root).filter_map(|a| node(&nodes, *a)) {
            if ancestor.options.layout_scroll {
                if let Some(scroll) = ancestor.scroll {
                    layout_box.translate(scroll);
                }
            }
        }
        for ancestor in path.iter().filter_map(|a| node(&nodes, *a)) {
            let transform = TransformValues::from_values(&ancestor.latest_values());
            if transform.has_scale() || transform.has_2d_translate() {
                let origin_box = ancestor.snapshot.as_ref().map(|s| s.layout_box);
                layout_box.remove_transform(&transform, origin_box.as_ref(), None);
            }
        }
        let own = TransformValues::from_values(&latest_values);
        if own.has_scale() || own.has_2d_translate() {
            layout_box.remove_transform(&own, None, None);
        }
        round_rect(&mut layout_box);

        Some(Measurements {
            measured_box,
            layout_box,
            latest_values,
            source: id,
        })
    }

    fn notify_layout_update(&self, nodes: &mut Nodes, stacks: &Stacks, id: NodeId, events: &mut Vec<ProjectionEvent>) -> Option<LayoutAction> {
        let (mut snapshot, layout, mode, resume_from) = {
            let n = node(nodes, id)?;
            (n.snapshot.clone()?, n.layout.clone()?, n.options.layout, n.resume_from)
        };
        let is_shared = snapshot.source != layout.source;
        let layout_box = layout.layout_box;

        if mode == Some(LayoutAnimation::Size) {
            let source = if is_shared { &mut snapshot.measured_box } else { &mut snapshot.layout_box };
            for (axis, layout_axis) in [(&mut source.x, layout_box.x), (&mut source.y, layout_box.y)] {
                let length = axis.length();
                axis.min = layout_axis.min;
                axis.max = axis.min + length;
            }
        } else if animates_position_only(mode, &snapshot.layout_box, &layout_box) {
            let source = if is_shared { &mut snapshot.measured_box } else { &mut snapshot.layout_box };
            for (axis, layout_axis) in [(&mut source.x, layout_box.x), (&mut source.y, layout_box.y)] {
                axis.max = axis.min + layout_axis.length();
            }
        }

        let layout_delta = Delta::between(&layout_box, &snapshot.layout_box, CENTER);
        let delta = if is_shared {
            Delta::between(&layout.measured_box, &snapshot.measured_box, CENTER)
        } else {
            layout_delta
        };
        let has_layout_changed = !layout_delta.is_zero();

        let mut has_relative_layout_changed = false;
        if resume_from.is_none() {
            let relative = closest_projecting_parent(nodes, id).and_then(|parent_id| {
                let parent = node(nodes, parent_id)?;
                if parent.resume_from.is_some() {
                    return None;
                }
                let (parent_snapshot, parent_layout) = (parent.snapshot.as_ref()?, parent.layout.as_ref()?);
                Some((
                    parent_id,
                    parent.options.layout_root,
                    snapshot.layout_box.relative_to(&parent_snapshot.layout_box),
                    layout_box.relative_to(&parent_layout.layout_box),
                ))
            });
            if let Some((parent_id, parent_is_root, relative_snapshot, relative_layout)) = relative {
                has_relative_layout_changed = !relative_snapshot.equals_rounded(&relative_layout);
                if parent_is_root {
                    let n = node_mut(nodes, id)?;
                    n.relative_target = Some(relative_layout);
                    n.relative_target_origin = Some(relative_snapshot);
                    n.relative_parent = Some(parent_id);
                }
            }
        }

        events.push(ProjectionEvent::DidUpdate {
            node: id,
            delta,
            layout_delta,
            has_layout_changed,
            has_relative_layout_changed,
        });

        let n = node(nodes, id)?;
        if !n.options.animates_layout() {
            return None;
        }
        if is_animation_blocked(nodes, id) {
            let n = node_mut(nodes, id)?;
            n.target = None;
            n.relative_target = None;
            n.target_layout = Some(layout_box);
            return Some(LayoutAction::Settle { finish: false, exit: false });
        }

        let transition = n
            .options
            .transition
            .clone()
            .unwrap_or_else(|| default_layout_transition(&self.inner.ctx.config().layout));
        let target_changed = n.target_layout.is_none_or(|t| !t.equals_rounded(&layout_box));
        let only_relative = !has_layout_changed && has_relative_layout_changed;
        let should_animate = n.options.layout_root
            || resume_from.is_some()
            || only_relative
            || (has_layout_changed && (target_changed || n.current_animation.is_none()));

        let action = if should_animate {
            if let Some(resume) = resume_from {
                if let Some(resumed) = node_mut(nodes, resume) {
                    resumed.resuming_from = None;
                }
                if let Some(n) = node_mut(nodes, id) {
                    n.resuming_from = Some(resume);
                }
            }
            self.set_animation_origin(nodes, stacks, id, delta, only_relative, is_shared, snapshot.latest_values.clone());
            LayoutAction::Start(transition)
        } else {
            LayoutAction::Settle {
                finish: !has_layout_changed,
                exit: !n.is_present && lead_of(nodes, stacks, id) == id,
            }
        };

        node_mut(nodes, id)?.target_layout = Some(layout_box);
        Some(action)
    }

    #[allow(clippy::too_many_arguments)]
    fn set_animation_origin(
        &self,
        nodes: &mut Nodes,
        stacks: &Stacks,
        id: NodeId,
        delta: Delta,
        only_relative: bool,
        is_shared: bool,
        snapshot_values: Values,
    ) {
        let crossfade_in_ancestor = ancestors(nodes, id).into_iter().any(|a| {
            node(nodes, a)
                .and_then(|n| n.animation_values.as_ref())
                .is_some_and(|v| v.contains_key("opacityExit"))
        });
        let Some(n) = node(nodes, id) else {
            return;
        };
        let is_only_member = n
            .options
            .layout_id
            .as_ref()
            .and_then(|layout_id| stacks.get(layout_id))
            .is_none_or(|s| s.len() <= 1);
        let parent_is_root = n
            .relative_parent
            .and_then(|p| node(nodes, p))
            .is_some_and(|p| p.options.layout_root);

        let Some(n) = node_mut(nodes, id) else {
            return;
        };
        if !parent_is_root {
            n.relative_target = None;
            n.relative_target_origin = None;
        }
        n.attempt_relative_target = !only_relative;
        n.animation_progress = 0.0;
        n.animation_origin = Some(AnimationOrigin {
            delta,
            snapshot_values,
            is_shared,
            crossfade_opacity: is_shared && !is_only_member && n.options.crossfade && !crossfade_in_ancestor,
            is_only_member,
        });
        let start = if n.options.layout_root { PROGRESS_END } else { 0.0 };
        mix_target_delta(nodes, id, start);
    }

    // --- layout animations ---

    fn start_animation(&self, id: NodeId, transition: Transition) {
        let weak = self.downgrade();
        let job = self.inner.ctx.scheduler().update(move |_| {
            if let Some(inner) = weak.upgrade() {
                ProjectionTree { inner }.run_layout_animation(id, &transition);
            }
        });
        let previous = self.with_node_mut(id, |n| n.pending_start.replace(job)).flatten();
        if let Some(previous) = previous {
            self.inner.ctx.scheduler().cancel(&previous);
        }
        self.emit(ProjectionEvent::AnimationStart { node: id });
    }

    fn run_layout_animation(&self, id: NodeId, transition: &Transition) {
        let Some(existing) = self.with_node_mut(id, |n| {
            n.pending_start = None;
            n.progress.clone()
        }) else {
            return;
        };
        let progress = existing.unwrap_or_else(|| self.create_progress_value(id));

        let controls = animate_motion_value(
            &self.inner.ctx,
            "layout",
            &progress,
            vec![0.0, PROGRESS_END].into(),
            &transition.clone().into(),
            None,
        );

        let mut nodes = self.inner.nodes.borrow_mut();
        let resuming = node_mut(&mut nodes, id).and_then(|n| {
            n.current_animation = Some(controls.clone());
            n.resuming_from
        });
        if let Some(resumed) = resuming.and_then(|r| node_mut(&mut nodes, r)) {
            resumed.current_animation = Some(controls);
        }
    }

    fn create_progress_value(&self, id: NodeId) -> MotionValue {
        let progress = MotionValue::new(self.inner.ctx.scheduler(), 0.0);
        let weak = self.downgrade();
        progress.on_change(move |latest| {
            if let (Some(inner), Some(latest)) = (weak.upgrade(), latest.as_f64()) {
                ProjectionTree { inner }.on_progress(id, latest);
            }
        });
        let weak = self.downgrade();
        progress.on(ValueEvent::AnimationComplete, move |_| {
            if let Some(inner) = weak.upgrade() {
                ProjectionTree { inner }.complete_animation(id);
            }
        });
        self.with_node_mut(id, |n| n.progress = Some(progress.clone()));
        progress
    }

    fn on_progress(&self, id: NodeId, latest: f64) {
        mix_target_delta(&mut self.inner.nodes.borrow_mut(), id, latest);
        self.schedule_update_projection();
    }

    /// Jump a running layout animation to its end.
    pub fn finish_animation(&self, id: NodeId) {
        let running = self
            .with_node_mut(id, |n| {
                if let Some(job) = n.pending_start.take() {
                    self.inner.ctx.scheduler().cancel(&job);
                }
                n.current_animation.is_some().then(|| n.progress.clone()).flatten()
            })
            .flatten();
        if let Some(progress) = running {
            progress.stop();
            mix_target_delta(&mut self.inner.nodes.borrow_mut(), id, PROGRESS_END);
        }
        self.complete_animation(id);
    }

    fn complete_animation(&self, id: NodeId) {
        let exiting = {
            let mut nodes = self.inner.nodes.borrow_mut();
            let Some(n) = node_mut(&mut nodes, id) else {
                return;
            };
            let had_animation = n.current_animation.take().is_some();
            n.animation_values = None;
            let resuming = n.resuming_from.take();
            let layout_id = n.options.layout_id.clone();

            if let Some(resumed) = resuming.and_then(|r| node_mut(&mut nodes, r)) {
                resumed.current_animation = None;
            }
            if had_animation {
                self.emit(ProjectionEvent::AnimationComplete { node: id });
            }

            let mut exiting: Vec<NodeId> = Vec::new();
            if let Some(stack) = layout_id.as_ref().and_then(|l| self.inner.stacks.borrow().get(l).cloned()) {
                exiting.extend(stack.members().iter().copied());
            }
            exiting.extend(resuming);
            exiting.sort();
            exiting.dedup();
            exiting.retain(|m| node(&nodes, *m).is_some_and(|n| !n.is_present && n.on_exit_complete.is_some()));
            exiting
        };
        for id in exiting {
            self.exit_complete(id);
        }
        self.schedule_update_projection();
    }

    /// Call `callback` once this node's exit has finished.
    pub fn set_on_exit_complete<F: Fn() + 'static>(&self, id: NodeId, callback: F) {
        self.with_node_mut(id, |n| n.on_exit_complete = Some(Rc::new(callback)));
    }

    fn exit_complete(&self, id: NodeId) {
        let Some(callback) = self.with_node(id, |n| n.on_exit_complete.clone()) else {
            return;
        };
        self.emit(ProjectionEvent::ExitComplete { node: id });
        if let Some(callback) = callback {
            callback();
        }
    }

    // --- shared layout ---

    /// Make `id` the lead of its shared stack.
    pub fn promote(&self, id: NodeId) {
        let Some(Some(layout_id)) = self.with_node(id, |n| n.options.layout_id.clone()) else {
            return;
        };
        let promotion = self.inner.stacks.borrow_mut().entry(layout_id).or_default().promote(id);
        if let Some(promotion) = promotion {
            self.apply_promotion(promotion);
        }
    }

    /// Hand the lead back to an earlier member. Returns false when there
    /// was none to take it.
    pub fn relegate(&self, id: NodeId) -> bool {
        let Some(Some(layout_id)) = self.with_node(id, |n| n.options.layout_id.clone()) else {
            return false;
        };
        let promotion = {
            let nodes = self.inner.nodes.borrow();
            self.inner
                .stacks
                .borrow_mut()
                .get_mut(&layout_id)
                .and_then(|s| s.relegate(id, |m| node(&nodes, m).is_some_and(|n| n.is_present)))
        };
        match promotion {
            Some(promotion) => {
                self.apply_promotion(promotion);
                true
            }
            None => false,
        }
    }

    fn apply_promotion(&self, promotion: Promotion) {
        let is_updating = self.inner.is_updating.get();
        {
            let mut nodes = self.inner.nodes.borrow_mut();
            let previous = promotion.previous.and_then(|prev| {
                let n = node(&nodes, prev)?;
                let values = n.animation_values.clone().unwrap_or_else(|| n.latest_values());
                Some((prev, n.snapshot.clone(), values))
            });
            let crossfade = node(&nodes, promotion.lead).is_none_or(|n| n.options.crossfade);
            if let Some(lead) = node_mut(&mut nodes, promotion.lead) {
                lead.is_visible = true;
                if let Some((prev, snapshot, values)) = &previous {
                    lead.resume_from = Some(*prev);
                    if let Some(mut snapshot) = snapshot.clone() {
                        snapshot.latest_values = values.clone();
                        lead.snapshot = Some(snapshot);
                    }
                    if is_updating {
                        lead.is_layout_dirty = true;
                    }
                }
            }
            if !crossfade {
                if let Some(prev) = previous.and_then(|(prev, _, _)| node_mut(&mut nodes, prev)) {
                    prev.is_visible = false;
                }
            }
        }
        debug!(lead = promotion.lead.0, previous = ?promotion.previous.map(|p| p.0), "promoted shared layout lead");
        self.schedule_update_projection();
    }

    /// Mark a node as present or exiting.
    ///
    /// An exiting lead hands the lead back to the previous present member
    /// and completes its exit when that member's layout animation finishes.
    /// Otherwise the exit completes immediately.
    pub fn set_present(&self, id: NodeId, present: bool) {
        let Some(was_present) = self.with_node_mut(id, |n| std::mem::replace(&mut n.is_present, present)) else {
            return;
        };
        if present {
            if !was_present {
                self.promote(id);
            }
            return;
        }
        if self.is_lead(id) && self.relegate(id) {
            return;
        }
        self.exit_complete(id);
    }

    pub fn hide(&self, id: NodeId) {
        self.with_node_mut(id, |n| n.is_visible = false);
        self.schedule_update_projection();
    }

    pub fn show(&self, id: NodeId) {
        self.with_node_mut(id, |n| n.is_visible = true);
        self.schedule_update_projection();
    }

    // --- projection ---

    fn schedule_update_projection(&self) {
        self.inner
            .ctx
            .scheduler()
            .schedule(Phase::PreRender, self.inner.projection_job.clone(), false, true);
    }

    /// Recompute every node's target and projection, and push the resulting
    /// styles to elements.
    pub fn update_projection(&self) {
        let outputs: Vec<(VisualElement, Option<ProjectionStyles>)> = {
            let mut nodes = self.inner.nodes.borrow_mut();
            let stacks = self.inner.stacks.borrow();
            let order = depth_order(&nodes);
            for id in &order {
                resolve_target_delta(&mut nodes, *id);
            }
            let mut events = Vec::new();
            for id in &order {
                calc_projection(&mut nodes, &stacks, *id, &mut events);
            }
            self.inner.events.borrow_mut().extend(events);
            order
                .iter()
                .filter_map(|id| {
                    let n = node(&nodes, *id)?;
                    if !n.options.animates_layout() {
                        return None;
                    }
                    Some((n.element()?, projection_styles(&nodes, &stacks, *id)))
                })
                .collect()
        };
        for (element, styles) in outputs {
            if element.projection_styles() != styles {
                element.set_projection_styles(styles);
            }
        }
    }

    // --- queries ---

    pub fn len(&self) -> usize {
        self.inner.nodes.borrow().iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.with_node(id, |_| ()).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.with_node(id, |n| n.parent).flatten()
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.with_node(id, |n| n.children.clone()).unwrap_or_default()
    }

    pub fn layout(&self, id: NodeId) -> Option<Measurements> {
        self.with_node(id, |n| n.layout.clone()).flatten()
    }

    pub fn snapshot(&self, id: NodeId) -> Option<Measurements> {
        self.with_node(id, |n| n.snapshot.clone()).flatten()
    }

    /// The box the node is currently projected into.
    pub fn target(&self, id: NodeId) -> Option<Rect> {
        self.with_node(id, |n| n.target).flatten()
    }

    pub fn projection_delta(&self, id: NodeId) -> Option<Delta> {
        self.with_node(id, |n| n.projection_delta).flatten()
    }

    /// Product of every ancestor's projection scale.
    pub fn tree_scale(&self, id: NodeId) -> Option<Point> {
        self.with_node(id, |n| n.tree_scale)
    }

    /// The projection transform without the element's own transforms.
    pub fn projection_transform(&self, id: NodeId) -> Option<String> {
        self.with_node(id, |n| n.projection_transform.clone()).flatten()
    }

    /// Layout animation progress in [0, 1].
    pub fn animation_progress(&self, id: NodeId) -> Option<f64> {
        self.with_node(id, |n| n.animation_progress)
    }

    pub fn is_animating(&self, id: NodeId) -> bool {
        self.with_node(id, ProjectionNode::is_animating).unwrap_or(false)
    }

    pub fn is_present(&self, id: NodeId) -> bool {
        self.with_node(id, |n| n.is_present).unwrap_or(false)
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        self.with_node(id, |n| n.is_visible).unwrap_or(false)
    }

    pub fn is_lead(&self, id: NodeId) -> bool {
        let nodes = self.inner.nodes.borrow();
        node(&nodes, id).is_some() && lead_of(&nodes, &self.inner.stacks.borrow(), id) == id
    }

    /// Current lead of the stack for `layout_id`.
    pub fn lead_for(&self, layout_id: &str) -> Option<NodeId> {
        self.inner.stacks.borrow().get(layout_id).and_then(SharedStack::lead)
    }

    /// The styles the projection would write for `id` right now.
    pub fn styles(&self, id: NodeId) -> Option<ProjectionStyles> {
        projection_styles(&self.inner.nodes.borrow(), &self.inner.stacks.borrow(), id)
    }

    /// Drain events recorded since the last call.
    pub fn drain_events(&self) -> Vec<ProjectionEvent> {
        self.inner.events.borrow_mut().drain(..).collect()
    }
}

/// Blend the node's target delta (and shared values) towards identity.
fn mix_target_delta(nodes: &mut Nodes, id: NodeId, latest: f64) {
    let p = latest / PROGRESS_END;
    let Some(n) = node(nodes, id) else {
        return;
    };
    let parent_layout = n
        .relative_parent
        .and_then(|p| node(nodes, p))
        .and_then(|p| p.layout.as_ref())
        .map(|l| l.layout_box);
    let lead_values = n.latest_values();

    let Some(n) = node_mut(nodes, id) else {
        return;
    };
    let Some(origin) = n.animation_origin.clone() else {
        return;
    };
    n.target_delta = Some(Delta {
        x: origin.delta.x.mix_to_identity(p),
        y: origin.delta.y.mix_to_identity(p),
    });
    if let (Some(_), Some(relative_origin), Some(layout), Some(parent_layout)) =
        (n.relative_target, n.relative_target_origin, n.layout.as_ref(), parent_layout)
    {
        let relative_layout = layout.layout_box.relative_to(&parent_layout);
        n.relative_target = Some(Rect::mix(&relative_origin, &relative_layout, p));
    }
    if origin.is_shared {
        let mut values = lead_values.clone();
        mix_values(
            &mut values,
            &origin.snapshot_values,
            &lead_values,
            p,
            origin.crossfade_opacity,
            origin.is_only_member,
        );
        n.animation_values = Some(values);
    }
    n.animation_progress = p;
}

fn resolve_target_delta(nodes: &mut Nodes, id: NodeId) {
    let Some(n) = node(nodes, id) else {
        return;
    };
    if !n.options.animates_layout() {
        return;
    }
    let Some(layout_box) = n.layout.as_ref().map(|l| l.layout_box) else {
        return;
    };

    if n.target_delta.is_none() && n.relative_target.is_none() {
        let progress = n.animation_progress;
        let parent = closest_projecting_parent(nodes, id)
            .and_then(|p| Some((p, node(nodes, p)?.layout.as_ref()?.layout_box)));
        let Some(n) = node_mut(nodes, id) else {
            return;
        };
        match parent {
            Some((parent_id, parent_layout)) if progress != 1.0 => {
                let origin = layout_box.relative_to(&parent_layout);
                n.relative_parent = Some(parent_id);
                n.relative_target_origin = Some(origin);
                n.relative_target = Some(origin);
            }
            _ => {
                n.relative_parent = None;
                n.relative_target = None;
            }
        }
    }

    let Some(n) = node(nodes, id) else {
        return;
    };
    if n.relative_target.is_none() && n.target_delta.is_none() {
        return;
    }
    let parent_target = n.relative_parent.and_then(|p| node(nodes, p)).and_then(|p| p.target);
    let target = match (n.relative_target, n.relative_target_origin, parent_target) {
        (Some(relative), Some(_), Some(parent_target)) => Rect::resolve_relative(&relative, &parent_target),
        _ => {
            let mut target = layout_box;
            if n.resuming_from.is_some() {
                target.apply_transform(&TransformValues::from_values(&n.latest_values()));
            }
            if let Some(delta) = &n.target_delta {
                target.apply_delta(delta);
            }
            target
        }
    };
    let attempt_relative = n.attempt_relative_target;
    let is_resuming = n.resuming_from.is_some();
    let progress = n.animation_progress;

    let relative = if attempt_relative {
        closest_projecting_parent(nodes, id).and_then(|p| {
            let parent = node(nodes, p)?;
            let eligible = parent.resuming_from.is_some() == is_resuming && !parent.options.layout_scroll && progress != 1.0;
            eligible.then_some((p, parent.target?))
        })
    } else {
        None
    };

    let Some(n) = node_mut(nodes, id) else {
        return;
    };
    n.target = Some(target);
    if attempt_relative {
        n.attempt_relative_target = false;
        match relative {
            Some((parent_id, parent_target)) => {
                let origin = target.relative_to(&parent_target);
                n.relative_parent = Some(parent_id);
                n.relative_target_origin = Some(origin);
                n.relative_target = Some(origin);
            }
            None => {
                n.relative_parent = None;
                n.relative_target = None;
            }
        }
    }
}

fn calc_projection(nodes: &mut Nodes, stacks: &Stacks, id: NodeId, events: &mut Vec<ProjectionEvent>) {
    let Some(n) = node(nodes, id) else {
        return;
    };
    if !n.options.animates_layout() {
        return;
    }
    let Some(layout) = n.layout.as_ref() else {
        return;
    };
    let layout_box = layout.layout_box;
    let own_values = n.latest_values();
    let own_mode = n.options.layout;

    let lead_id = lead_of(nodes, stacks, id);
    let is_shared = lead_id != id || node(nodes, lead_id).is_some_and(|l| l.resuming_from.is_some());

    let path = ancestors(nodes, id);
    let transforms: Vec<TransformValues> = path
        .iter()
        .map(|a| node(nodes, *a).map(|n| TransformValues::from_values(&n.latest_values())).unwrap_or_default())
        .collect();
    let mut corrected = layout_box;
    let tree_scale = {
        let steps: Vec<TreeStep<'_>> = path
            .iter()
            .zip(&transforms)
            .filter_map(|(a, transform)| {
                let ancestor = node(nodes, *a)?;
                Some(TreeStep {
                    delta: ancestor.projection_delta.as_ref(),
                    scroll: ancestor.scroll.filter(|_| ancestor.options.layout_scroll),
                    transform: Some(transform),
                })
            })
            .collect();
        apply_tree_deltas(&mut corrected, &steps, is_shared)
    };

    let lead_target = {
        let Some(lead) = node_mut(nodes, lead_id) else {
            return;
        };
        if lead.target.is_none() && (tree_scale.x != 1.0 || tree_scale.y != 1.0) {
            lead.target = lead.layout.as_ref().map(|l| l.layout_box);
        }
        lead.target
    };
    let Some(mut target) = lead_target else {
        if let Some(n) = node_mut(nodes, id) {
            n.tree_scale = tree_scale;
            n.projection_delta = None;
            n.projection_transform = None;
        }
        return;
    };

    let (lead_layout, lead_values) = match node(nodes, lead_id) {
        Some(lead) => (lead.layout.as_ref().map(|l| l.layout_box), lead.latest_values()),
        None => return,
    };
    if lead_id != id {
        if let Some(lead_layout) = lead_layout {
            if animates_position_only(own_mode, &layout_box, &lead_layout) {
                target.x.max = target.x.min + layout_box.x.length();
                target.y.max = target.y.min + layout_box.y.length();
            }
        }
    }

    let own_transform = TransformValues::from_values(&own_values);
    let origin = Point::new(own_transform.origin_x, own_transform.origin_y);
    let delta = Delta::between(&corrected, &target, origin);
    let mut with_transforms = target;
    with_transforms.apply_transform(&TransformValues::from_values(&lead_values));
    let delta_with_transform = Delta::between(&corrected, &with_transforms, origin);
    let transform = build_projection_transform(&delta, tree_scale, None);

    let Some(n) = node_mut(nodes, id) else {
        return;
    };
    let changed = n.projection_transform.as_deref() != Some(transform.as_str()) || n.tree_scale != tree_scale;
    n.tree_scale = tree_scale;
    n.projection_delta = Some(delta);
    n.projection_delta_with_transform = delta_with_transform;
    n.projection_transform = Some(transform);
    if changed {
        events.push(ProjectionEvent::ProjectionUpdate { node: id, target });
    }
}

fn projection_styles(nodes: &Nodes, stacks: &Stacks, id: NodeId) -> Option<ProjectionStyles> {
    let n = node(nodes, id)?;
    if !n.is_visible {
        return Some(ProjectionStyles::hidden());
    }
    let lead_id = lead_of(nodes, stacks, id);
    let lead = node(nodes, lead_id)?;
    let delta = n.projection_delta?;
    n.layout.as_ref()?;
    let lead_target = lead.target?;

    let values = lead.animation_values.clone().unwrap_or_else(|| lead.latest_values());
    let number = |key: &str| values.get(key).and_then(AnimatableValue::as_f64);
    let with_transform = n.projection_delta_with_transform;
    let transform = build_projection_transform(&with_transform, n.tree_scale, Some(&TransformValues::from_values(&values)));
    let transform_origin = format!(
        "{}% {}% 0",
        format_number(with_transform.x.origin * 100.0),
        format_number(with_transform.y.origin * 100.0)
    );

    let opacity = match (lead_id == id, lead.animation_values.is_some()) {
        (true, true) => Some(number("opacity").unwrap_or(1.0)),
        (true, false) => number("opacity"),
        (false, true) => number("opacityExit"),
        (false, false) => Some(number("opacityExit").unwrap_or(0.0)),
    };

    Some(ProjectionStyles {
        transform,
        transform_origin: Some(transform_origin),
        opacity,
        visibility: None,
        corrected: scale_corrected_styles(&values, Some(&lead_target), &delta, n.tree_scale),
    })
}
