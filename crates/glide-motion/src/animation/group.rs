//! Controls for several animations started together.

use super::PlaybackControls;
use crate::types::{AnimationId, AnimationState};
use std::rc::Rc;

/// Broadcasts playback commands to every member animation.
///
/// Reads come from the members too: `time` is the first member's time,
/// `duration` the longest member's, and `state` an aggregate.
#[derive(Clone)]
pub struct GroupPlaybackControls {
    id: AnimationId,
    animations: Vec<Rc<dyn PlaybackControls>>,
}

impl GroupPlaybackControls {
    pub fn new(animations: Vec<Rc<dyn PlaybackControls>>) -> Self {
        Self {
            id: AnimationId::new(),
            animations,
        }
    }

    /// A group with no members, already finished.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    pub fn animations(&self) -> &[Rc<dyn PlaybackControls>] {
        &self.animations
    }

    /// Add another animation to the group.
    pub fn push(&mut self, animation: Rc<dyn PlaybackControls>) {
        self.animations.push(animation);
    }
}

impl std::fmt::Debug for GroupPlaybackControls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupPlaybackControls")
            .field("id", &self.id)
            .field("len", &self.animations.len())
            .finish()
    }
}

impl PlaybackControls for GroupPlaybackControls {
    fn id(&self) -> AnimationId {
        self.id
    }

    fn state(&self) -> AnimationState {
        let states: Vec<_> = self.animations.iter().map(|a| a.state()).collect();
        if states.contains(&AnimationState::Running) {
            AnimationState::Running
        } else if states.contains(&AnimationState::Paused) {
            AnimationState::Paused
        } else if states.iter().all(|s| *s == AnimationState::Finished) {
            AnimationState::Finished
        } else {
            AnimationState::Idle
        }
    }

    fn time(&self) -> f64 {
        self.animations.first().map_or(0.0, |a| a.time())
    }

    fn set_time(&self, ms: f64) {
        for animation in &self.animations {
            animation.set_time(ms);
        }
    }

    fn speed(&self) -> f64 {
        self.animations.first().map_or(1.0, |a| a.speed())
    }

    fn set_speed(&self, speed: f64) {
        for animation in &self.animations {
            animation.set_speed(speed);
        }
    }

    fn duration(&self) -> f64 {
        self.animations.iter().map(|a| a.duration()).fold(0.0, f64::max)
    }

    fn play(&self) {
        for animation in &self.animations {
            animation.play();
        }
    }

    fn pause(&self) {
        for animation in &self.animations {
            animation.pause();
        }
    }

    fn stop(&self) {
        for animation in &self.animations {
            animation.stop();
        }
    }

    fn cancel(&self) {
        for animation in &self.animations {
            animation.cancel();
        }
    }

    fn complete(&self) {
        for animation in &self.animations {
            animation.complete();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Fake {
        id: AnimationId,
        state: Cell<AnimationState>,
        time: Cell<f64>,
        duration: f64,
    }

    impl Fake {
        fn new(state: AnimationState, duration: f64) -> Rc<Self> {
            Rc::new(Self {
                id: AnimationId::new(),
                state: Cell::new(state),
                time: Cell::new(0.0),
                duration,
            })
        }
    }

    impl PlaybackControls for Fake {
        fn id(&self) -> AnimationId {
            self.id
        }
        fn state(&self) -> AnimationState {
            self.state.get()
        }
        fn time(&self) -> f64 {
            self.time.get()
        }
        fn set_time(&self, ms: f64) {
            self.time.set(ms);
        }
        fn speed(&self) -> f64 {
            1.0
        }
        fn set_speed(&self, _speed: f64) {}
        fn duration(&self) -> f64 {
            self.duration
        }
        fn play(&self) {
            self.state.set(AnimationState::Running);
        }
        fn pause(&self) {
            self.state.set(AnimationState::Paused);
        }
        fn stop(&self) {
            self.state.set(AnimationState::Idle);
        }
        fn cancel(&self) {
            self.state.set(AnimationState::Idle);
        }
        fn complete(&self) {
            self.state.set(AnimationState::Finished);
        }
    }

    #[test]
    fn test_state_aggregation() {
        let a = Fake::new(AnimationState::Finished, 100.0);
        let b = Fake::new(AnimationState::Paused, 300.0);
        let group = GroupPlaybackControls::new(vec![a.clone(), b.clone()]);
        assert_eq!(group.state(), AnimationState::Paused);
        assert_eq!(group.duration(), 300.0);

        b.play();
        assert_eq!(group.state(), AnimationState::Running);

        group.complete();
        assert_eq!(group.state(), AnimationState::Finished);
        assert!(group.is_finished());
    }

    #[test]
    fn test_broadcast() {
        let a = Fake::new(AnimationState::Running, 100.0);
        let b = Fake::new(AnimationState::Running, 100.0);
        let group = GroupPlaybackControls::new(vec![a.clone(), b.clone()]);
        group.set_time(40.0);
        assert_eq!(a.time(), 40.0);
        assert_eq!(b.time(), 40.0);
        assert_eq!(group.time(), 40.0);

        group.pause();
        assert_eq!(a.state(), AnimationState::Paused);
        assert_eq!(b.state(), AnimationState::Paused);
    }

    #[test]
    fn test_empty_group() {
        let group = GroupPlaybackControls::empty();
        assert!(group.is_empty());
        assert_eq!(group.state(), AnimationState::Finished);
        assert_eq!(group.duration(), 0.0);
    }
}
