//! Animation lifecycle events.
//!
//! Elements record an event whenever one of their values starts, completes
//! or cancels an animation. Hosts drain the queue after a frame to drive
//! callbacks such as `onAnimationComplete`.

use crate::element::ElementId;
use crate::types::AnimationId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A lifecycle event for one animated key of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnimationEvent {
    Started {
        animation_id: AnimationId,
        element_id: ElementId,
        key: String,
    },
    /// The animation ran to its end.
    Completed {
        animation_id: AnimationId,
        element_id: ElementId,
        key: String,
    },
    /// The animation was stopped or replaced before finishing.
    Cancelled {
        animation_id: AnimationId,
        element_id: ElementId,
        key: String,
    },
}

impl AnimationEvent {
    pub fn animation_id(&self) -> AnimationId {
        match self {
            Self::Started { animation_id, .. }
            | Self::Completed { animation_id, .. }
            | Self::Cancelled { animation_id, .. } => *animation_id,
        }
    }

    pub fn element_id(&self) -> ElementId {
        match self {
            Self::Started { element_id, .. }
            | Self::Completed { element_id, .. }
            | Self::Cancelled { element_id, .. } => *element_id,
        }
    }

    /// The style key that was animating.
    pub fn key(&self) -> &str {
        match self {
            Self::Started { key, .. } | Self::Completed { key, .. } | Self::Cancelled { key, .. } => key,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// FIFO of pending lifecycle events.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<AnimationEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: AnimationEvent) {
        self.events.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn pop(&mut self) -> Option<AnimationEvent> {
        self.events.pop_front()
    }

    /// Drain all events from the queue, returning an iterator.
    pub fn drain(&mut self) -> impl Iterator<Item = AnimationEvent> + '_ {
        self.events.drain(..)
    }

    /// Events recorded for `key`.
    pub fn events_for_key(&self, key: &str) -> Vec<&AnimationEvent> {
        self.events.iter().filter(|e| e.key() == key).collect()
    }
}
