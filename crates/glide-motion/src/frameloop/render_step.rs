//! A single phase queue of the frame loop.
//!
//! Each step keeps two queues. Jobs scheduled while the step is running land
//! in the next-frame queue unless they ask to run immediately, which is what
//! stops a self-rescheduling job from looping forever inside one frame.

use super::Process;
use std::rc::Rc;

#[inline]
pub(crate) fn same_process(a: &Process, b: &Process) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

fn contains(queue: &[Process], process: &Process) -> bool {
    queue.iter().any(|p| same_process(p, process))
}

#[derive(Default)]
pub(crate) struct RenderStep {
    this_frame: Vec<Process>,
    next_frame: Vec<Process>,
    keep_alive: Vec<Process>,
    is_processing: bool,
    flush_next_frame: bool,
}

impl RenderStep {
    /// Queue `process`; a job already queued is not added twice.
    pub fn schedule(&mut self, process: Process, keep_alive: bool, immediate: bool) {
        if keep_alive && !contains(&self.keep_alive, &process) {
            self.keep_alive.push(process.clone());
        }
        let queue = if immediate && self.is_processing {
            &mut self.this_frame
        } else {
            &mut self.next_frame
        };
        if !contains(queue, &process) {
            queue.push(process);
        }
    }

    pub fn cancel(&mut self, process: &Process) {
        self.next_frame.retain(|p| !same_process(p, process));
        self.keep_alive.retain(|p| !same_process(p, process));
    }

    pub fn is_scheduled(&self, process: &Process) -> bool {
        contains(&self.next_frame, process) || contains(&self.this_frame, process)
    }

    pub fn has_pending(&self) -> bool {
        !self.next_frame.is_empty()
    }

    /// Swap the queues. Returns false when the step is already running, in
    /// which case it will run again once the current pass finishes.
    pub fn begin(&mut self) -> bool {
        if self.is_processing {
            self.flush_next_frame = true;
            return false;
        }
        self.is_processing = true;
        std::mem::swap(&mut self.this_frame, &mut self.next_frame);
        true
    }

    /// Job at `index` of the running queue, and whether it is kept alive.
    pub fn job(&self, index: usize) -> Option<(Process, bool)> {
        self.this_frame
            .get(index)
            .map(|p| (p.clone(), contains(&self.keep_alive, p)))
    }

    /// Finish the pass. Returns true when another pass was requested.
    pub fn end(&mut self) -> bool {
        self.this_frame.clear();
        self.is_processing = false;
        std::mem::take(&mut self.flush_next_frame)
    }
}

