//! Explicit per-thread call stack of declaring types.
//!
//! Code that runs on behalf of a type (an extension factory, a bundle
//! callback) enters a frame for that type; the resolver walks these frames
//! innermost first. Frames are popped by guard drop, so the stack unwinds
//! with the real one even on early return or panic.

use crate::namespace::TypeDescriptor;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

thread_local! {
    static FRAMES: RefCell<Vec<Arc<TypeDescriptor>>> = const { RefCell::new(Vec::new()) };
}

/// Snapshot of frames, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStack {
    frames: Vec<Arc<TypeDescriptor>>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the calling thread's frames.
    pub fn current() -> Self {
        let frames = FRAMES
            .try_with(|frames| frames.borrow().clone())
            .unwrap_or_default();
        Self { frames }
    }

    /// Appends a frame as the new innermost caller.
    pub fn with_frame(mut self, frame: impl Into<Arc<TypeDescriptor>>) -> Self {
        self.frames.push(frame.into());
        self
    }

    /// Frames from the most recent caller outwards.
    pub fn innermost_first(&self) -> impl Iterator<Item = &Arc<TypeDescriptor>> {
        self.frames.iter().rev()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Pops the frame pushed by [`enter_frame`] when dropped.
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct FrameGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        let _ = FRAMES.try_with(|frames| frames.borrow_mut().truncate(self.depth));
    }
}

/// Pushes `frame` as the calling thread's innermost frame.
pub fn enter_frame(frame: Arc<TypeDescriptor>) -> FrameGuard {
    let depth = FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        let depth = frames.len();
        frames.push(frame);
        depth
    });
    FrameGuard {
        depth,
        _not_send: PhantomData,
    }
}

struct StackSwap {
    previous: Option<Vec<Arc<TypeDescriptor>>>,
}

impl Drop for StackSwap {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let _ = FRAMES.try_with(|frames| *frames.borrow_mut() = previous);
        }
    }
}

/// Runs `f` with `stack` installed as the thread's frames, then restores the
/// previous frames.
pub fn with_stack<R>(stack: &CallStack, f: impl FnOnce() -> R) -> R {
    let previous = FRAMES.with(|frames| frames.replace(stack.frames.clone()));
    let _swap = StackSwap {
        previous: Some(previous),
    };
    f()
}
