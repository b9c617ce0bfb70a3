//! Frame pipeline: dirty-driven recomputation and frame events.
//!
//! One call to [`FramePipeline::run`] per display tick:
//! 1. traversal recomputes sort caches, world transforms and bounds, and
//!    collects which shapes changed since the last completed frame
//! 2. if anything changed, observers get `begin_frame` / `render` /
//!    `end_frame` notifications and render order is (re)assigned
//! 3. dirty flags are cleared and the frame is committed
//!
//! A run over a clean graph is free: `rendered` is false, the event sets are
//! empty, and observers are not called.

mod events;
mod pipeline;

pub use events::{FrameObserver, FrameOutput};
pub use pipeline::FramePipeline;
