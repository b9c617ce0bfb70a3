//! Device abstraction used by the batch manager.
//!
//! Drawcalls talk to a [`Device`] trait so batching logic stays testable
//! without a GPU: [`NullDevice`] counts resources and draws, [`WgpuDevice`]
//! renders to an offscreen target through wgpu.

mod api;
mod null;
mod wgpu_device;

pub use api::{BufferDesc, BufferUsage, Device, Draw, PipelineKind, TextureDesc};
pub use null::NullDevice;
pub use wgpu_device::WgpuDevice;
