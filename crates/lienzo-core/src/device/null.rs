use std::cell::Cell;

use super::api::{BufferDesc, BufferUsage, Device, Draw, TextureDesc};

/// Backend that performs no work and counts everything.
///
/// Used by batching and frame tests: draw and pass counts prove when GPU
/// work happens, resource counters prove teardown released everything.
#[derive(Default)]
pub struct NullDevice {
    next_id: Cell<u64>,
    live: Cell<usize>,
    created: Cell<usize>,
    writes: Cell<usize>,
    draws: Cell<usize>,
    passes: Cell<usize>,
}

#[derive(Debug)]
pub struct NullBuffer {
    pub id: u64,
    pub usage: BufferUsage,
    pub size: u64,
}

#[derive(Debug)]
pub struct NullTexture {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

/// Draws recorded since `begin_pass`.
#[derive(Debug, Default)]
pub struct NullPass {
    pub draws: usize,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Total draws across all submitted passes.
    pub fn draw_count(&self) -> usize {
        self.draws.get()
    }

    pub fn pass_count(&self) -> usize {
        self.passes.get()
    }

    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Resources ever created, destroyed or not.
    pub fn created_count(&self) -> usize {
        self.created.get()
    }
}

impl Device for NullDevice {
    type Buffer = NullBuffer;
    type Texture = NullTexture;
    type Pass = NullPass;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> NullBuffer {
        self.live.set(self.live.get() + 1);
        self.created.set(self.created.get() + 1);
        NullBuffer { id: self.bump_id(), usage: desc.usage, size: desc.size }
    }

    fn write_buffer(&self, _buffer: &NullBuffer, _offset: u64, _data: &[u8]) {
        self.writes.set(self.writes.get() + 1);
    }

    fn destroy_buffer(&self, _buffer: NullBuffer) {
        self.live.set(self.live.get() - 1);
    }

    fn create_texture(&self, desc: &TextureDesc<'_>) -> NullTexture {
        self.live.set(self.live.get() + 1);
        self.created.set(self.created.get() + 1);
        NullTexture { id: self.bump_id(), width: desc.width, height: desc.height }
    }

    fn write_texture(&self, _texture: &NullTexture, _data: &[u8]) {
        self.writes.set(self.writes.get() + 1);
    }

    fn destroy_texture(&self, _texture: NullTexture) {
        self.live.set(self.live.get() - 1);
    }

    fn begin_pass(&self, _label: &str) -> NullPass {
        NullPass::default()
    }

    fn draw(&self, pass: &mut NullPass, _draw: Draw<'_, Self>) {
        pass.draws += 1;
        self.draws.set(self.draws.get() + 1);
    }

    fn submit_pass(&self, _pass: NullPass) {
        self.passes.set(self.passes.get() + 1);
    }

    fn outstanding_resources(&self) -> usize {
        self.live.get()
    }
}
