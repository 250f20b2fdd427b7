//! Per-frame reusable GPU resources.
//!
//! Frame protocol: `cycle()` first, then any number of `acquire` calls,
//! then `gc()`. Handles returned by `acquire` must not be kept past the
//! next `cycle()`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result, ResultExt};
use crate::gpu::{BufferUsage, RenderDevice, TextureDesc, TextureFormat, TextureUsage};

pub struct ResourcePool<K, R> {
    backup: BTreeMap<K, Vec<Arc<R>>>,
    in_use: Vec<(K, Arc<R>)>,
}

impl<K: Ord + Copy + std::fmt::Debug, R> ResourcePool<K, R> {
    pub fn new() -> Self {
        Self {
            backup: BTreeMap::new(),
            in_use: Vec::new(),
        }
    }

    /// Returns every in-use resource to its free bucket.
    pub fn cycle(&mut self) {
        for (key, resource) in self.in_use.drain(..) {
            self.backup.entry(key).or_default().push(resource);
        }
    }

    pub fn acquire(&mut self, key: K, create: impl FnOnce(&K) -> Result<R>) -> Result<Arc<R>> {
        let reused = self.backup.get_mut(&key).and_then(Vec::pop);
        let resource = match reused {
            Some(resource) => resource,
            None => {
                log::debug!("pool miss for {key:?}, allocating");
                Arc::new(create(&key).with_context(|| format!("pooled allocation {key:?}"))?)
            }
        };

        self.in_use.push((key, resource.clone()));
        Ok(resource)
    }

    /// Drops free resources that were not reused since the last `cycle()`.
    pub fn gc(&mut self) {
        let dropped: usize = self.backup.values().map(Vec::len).sum();
        if dropped > 0 {
            log::debug!("pool gc dropped {dropped} resources");
        }
        self.backup.clear();
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.len()
    }

    pub fn free_count(&self) -> usize {
        self.backup.values().map(Vec::len).sum()
    }
}

impl<K: Ord + Copy + std::fmt::Debug, R> Default for ResourcePool<K, R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Buffers keyed by (usage, size in bytes).
pub struct BufferPool<D: RenderDevice> {
    pool: ResourcePool<(BufferUsage, u64), D::Buffer>,
}

impl<D: RenderDevice> BufferPool<D> {
    pub fn new() -> Self {
        Self {
            pool: ResourcePool::new(),
        }
    }

    pub fn cycle(&mut self) {
        self.pool.cycle();
    }

    pub fn acquire(&mut self, device: &D, usage: BufferUsage, size: u64) -> Result<Arc<D::Buffer>> {
        self.pool
            .acquire((usage, size), |&(usage, size)| device.create_buffer(usage, size))
    }

    pub fn gc(&mut self) {
        self.pool.gc();
    }

    pub fn in_use_count(&self) -> usize {
        self.pool.in_use_count()
    }

    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }
}

impl<D: RenderDevice> Default for BufferPool<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Textures keyed by their full description.
pub struct TexturePool<D: RenderDevice> {
    pool: ResourcePool<TextureDesc, D::Texture>,
}

impl<D: RenderDevice> TexturePool<D> {
    pub fn new() -> Self {
        Self {
            pool: ResourcePool::new(),
        }
    }

    pub fn cycle(&mut self) {
        self.pool.cycle();
    }

    pub fn acquire(&mut self, device: &D, desc: TextureDesc) -> Result<Arc<D::Texture>> {
        self.pool.acquire(desc, |desc| device.create_texture(desc))
    }

    pub fn gc(&mut self) {
        self.pool.gc();
    }

    pub fn in_use_count(&self) -> usize {
        self.pool.in_use_count()
    }

    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }
}

impl<D: RenderDevice> Default for TexturePool<D> {
    fn default() -> Self {
        Self::new()
    }
}

fn target_desc(format: TextureFormat, usage: TextureUsage, width: u32, height: u32) -> Result<TextureDesc> {
    if width == 0 || height == 0 {
        return Err(Error::new(ErrorKind::AllocationFailed(format!(
            "{format:?} render target of size {width}x{height}"
        ))));
    }
    Ok(TextureDesc {
        format,
        usage,
        width,
        height,
        mip_levels: 1,
    })
}

/// A render target that follows the output size, recreated only when the
/// size changes.
pub struct AutoTexture<D: RenderDevice> {
    format: TextureFormat,
    usage: TextureUsage,
    size: (u32, u32),
    texture: Option<D::Texture>,
}

impl<D: RenderDevice> AutoTexture<D> {
    pub fn new(format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            format,
            usage,
            size: (0, 0),
            texture: None,
        }
    }

    pub fn resize(&mut self, device: &D, width: u32, height: u32) -> Result<()> {
        let desc = target_desc(self.format, self.usage, width, height)?;
        if self.texture.is_some() && self.size == (width, height) {
            return Ok(());
        }

        self.texture = Some(device.create_texture(&desc).context("resize auto texture")?);
        self.size = (width, height);
        Ok(())
    }

    pub fn get(&self) -> Option<&D::Texture> {
        self.texture.as_ref()
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

/// `extra + 2` textures used round-robin, so the current frame can read
/// what the previous frame wrote.
pub struct CycleTexture<D: RenderDevice> {
    format: TextureFormat,
    usage: TextureUsage,
    extra: usize,
    size: (u32, u32),
    textures: Vec<D::Texture>,
    index: usize,
}

impl<D: RenderDevice> CycleTexture<D> {
    pub fn new(format: TextureFormat, usage: TextureUsage, extra: usize) -> Self {
        Self {
            format,
            usage,
            extra,
            size: (0, 0),
            textures: Vec::new(),
            index: 0,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.extra + 2
    }

    /// Reallocates the whole ring when the size changes.
    pub fn resize(&mut self, device: &D, width: u32, height: u32) -> Result<()> {
        let desc = target_desc(self.format, self.usage, width, height)?;
        if !self.textures.is_empty() && self.size == (width, height) {
            return Ok(());
        }

        let textures = (0..self.slot_count())
            .map(|i| {
                device
                    .create_texture(&desc)
                    .with_context(|| format!("cycle texture slot {i}"))
            })
            .collect::<Result<Vec<_>>>()?;

        self.textures = textures;
        self.size = (width, height);
        self.index = 0;
        Ok(())
    }

    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.slot_count();
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&D::Texture> {
        self.textures.get(self.index)
    }

    pub fn previous(&self) -> Option<&D::Texture> {
        self.textures.get((self.index + self.slot_count() - 1) % self.slot_count())
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}
