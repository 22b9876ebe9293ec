//! CPU-accessible staging textures.
//!
//! A staging texture is the only place where CPU memory and GPU textures
//! meet. Mapping it returns a [`MappedTexture`] guard that unmaps on every
//! exit path.
use std::slice;

use crate::driver::{CpuAccess, Gpu};
use crate::error::{Error, Status};
use crate::transfer::{packed_row_len, span_len};

/// BGRA staging texture with fixed dimensions.
pub struct StagingTexture<G: Gpu> {
    texture: G::Texture,
    width: u32,
    height: u32,
    access: CpuAccess,
}

impl<G: Gpu> StagingTexture<G> {
    /// Creates a `width` x `height` staging texture.
    pub fn create(gpu: &G, device: &G::Device, width: u32, height: u32, access: CpuAccess) -> Result<Self, Error> {
        let texture = gpu.create_staging_texture(device, width, height, access)?;
        Ok(Self { texture, width, height, access })
    }

    /// Gets the underlying texture.
    #[inline]
    #[must_use]
    pub const fn texture(&self) -> &G::Texture {
        &self.texture
    }

    /// Gets the width of the texture.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Gets the height of the texture.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Gets the CPU access the texture was created with.
    #[inline]
    #[must_use]
    pub const fn access(&self) -> CpuAccess {
        self.access
    }

    /// Maps the texture for the CPU access it was created with.
    ///
    /// The texture stays exclusively borrowed while the guard lives, so only
    /// one mapping of it can exist at a time.
    ///
    /// ```compile_fail
    /// use desktop_overlay::driver::Gpu;
    /// use desktop_overlay::staging::StagingTexture;
    ///
    /// fn write_twice<G: Gpu>(staging: &mut StagingTexture<G>, gpu: &G, context: &G::Context) {
    ///     let mut first = staging.map(gpu, context).unwrap();
    ///     let mut second = staging.map(gpu, context).unwrap();
    ///     first.as_mut_slice()[0] = 1;
    ///     second.as_mut_slice()[0] = 2;
    /// }
    /// ```
    pub fn map<'a>(&'a mut self, gpu: &'a G, context: &'a G::Context) -> Result<MappedTexture<'a, G>, Error> {
        let this: &'a Self = self;
        let mapping = gpu.map(context, &this.texture, this.access)?;

        if mapping.row_pitch < packed_row_len(this.width) {
            gpu.unmap(context, &this.texture);
            return Err(Error::Driver(Status::FAIL));
        }

        let len = span_len(mapping.row_pitch, packed_row_len(this.width), this.height as usize);

        // SAFETY: `Gpu` implementations keep `len` bytes mapped and unaliased
        // until `unmap`, which only runs when the guard is dropped. The
        // exclusive borrow of `self` rules out a second mapping meanwhile.
        let data = unsafe { slice::from_raw_parts_mut(mapping.data.as_ptr(), len) };

        Ok(MappedTexture { gpu, context, texture: &this.texture, data, row_pitch: mapping.row_pitch })
    }
}

/// A mapped staging texture. Unmapped when dropped.
pub struct MappedTexture<'a, G: Gpu> {
    gpu: &'a G,
    context: &'a G::Context,
    texture: &'a G::Texture,
    data: &'a mut [u8],
    row_pitch: usize,
}

impl<G: Gpu> MappedTexture<'_, G> {
    /// Byte distance between the starts of consecutive rows.
    #[inline]
    #[must_use]
    pub const fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    /// Whether rows carry driver padding.
    #[inline]
    #[must_use]
    pub const fn has_padding(&self, width: u32) -> bool {
        self.row_pitch != packed_row_len(width)
    }

    /// Gets the mapped bytes.
    #[inline]
    #[must_use]
    pub const fn as_slice(&self) -> &[u8] {
        &*self.data
    }

    /// Gets the mapped bytes mutably.
    #[inline]
    #[must_use]
    pub const fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut *self.data
    }
}

impl<G: Gpu> Drop for MappedTexture<'_, G> {
    fn drop(&mut self) {
        self.gpu.unmap(self.context, self.texture);
    }
}
