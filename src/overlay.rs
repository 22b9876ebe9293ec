//! Click-through overlay surfaces.
//!
//! An [`OverlaySurface`] is a borderless, input-transparent, always-on-top
//! window showing a flip-model composition swap chain through a visual. CPU
//! images are written into a staging texture, copied into the back buffer and
//! presented. Premultiplied alpha blends with the desktop below.
//!
//! # Example
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> Result<(), desktop_overlay::Error> {
//! use desktop_overlay::window::WindowClass;
//! use desktop_overlay::overlay::OverlaySurface;
//!
//! let _class = WindowClass::register()?;
//! let mut overlay = OverlaySurface::new(100, 100, 320, 240)?;
//!
//! // Half transparent red, premultiplied BGRA.
//! let pixels = [0, 0, 128, 128].repeat(320 * 240);
//! overlay.upload(&pixels, 320, 240, 4)?;
//! overlay.poll_events();
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```
use log::{debug, trace, warn};

use crate::chain::Chain;
use crate::driver::{CpuAccess, DeviceContext, Gpu, WindowHost};
use crate::error::Error;
use crate::registry::WindowLease;
use crate::settings::OverlaySettings;
use crate::staging::StagingTexture;
use crate::transfer::{self, BYTES_PER_PIXEL};

/// Outcome of a position or size change.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum Adjustment {
    /// The surface already had the requested value. Nothing was called.
    Unchanged,
    /// The change was applied.
    Applied,
    /// The window system refused the change. The surface is unchanged and usable.
    Rejected,
}

/// A presentable, click-through overlay window.
///
/// Dropping the surface releases the staging texture, the render-target
/// view, the composition objects, the swap chain, the context and the device,
/// then destroys the window and returns its identifier.
pub struct OverlaySurface<G: Gpu, H: WindowHost> {
    // Field order is release order.
    staging: Option<StagingTexture<G>>,
    render_target: Option<G::RenderTarget>,
    composition_target: G::CompositionTarget,
    visual: G::Visual,
    composition: G::Composition,
    swap_chain: G::SwapChain,
    device: DeviceContext<G>,
    window: H::Window,
    lease: WindowLease,
    gpu: G,
    host: H,
    settings: OverlaySettings,
    position: (i32, i32),
    size: (u32, u32),
    display_size: (i32, i32),
    stale: bool,
}

impl<G: Gpu, H: WindowHost> OverlaySurface<G, H> {
    /// Creates an overlay at (`x`, `y`) of `width` x `height` pixels.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if a dimension is zero or exceeds `i32::MAX`; nothing is created
    /// - [`Error::WindowLimitReached`] if the registry has no free window identifier
    /// - [`Error::Unavailable`] if no compatible adapter exists
    /// - [`Error::Driver`] for any other failing step
    ///
    /// Every object acquired before a failing step is released again.
    pub fn create(
        gpu: G,
        host: H,
        settings: OverlaySettings,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidArgument("overlay width and height must be greater than zero"));
        }
        let (Ok(window_width), Ok(window_height)) = (i32::try_from(width), i32::try_from(height)) else {
            return Err(Error::InvalidArgument("overlay width and height must fit in an i32"));
        };

        let registry = settings.registry;
        let config = settings.swap_chain;

        let chain = Chain::start("overlay surface")
            .then("window identifier", |()| registry.lease())?
            .then("host window", |(lease, ())| {
                host.create_window(lease.name(), x, y, window_width, window_height)
            })?
            .then("device", |_| DeviceContext::create(&gpu))?
            .then("device interface", |(device, _)| gpu.device_interface(&device.device))?
            .then("adapter", |(interface, _)| gpu.adapter(interface))?
            .then("factory", |(adapter, _)| gpu.factory(adapter))?
            .then("swap chain", |(factory, (_, (_, (device, _))))| {
                gpu.create_swap_chain(factory, &device.device, width, height, &config)
            })?
            .then("composition device", |(_, (_, (_, (interface, _))))| gpu.create_composition(interface))?
            .then("visual", |(composition, (swap_chain, _))| gpu.create_visual(composition, swap_chain))?
            .then("composition target", |(visual, (composition, (_, (_, (_, (_, (_, (window, _))))))))| {
                gpu.create_composition_target(composition, visual, host.raw_window(window))
            })?
            .then("back buffer", |(_, (_, (_, (swap_chain, _))))| gpu.back_buffer(swap_chain))?
            .then("render target view", |(back_buffer, (_, (_, (_, (_, (_, (_, (_, (device, _)))))))))| {
                gpu.create_render_target(&device.device, back_buffer)
            })?
            .then("staging texture", |(_, (_, (_, (_, (_, (_, (_, (_, (_, (device, _))))))))))| {
                StagingTexture::create(&gpu, &device.device, width, height, CpuAccess::Write)
            })?;

        let (staging, (render_target, (back_buffer, (composition_target, (visual, (composition, rest)))))) =
            chain.finish();
        let (swap_chain, (factory, (adapter, (interface, (device, (window, (lease, ()))))))) = rest;

        // Traversal handles are not part of the surface.
        drop(back_buffer);
        drop(factory);
        drop(adapter);
        drop(interface);

        let display_size = host.display_size();
        debug!("Created overlay surface {} at ({x}, {y}) sized {width}x{height}", lease.name());

        Ok(Self {
            staging: Some(staging),
            render_target: Some(render_target),
            composition_target,
            visual,
            composition,
            swap_chain,
            device,
            window,
            lease,
            gpu,
            host,
            settings,
            position: (x, y),
            size: (width, height),
            display_size,
            stale: false,
        })
    }

    /// Writes a packed BGRA image into the overlay and presents it.
    ///
    /// The image is placed at the top-left corner. `width` and `height` may
    /// be smaller than the surface; the rest of the staging texture keeps its
    /// previous content.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `channels` is not 4, a dimension is zero or larger than the
    ///   surface, or `pixels` holds fewer than `width * height * 4` bytes; no driver call is made
    /// - [`Error::StaleSurface`] after a failed [`OverlaySurface::set_size`]
    /// - [`Error::Driver`] if mapping, copying or presenting fails
    pub fn upload(&mut self, pixels: &[u8], width: u32, height: u32, channels: u32) -> Result<(), Error> {
        if channels as usize != BYTES_PER_PIXEL {
            return Err(Error::InvalidArgument("only 4-channel BGRA images are supported"));
        }
        if width == 0 || height == 0 || width > self.size.0 || height > self.size.1 {
            return Err(Error::InvalidArgument("image dimensions must be non-zero and fit the surface"));
        }
        if pixels.len() < transfer::packed_len(width, height) {
            return Err(Error::InvalidArgument("pixel buffer is smaller than width * height * 4"));
        }
        if self.stale {
            return Err(Error::StaleSurface);
        }
        let Some(staging) = self.staging.as_mut() else {
            return Err(Error::StaleSurface);
        };

        let back_buffer = self.gpu.back_buffer(&self.swap_chain)?;

        {
            let mut mapped = staging.map(&self.gpu, &self.device.context)?;
            let row_len = transfer::packed_row_len(width);
            let pitch = mapped.row_pitch();
            transfer::copy_rows(pixels, row_len, mapped.as_mut_slice(), pitch, row_len, height as usize)?;
        }

        self.gpu.copy_resource(&self.device.context, &back_buffer, staging.texture());
        self.gpu.present(&self.swap_chain)?;
        trace!("Presented {width}x{height} image on {}", self.lease.name());

        Ok(())
    }

    /// Moves the overlay window.
    ///
    /// Returns [`Adjustment::Unchanged`] without touching the window if it is
    /// already at (`x`, `y`), and [`Adjustment::Rejected`] if the window
    /// system refuses the move.
    pub fn set_position(&mut self, x: i32, y: i32) -> Adjustment {
        if self.position == (x, y) {
            return Adjustment::Unchanged;
        }

        match self.host.move_window(&self.window, x, y) {
            Ok(()) => {
                self.position = (x, y);
                Adjustment::Applied
            }
            Err(e) => {
                warn!("Failed to move overlay {} to ({x}, {y}): {e}", self.lease.name());
                Adjustment::Rejected
            }
        }
    }

    /// Resizes the overlay window, its swap chain buffers and its staging texture.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if a dimension is zero or exceeds `i32::MAX`
    /// - [`Error::Driver`] if a buffer, view or texture cannot be recreated
    ///
    /// After an error the surface is stale: uploads fail with
    /// [`Error::StaleSurface`] until a resize succeeds.
    pub fn set_size(&mut self, width: u32, height: u32) -> Result<Adjustment, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidArgument("overlay width and height must be greater than zero"));
        }
        let (Ok(window_width), Ok(window_height)) = (i32::try_from(width), i32::try_from(height)) else {
            return Err(Error::InvalidArgument("overlay width and height must fit in an i32"));
        };
        if !self.stale && self.size == (width, height) {
            return Ok(Adjustment::Unchanged);
        }

        if let Err(e) = self.host.resize_window(&self.window, window_width, window_height) {
            warn!("Failed to resize overlay {} to {width}x{height}: {e}", self.lease.name());
            return Ok(Adjustment::Rejected);
        }

        self.stale = true;

        // Every back buffer reference must be gone before the buffers are resized.
        self.render_target = None;
        self.gpu.resize_buffers(&self.swap_chain, width, height, &self.settings.swap_chain)?;

        let back_buffer = self.gpu.back_buffer(&self.swap_chain)?;
        self.render_target = Some(self.gpu.create_render_target(&self.device.device, &back_buffer)?);
        drop(back_buffer);

        self.staging = None;
        self.staging = Some(StagingTexture::create(&self.gpu, &self.device.device, width, height, CpuAccess::Write)?);

        self.size = (width, height);
        self.stale = false;
        debug!("Resized overlay {} to {width}x{height}", self.lease.name());

        Ok(Adjustment::Applied)
    }

    /// Dispatches pending window messages without blocking.
    #[inline]
    pub fn poll_events(&self) {
        self.host.pump_messages(&self.window);
    }

    /// Gets the position of the overlay.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> (i32, i32) {
        self.position
    }

    /// Gets the logical size of the overlay.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Gets the primary display size captured at creation.
    #[inline]
    #[must_use]
    pub const fn display_size(&self) -> (i32, i32) {
        self.display_size
    }

    /// Whether a failed resize left the buffers out of sync with the logical size.
    #[inline]
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.stale
    }

    /// Gets the window name.
    #[inline]
    #[must_use]
    pub fn window_name(&self) -> &str {
        self.lease.name()
    }

    /// Gets the staging texture, absent while a resize is incomplete.
    #[inline]
    #[must_use]
    pub const fn staging(&self) -> Option<&StagingTexture<G>> {
        self.staging.as_ref()
    }

    /// Gets the host window.
    #[inline]
    #[must_use]
    pub const fn window(&self) -> &H::Window {
        &self.window
    }
}

#[cfg(windows)]
impl OverlaySurface<crate::d3d11::Direct3D11, crate::window::Win32Host> {
    /// Creates an overlay on the hardware device with default settings.
    ///
    /// The window class must be registered, see [`crate::window::WindowClass`].
    ///
    /// # Errors
    ///
    /// See [`OverlaySurface::create`].
    #[inline]
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Result<Self, Error> {
        Self::create(
            crate::d3d11::Direct3D11::new(crate::d3d11::Direct3D11::OVERLAY_FEATURE_LEVEL),
            crate::window::Win32Host,
            OverlaySettings::default(),
            x,
            y,
            width,
            height,
        )
    }
}

impl<G: Gpu, H: WindowHost> Drop for OverlaySurface<G, H> {
    fn drop(&mut self) {
        debug!("Destroying overlay surface {}", self.lease.name());
    }
}
