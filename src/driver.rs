//! The seam between surface/session logic and the graphics driver.
//!
//! [`Gpu`] covers the Direct3D 11, DXGI and DirectComposition calls and
//! [`WindowHost`] the window system calls. Every associated handle type owns
//! exactly one driver reference and releases it when dropped, so the order in
//! which values are dropped is the order in which driver objects are released.
//!
//! [`crate::d3d11::Direct3D11`] and [`crate::window::Win32Host`] are the
//! Windows implementations.
use std::ptr::NonNull;

use crate::error::Error;
use crate::settings::SwapChainConfig;

/// Raw window handle value handed from the window host to the swap chain.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Default, Hash)]
pub struct RawWindow(pub isize);

/// CPU access requested for a staging texture.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum CpuAccess {
    /// CPU reads, used by capture sessions.
    Read,
    /// CPU writes, used by overlay surfaces.
    Write,
}

/// A mapped subresource as reported by the driver.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub struct Mapping {
    /// First byte of the mapped texture.
    pub data: NonNull<u8>,
    /// Byte distance between the starts of consecutive rows.
    pub row_pitch: usize,
}

/// Metadata of the most recently acquired desktop frame.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Default)]
pub struct FrameInfo {
    /// Number of frames the compositor presented since the last acquisition.
    pub accumulated_frames: u32,
    /// Performance counter time of the last desktop image update, 0 if none.
    pub last_present_time: i64,
    /// Performance counter time of the last mouse update, 0 if none.
    pub last_mouse_update_time: i64,
    /// Whether the pointer was visible at the last mouse update.
    pub pointer_visible: bool,
    /// Whether protected content was blacked out of the frame.
    pub protected_content_masked_out: bool,
    /// Size of the dirty/move rectangle metadata for the frame.
    pub total_metadata_buffer_size: u32,
}

/// Graphics driver calls used by overlay surfaces and capture sessions.
///
/// Methods that create objects return owning handles. Methods that take
/// handles only borrow them.
///
/// # Safety
///
/// [`Gpu::map`] must return a [`Mapping`] whose `data` points to at least
/// `row_pitch * (height - 1) + width * 4` bytes, where `width` and `height` are
/// the dimensions the texture was created with and `row_pitch >= width * 4`.
/// The bytes must stay valid for reads and writes, and must not be accessed
/// by anything else, until [`Gpu::unmap`] is called for the same texture.
pub unsafe trait Gpu {
    /// Graphics device.
    type Device;
    /// Immediate device context.
    type Context;
    /// DXGI interface of the device.
    type DeviceInterface;
    /// Adapter the device runs on.
    type Adapter;
    /// Factory able to create presentable surfaces.
    type Factory;
    /// Display output of an adapter.
    type Output;
    /// Output interface that supports desktop duplication.
    type DuplicationOutput;
    /// Desktop duplication of an output.
    type Duplication;
    /// Frame resource handed out by a duplication.
    type FrameResource;
    /// Presentable surface.
    type SwapChain;
    /// 2D texture.
    type Texture;
    /// Render-target view over a texture.
    type RenderTarget;
    /// Composition device that places swap chains on the desktop.
    type Composition;
    /// Visual showing the content of a swap chain.
    type Visual;
    /// Composition target binding a visual tree to a window.
    type CompositionTarget;

    /// Creates a hardware device with BGRA support and its immediate context.
    fn create_device(&self) -> Result<(Self::Device, Self::Context), Error>;

    /// Queries the DXGI interface of a device.
    fn device_interface(&self, device: &Self::Device) -> Result<Self::DeviceInterface, Error>;

    /// Gets the adapter a device was created on.
    fn adapter(&self, device: &Self::DeviceInterface) -> Result<Self::Adapter, Error>;

    /// Gets the presentable-surface factory that owns an adapter.
    fn factory(&self, adapter: &Self::Adapter) -> Result<Self::Factory, Error>;

    /// Creates a composition swap chain. It shows nothing until it is the
    /// content of a visual.
    fn create_swap_chain(
        &self,
        factory: &Self::Factory,
        device: &Self::Device,
        width: u32,
        height: u32,
        config: &SwapChainConfig,
    ) -> Result<Self::SwapChain, Error>;

    /// Creates a composition device on the device's DXGI interface.
    fn create_composition(&self, device: &Self::DeviceInterface) -> Result<Self::Composition, Error>;

    /// Creates a visual whose content is `swap_chain`.
    fn create_visual(
        &self,
        composition: &Self::Composition,
        swap_chain: &Self::SwapChain,
    ) -> Result<Self::Visual, Error>;

    /// Binds `visual` as the topmost root of `window` and commits the composition.
    fn create_composition_target(
        &self,
        composition: &Self::Composition,
        visual: &Self::Visual,
        window: RawWindow,
    ) -> Result<Self::CompositionTarget, Error>;

    /// Gets the current back buffer of a swap chain.
    fn back_buffer(&self, swap_chain: &Self::SwapChain) -> Result<Self::Texture, Error>;

    /// Creates a render-target view over `texture`.
    fn create_render_target(&self, device: &Self::Device, texture: &Self::Texture) -> Result<Self::RenderTarget, Error>;

    /// Resizes every buffer of a swap chain. No back buffer reference may be alive.
    fn resize_buffers(
        &self,
        swap_chain: &Self::SwapChain,
        width: u32,
        height: u32,
        config: &SwapChainConfig,
    ) -> Result<(), Error>;

    /// Presents the back buffer without waiting for vertical sync.
    fn present(&self, swap_chain: &Self::SwapChain) -> Result<(), Error>;

    /// Creates a single-mip BGRA staging texture with the requested CPU access.
    fn create_staging_texture(
        &self,
        device: &Self::Device,
        width: u32,
        height: u32,
        access: CpuAccess,
    ) -> Result<Self::Texture, Error>;

    /// Maps subresource 0 of `texture` for CPU access.
    fn map(&self, context: &Self::Context, texture: &Self::Texture, access: CpuAccess) -> Result<Mapping, Error>;

    /// Unmaps subresource 0 of `texture`.
    fn unmap(&self, context: &Self::Context, texture: &Self::Texture);

    /// Copies the whole of `source` into `destination`.
    fn copy_resource(&self, context: &Self::Context, destination: &Self::Texture, source: &Self::Texture);

    /// Gets the primary output of an adapter.
    fn primary_output(&self, adapter: &Self::Adapter) -> Result<Self::Output, Error>;

    /// Queries the duplication-capable interface of an output.
    fn duplication_output(&self, output: &Self::Output) -> Result<Self::DuplicationOutput, Error>;

    /// Gets the desktop size of an output in pixels.
    fn desktop_size(&self, output: &Self::DuplicationOutput) -> Result<(u32, u32), Error>;

    /// Creates a desktop duplication of `output` bound to `device`.
    fn duplicate_output(
        &self,
        output: &Self::DuplicationOutput,
        device: &Self::Device,
    ) -> Result<Self::Duplication, Error>;

    /// Waits up to `timeout_ms` for the next desktop frame.
    ///
    /// A wait that elapses is reported as [`Error::is_timeout`].
    fn acquire_next_frame(
        &self,
        duplication: &Self::Duplication,
        timeout_ms: u32,
    ) -> Result<(FrameInfo, Self::FrameResource), Error>;

    /// Gets the GPU texture behind a frame resource.
    fn frame_texture(&self, resource: &Self::FrameResource) -> Result<Self::Texture, Error>;

    /// Returns the frame lock taken by [`Gpu::acquire_next_frame`].
    fn release_frame(&self, duplication: &Self::Duplication) -> Result<(), Error>;
}

/// Window system calls used by overlay surfaces.
pub trait WindowHost {
    /// Host window. Dropping it destroys the window.
    type Window;

    /// Creates a borderless, input-transparent, always-on-top, non-activating window.
    fn create_window(&self, name: &str, x: i32, y: i32, width: i32, height: i32) -> Result<Self::Window, Error>;

    /// Gets the raw handle of a window.
    fn raw_window(&self, window: &Self::Window) -> RawWindow;

    /// Moves a window without resizing or activating it.
    fn move_window(&self, window: &Self::Window, x: i32, y: i32) -> Result<(), Error>;

    /// Resizes a window without moving or activating it.
    fn resize_window(&self, window: &Self::Window, width: i32, height: i32) -> Result<(), Error>;

    /// Dispatches pending messages of a window without blocking.
    fn pump_messages(&self, window: &Self::Window);

    /// Gets the primary display size in pixels.
    fn display_size(&self) -> (i32, i32);
}

/// A device and its immediate context.
///
/// The context is released before the device.
pub struct DeviceContext<G: Gpu> {
    /// Immediate context.
    pub context: G::Context,
    /// Device.
    pub device: G::Device,
}

impl<G: Gpu> DeviceContext<G> {
    /// Creates a device and its immediate context.
    pub fn create(gpu: &G) -> Result<Self, Error> {
        let (device, context) = gpu.create_device()?;
        Ok(Self { context, device })
    }
}
