//! Direct3D 11, DXGI and DirectComposition implementation of [`Gpu`].
use std::ffi::c_void;
use std::mem;
use std::ptr::NonNull;

use windows::Win32::Foundation::{HMODULE, HWND};
use windows::Win32::Graphics::Direct3D::{
    D3D_DRIVER_TYPE_HARDWARE, D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_11_1,
};
use windows::Win32::Graphics::Direct3D11::{
    D3D11_CPU_ACCESS_READ, D3D11_CPU_ACCESS_WRITE, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ, D3D11_MAP_WRITE,
    D3D11_MAPPED_SUBRESOURCE, D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING, D3D11CreateDevice,
    ID3D11Device, ID3D11DeviceContext, ID3D11RenderTargetView, ID3D11Texture2D,
};
use windows::Win32::Graphics::DirectComposition::{
    DCompositionCreateDevice, IDCompositionDevice, IDCompositionTarget, IDCompositionVisual,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_ALPHA_MODE_IGNORE, DXGI_ALPHA_MODE_PREMULTIPLIED, DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_SAMPLE_DESC,
};
use windows::Win32::Graphics::Dxgi::{
    DXGI_FEATURE_PRESENT_ALLOW_TEARING, DXGI_OUTDUPL_FRAME_INFO, DXGI_PRESENT, DXGI_PRESENT_ALLOW_TEARING,
    DXGI_SCALING_STRETCH, DXGI_SWAP_CHAIN_DESC1, DXGI_SWAP_CHAIN_FLAG, DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING,
    DXGI_SWAP_EFFECT_FLIP_DISCARD, DXGI_USAGE_RENDER_TARGET_OUTPUT, IDXGIAdapter, IDXGIDevice, IDXGIFactory2,
    IDXGIFactory5, IDXGIOutput, IDXGIOutput1, IDXGIOutputDuplication, IDXGIResource, IDXGISwapChain1,
};
use windows::core::Interface;

use crate::driver::{CpuAccess, FrameInfo, Gpu, Mapping, RawWindow};
use crate::error::{Error, Status};
use crate::settings::{AlphaMode, SwapChainConfig};

/// Hardware Direct3D 11 device factory and driver calls.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub struct Direct3D11 {
    feature_level: D3D_FEATURE_LEVEL,
}

impl Direct3D11 {
    /// Feature level requested for overlay surfaces.
    pub const OVERLAY_FEATURE_LEVEL: D3D_FEATURE_LEVEL = D3D_FEATURE_LEVEL_11_1;
    /// Feature level requested for capture sessions.
    pub const CAPTURE_FEATURE_LEVEL: D3D_FEATURE_LEVEL = D3D_FEATURE_LEVEL_11_0;

    /// Creates devices at exactly `feature_level`.
    #[inline]
    #[must_use]
    pub const fn new(feature_level: D3D_FEATURE_LEVEL) -> Self {
        Self { feature_level }
    }

    /// Gets the requested feature level.
    #[inline]
    #[must_use]
    pub const fn feature_level(&self) -> D3D_FEATURE_LEVEL {
        self.feature_level
    }
}

impl Default for Direct3D11 {
    fn default() -> Self {
        Self::new(Self::OVERLAY_FEATURE_LEVEL)
    }
}

/// A swap chain and the flags it was created with.
pub struct SwapChain {
    swap_chain: IDXGISwapChain1,
    flags: DXGI_SWAP_CHAIN_FLAG,
}

impl SwapChain {
    /// Gets the underlying swap chain.
    #[inline]
    #[must_use]
    pub const fn as_raw(&self) -> &IDXGISwapChain1 {
        &self.swap_chain
    }

    const fn allows_tearing(&self) -> bool {
        self.flags.0 & DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING.0 != 0
    }
}

/// Out-pointer results are `None` only when the call itself failed.
fn created<T>(object: Option<T>) -> Result<T, Error> {
    object.ok_or(Error::Driver(Status::FAIL))
}

fn tearing_supported(factory: &IDXGIFactory2) -> bool {
    let Ok(factory) = factory.cast::<IDXGIFactory5>() else {
        return false;
    };

    let mut allowed = 0_i32;
    let result = unsafe {
        factory.CheckFeatureSupport(
            DXGI_FEATURE_PRESENT_ALLOW_TEARING,
            (&raw mut allowed).cast::<c_void>(),
            mem::size_of::<i32>() as u32,
        )
    };

    result.is_ok() && allowed != 0
}

// SAFETY: `map` hands out `pData` and `RowPitch` of a successful `Map` on a
// single-mip staging texture, which stay valid until `Unmap`.
unsafe impl Gpu for Direct3D11 {
    type Device = ID3D11Device;
    type Context = ID3D11DeviceContext;
    type DeviceInterface = IDXGIDevice;
    type Adapter = IDXGIAdapter;
    type Factory = IDXGIFactory2;
    type Output = IDXGIOutput;
    type DuplicationOutput = IDXGIOutput1;
    type Duplication = IDXGIOutputDuplication;
    type FrameResource = IDXGIResource;
    type SwapChain = SwapChain;
    type Texture = ID3D11Texture2D;
    type RenderTarget = ID3D11RenderTargetView;
    type Composition = IDCompositionDevice;
    type Visual = IDCompositionVisual;
    type CompositionTarget = IDCompositionTarget;

    fn create_device(&self) -> Result<(Self::Device, Self::Context), Error> {
        let mut device = None;
        let mut context = None;
        unsafe {
            D3D11CreateDevice(
                None,
                D3D_DRIVER_TYPE_HARDWARE,
                HMODULE::default(),
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                Some(&[self.feature_level]),
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )?;
        };

        Ok((created(device)?, created(context)?))
    }

    fn device_interface(&self, device: &Self::Device) -> Result<Self::DeviceInterface, Error> {
        Ok(device.cast::<IDXGIDevice>()?)
    }

    fn adapter(&self, device: &Self::DeviceInterface) -> Result<Self::Adapter, Error> {
        Ok(unsafe { device.GetAdapter()? })
    }

    fn factory(&self, adapter: &Self::Adapter) -> Result<Self::Factory, Error> {
        Ok(unsafe { adapter.GetParent::<IDXGIFactory2>()? })
    }

    fn create_swap_chain(
        &self,
        factory: &Self::Factory,
        device: &Self::Device,
        width: u32,
        height: u32,
        config: &SwapChainConfig,
    ) -> Result<Self::SwapChain, Error> {
        let flags = if config.allow_tearing && tearing_supported(factory) {
            DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING
        } else {
            DXGI_SWAP_CHAIN_FLAG(0)
        };

        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: width,
            Height: height,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: config.buffer_count,
            Scaling: DXGI_SCALING_STRETCH,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            AlphaMode: match config.alpha_mode {
                AlphaMode::Premultiplied => DXGI_ALPHA_MODE_PREMULTIPLIED,
                AlphaMode::Ignore => DXGI_ALPHA_MODE_IGNORE,
            },
            Flags: flags.0 as u32,
            ..Default::default()
        };

        let swap_chain = unsafe { factory.CreateSwapChainForComposition(device, &desc, None)? };

        Ok(SwapChain { swap_chain, flags })
    }

    fn create_composition(&self, device: &Self::DeviceInterface) -> Result<Self::Composition, Error> {
        Ok(unsafe { DCompositionCreateDevice::<_, IDCompositionDevice>(device)? })
    }

    fn create_visual(
        &self,
        composition: &Self::Composition,
        swap_chain: &Self::SwapChain,
    ) -> Result<Self::Visual, Error> {
        unsafe {
            let visual = composition.CreateVisual()?;
            visual.SetContent(&swap_chain.swap_chain)?;
            Ok(visual)
        }
    }

    fn create_composition_target(
        &self,
        composition: &Self::Composition,
        visual: &Self::Visual,
        window: RawWindow,
    ) -> Result<Self::CompositionTarget, Error> {
        let hwnd = HWND(window.0 as *mut c_void);
        unsafe {
            let target = composition.CreateTargetForHwnd(hwnd, true)?;
            target.SetRoot(visual)?;
            composition.Commit()?;
            Ok(target)
        }
    }

    fn back_buffer(&self, swap_chain: &Self::SwapChain) -> Result<Self::Texture, Error> {
        Ok(unsafe { swap_chain.swap_chain.GetBuffer::<ID3D11Texture2D>(0)? })
    }

    fn create_render_target(
        &self,
        device: &Self::Device,
        texture: &Self::Texture,
    ) -> Result<Self::RenderTarget, Error> {
        let mut view = None;
        unsafe { device.CreateRenderTargetView(texture, None, Some(&mut view))? };
        created(view)
    }

    fn resize_buffers(
        &self,
        swap_chain: &Self::SwapChain,
        width: u32,
        height: u32,
        config: &SwapChainConfig,
    ) -> Result<(), Error> {
        unsafe {
            swap_chain.swap_chain.ResizeBuffers(
                config.buffer_count,
                width,
                height,
                DXGI_FORMAT_B8G8R8A8_UNORM,
                swap_chain.flags,
            )?;
        };
        Ok(())
    }

    fn present(&self, swap_chain: &Self::SwapChain) -> Result<(), Error> {
        let flags = if swap_chain.allows_tearing() { DXGI_PRESENT_ALLOW_TEARING } else { DXGI_PRESENT(0) };
        unsafe { swap_chain.swap_chain.Present(0, flags).ok()? };
        Ok(())
    }

    fn create_staging_texture(
        &self,
        device: &Self::Device,
        width: u32,
        height: u32,
        access: CpuAccess,
    ) -> Result<Self::Texture, Error> {
        let desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: match access {
                CpuAccess::Read => D3D11_CPU_ACCESS_READ.0 as u32,
                CpuAccess::Write => D3D11_CPU_ACCESS_WRITE.0 as u32,
            },
            MiscFlags: 0,
        };

        let mut texture = None;
        unsafe { device.CreateTexture2D(&desc, None, Some(&mut texture))? };
        created(texture)
    }

    fn map(&self, context: &Self::Context, texture: &Self::Texture, access: CpuAccess) -> Result<Mapping, Error> {
        let map_type = match access {
            CpuAccess::Read => D3D11_MAP_READ,
            CpuAccess::Write => D3D11_MAP_WRITE,
        };

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe { context.Map(texture, 0, map_type, 0, Some(&mut mapped))? };

        let Some(data) = NonNull::new(mapped.pData.cast::<u8>()) else {
            unsafe { context.Unmap(texture, 0) };
            return Err(Error::Driver(Status::FAIL));
        };

        Ok(Mapping { data, row_pitch: mapped.RowPitch as usize })
    }

    fn unmap(&self, context: &Self::Context, texture: &Self::Texture) {
        unsafe { context.Unmap(texture, 0) };
    }

    fn copy_resource(&self, context: &Self::Context, destination: &Self::Texture, source: &Self::Texture) {
        unsafe { context.CopyResource(destination, source) };
    }

    fn primary_output(&self, adapter: &Self::Adapter) -> Result<Self::Output, Error> {
        Ok(unsafe { adapter.EnumOutputs(0)? })
    }

    fn duplication_output(&self, output: &Self::Output) -> Result<Self::DuplicationOutput, Error> {
        Ok(output.cast::<IDXGIOutput1>()?)
    }

    fn desktop_size(&self, output: &Self::DuplicationOutput) -> Result<(u32, u32), Error> {
        let desc = unsafe { output.GetDesc()? };
        let rect = desc.DesktopCoordinates;

        let width = u32::try_from(rect.right - rect.left).unwrap_or(0);
        let height = u32::try_from(rect.bottom - rect.top).unwrap_or(0);

        Ok((width, height))
    }

    fn duplicate_output(
        &self,
        output: &Self::DuplicationOutput,
        device: &Self::Device,
    ) -> Result<Self::Duplication, Error> {
        Ok(unsafe { output.DuplicateOutput(device)? })
    }

    fn acquire_next_frame(
        &self,
        duplication: &Self::Duplication,
        timeout_ms: u32,
    ) -> Result<(FrameInfo, Self::FrameResource), Error> {
        let mut frame_info = DXGI_OUTDUPL_FRAME_INFO::default();
        let mut resource = None;
        unsafe { duplication.AcquireNextFrame(timeout_ms, &mut frame_info, &mut resource)? };

        let info = FrameInfo {
            accumulated_frames: frame_info.AccumulatedFrames,
            last_present_time: frame_info.LastPresentTime,
            last_mouse_update_time: frame_info.LastMouseUpdateTime,
            pointer_visible: frame_info.PointerPosition.Visible.as_bool(),
            protected_content_masked_out: frame_info.ProtectedContentMaskedOut.as_bool(),
            total_metadata_buffer_size: frame_info.TotalMetadataBufferSize,
        };

        match resource {
            Some(resource) => Ok((info, resource)),
            None => {
                let _ = unsafe { duplication.ReleaseFrame() };
                Err(Error::Driver(Status::FAIL))
            }
        }
    }

    fn frame_texture(&self, resource: &Self::FrameResource) -> Result<Self::Texture, Error> {
        Ok(resource.cast::<ID3D11Texture2D>()?)
    }

    fn release_frame(&self, duplication: &Self::Duplication) -> Result<(), Error> {
        unsafe { duplication.ReleaseFrame()? };
        Ok(())
    }
}
