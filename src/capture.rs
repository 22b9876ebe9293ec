//! Desktop duplication capture of the primary output.
//!
//! A [`CaptureSession`] duplicates output 0 of the adapter its device was
//! created on and copies every delivered frame through a CPU-readable
//! staging texture into a caller buffer of packed BGRA pixels.
//!
//! # Example
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> Result<(), desktop_overlay::Error> {
//! use desktop_overlay::capture::{CaptureSession, Frame};
//!
//! let mut session = CaptureSession::new()?;
//! let mut buffer = vec![0; session.buffer_len()];
//!
//! match session.get_frame(&mut buffer)? {
//!     Frame::Delivered(info) => println!("{} frame(s) accumulated", info.accumulated_frames),
//!     Frame::Unchanged => println!("No new frame, buffer untouched"),
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```
use log::{debug, trace};

use crate::chain::Chain;
use crate::driver::{CpuAccess, DeviceContext, FrameInfo, Gpu};
use crate::error::{Error, Status};
use crate::settings::CaptureSettings;
use crate::staging::StagingTexture;
use crate::transfer;

/// Outcome of [`CaptureSession::get_frame`].
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum Frame {
    /// A new frame was copied into the buffer.
    Delivered(FrameInfo),
    /// The wait elapsed without a new frame. The buffer was not touched.
    Unchanged,
}

impl Frame {
    /// Whether a new frame was copied.
    #[inline]
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Desktop duplication session over the primary output.
///
/// Dropping the session releases the staging texture, the duplication, the
/// context and the device, in that order.
pub struct CaptureSession<G: Gpu> {
    // Field order is release order.
    staging: StagingTexture<G>,
    duplication: G::Duplication,
    device: DeviceContext<G>,
    gpu: G,
    settings: CaptureSettings,
    last_frame: Option<FrameInfo>,
}

impl<G: Gpu> CaptureSession<G> {
    /// Creates a duplication session for the primary output.
    ///
    /// # Errors
    ///
    /// - [`Error::Unavailable`] if there is no hardware adapter, no output, or duplication is not
    ///   available (for example on a remote session)
    /// - [`Error::Driver`] for any other failing step
    ///
    /// Every object acquired before a failing step is released again.
    pub fn create(gpu: G, settings: CaptureSettings) -> Result<Self, Error> {
        let chain = Chain::start("capture session")
            .then("device", |()| DeviceContext::create(&gpu))?
            .then("device interface", |(device, ())| gpu.device_interface(&device.device))?
            .then("adapter", |(interface, _)| gpu.adapter(interface))?
            .then("primary output", |(adapter, _)| gpu.primary_output(adapter))?
            .then("duplication output", |(output, _)| gpu.duplication_output(output))?
            .then("duplication", |(output, (_, (_, (_, (device, ())))))| {
                gpu.duplicate_output(output, &device.device)
            })?
            .then("staging texture", |(_, (output, (_, (_, (_, (device, ()))))))| {
                let (width, height) = gpu.desktop_size(output)?;
                if width == 0 || height == 0 {
                    return Err(Error::Unavailable(Status::DXGI_NOT_FOUND));
                }
                StagingTexture::create(&gpu, &device.device, width, height, CpuAccess::Read)
            })?;

        let (staging, (duplication, (output1, (output, (adapter, (interface, (device, ()))))))) = chain.finish();

        // Traversal handles are not part of the session.
        drop(output1);
        drop(output);
        drop(adapter);
        drop(interface);

        debug!("Created capture session for the primary output ({}x{})", staging.width(), staging.height());

        Ok(Self { staging, duplication, device, gpu, settings, last_frame: None })
    }

    /// Copies the next desktop frame into `buffer` as packed BGRA.
    ///
    /// Waits at most [`CaptureSettings::acquire_timeout`]. When the wait
    /// elapses, [`Frame::Unchanged`] is returned and `buffer` is not touched.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `buffer` is shorter than [`CaptureSession::buffer_len`]
    /// - [`Error::Driver`] if acquiring, mapping or releasing the frame fails; use
    ///   [`Error::is_access_lost`] to detect a lost duplication
    pub fn get_frame(&mut self, buffer: &mut [u8]) -> Result<Frame, Error> {
        if buffer.len() < self.buffer_len() {
            return Err(Error::InvalidArgument("buffer is smaller than width * height * 4"));
        }

        self.last_frame = None;

        let timeout_ms = self.settings.acquire_timeout_ms();
        let (info, resource) = match self.gpu.acquire_next_frame(&self.duplication, timeout_ms) {
            Ok(frame) => frame,
            Err(e) if e.is_timeout() => {
                trace!("No new desktop frame within {:?}", self.settings.acquire_timeout);
                return Ok(Frame::Unchanged);
            }
            Err(e) => return Err(e),
        };
        let lock = FrameLock { gpu: &self.gpu, duplication: &self.duplication };

        let texture = self.gpu.frame_texture(&resource)?;
        drop(resource);

        self.gpu.copy_resource(&self.device.context, self.staging.texture(), &texture);
        drop(texture);

        let row_len = transfer::packed_row_len(self.staging.width());
        let rows = self.staging.height() as usize;
        {
            let mapped = self.staging.map(&self.gpu, &self.device.context)?;
            transfer::copy_rows(mapped.as_slice(), mapped.row_pitch(), buffer, row_len, row_len, rows)?;
        }

        lock.release()?;

        self.last_frame = Some(info);
        Ok(Frame::Delivered(info))
    }

    /// Gets the width of the captured region.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.staging.width()
    }

    /// Gets the height of the captured region.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.staging.height()
    }

    /// Gets the size of the captured region.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        (self.staging.width(), self.staging.height())
    }

    /// Byte length of a buffer holding one packed BGRA frame.
    #[inline]
    #[must_use]
    pub const fn buffer_len(&self) -> usize {
        transfer::packed_len(self.staging.width(), self.staging.height())
    }

    /// Gets the metadata of the frame delivered by the last call to
    /// [`CaptureSession::get_frame`], if that call delivered one.
    #[inline]
    #[must_use]
    pub const fn last_frame(&self) -> Option<&FrameInfo> {
        self.last_frame.as_ref()
    }

    /// Gets the capture settings.
    #[inline]
    #[must_use]
    pub const fn settings(&self) -> &CaptureSettings {
        &self.settings
    }
}

#[cfg(windows)]
impl CaptureSession<crate::d3d11::Direct3D11> {
    /// Creates a session on the hardware device with default settings.
    ///
    /// # Errors
    ///
    /// See [`CaptureSession::create`].
    #[inline]
    pub fn new() -> Result<Self, Error> {
        Self::create(
            crate::d3d11::Direct3D11::new(crate::d3d11::Direct3D11::CAPTURE_FEATURE_LEVEL),
            CaptureSettings::default(),
        )
    }
}

/// Duplication frame lock, returned on drop when not released explicitly.
struct FrameLock<'a, G: Gpu> {
    gpu: &'a G,
    duplication: &'a G::Duplication,
}

impl<G: Gpu> FrameLock<'_, G> {
    fn release(self) -> Result<(), Error> {
        let result = self.gpu.release_frame(self.duplication);
        std::mem::forget(self);
        result
    }
}

impl<G: Gpu> Drop for FrameLock<'_, G> {
    fn drop(&mut self) {
        let _ = self.gpu.release_frame(self.duplication);
    }
}
