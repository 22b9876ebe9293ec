//! C ABI of `desktop-overlay`.
//!
//! Every fallible call returns an HRESULT-style status. Constructors write
//! the new handle through an out pointer and leave it null on failure.
//! Handles are owned by the caller and released with the matching
//! `*_destroy` function.
#![cfg(windows)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(clippy::missing_safety_doc)]

use std::panic::{self, AssertUnwindSafe};
use std::{ptr, slice};

use ::desktop_overlay::capture::CaptureSession;
use ::desktop_overlay::d3d11::Direct3D11;
use ::desktop_overlay::overlay::{Adjustment, OverlaySurface};
use ::desktop_overlay::window::{self, Win32Host};
use ::desktop_overlay::{Error, Status};
use log::error;

/// Overlay surface handle.
pub type Overlay = OverlaySurface<Direct3D11, Win32Host>;
/// Capture session handle.
pub type Capture = CaptureSession<Direct3D11>;

/// Runs `f`, turning a panic into `E_FAIL` so it never unwinds into C.
fn guarded(f: impl FnOnce() -> Result<Status, Error>) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(status)) => status.code(),
        Ok(Err(e)) => e.status().code(),
        Err(_) => {
            error!("Panic caught at the C boundary");
            Status::FAIL.code()
        }
    }
}

fn dimension(value: i32) -> Result<u32, Error> {
    u32::try_from(value).map_err(|_| Error::InvalidArgument("dimensions must not be negative"))
}

fn to_c_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Validates upload arguments and returns the byte length of the image.
fn image_len(width: i32, height: i32, channels: i32) -> Result<(u32, u32, usize), Error> {
    if channels != 4 {
        return Err(Error::InvalidArgument("only 4-channel BGRA images are supported"));
    }
    let (width, height) = (dimension(width)?, dimension(height)?);
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(Error::InvalidArgument("image is too large"))?;

    Ok((width, height, len))
}

const fn adjustment_status(adjustment: Adjustment) -> Status {
    match adjustment {
        Adjustment::Unchanged | Adjustment::Applied => Status::OK,
        Adjustment::Rejected => Status::FALSE,
    }
}

/// Registers the overlay window class.
#[unsafe(no_mangle)]
pub extern "C" fn dovl_window_class_register() -> i32 {
    guarded(|| window::register_window_class().map(|()| Status::OK))
}

/// Unregisters the overlay window class.
#[unsafe(no_mangle)]
pub extern "C" fn dovl_window_class_unregister() -> i32 {
    guarded(|| window::unregister_window_class().map(|()| Status::OK))
}

/// Creates an overlay surface and writes its handle to `out`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_surface_create(
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    out: *mut *mut Overlay,
) -> i32 {
    if out.is_null() {
        return Status::INVALID_ARG.code();
    }
    unsafe { out.write(ptr::null_mut()) };

    guarded(|| {
        let overlay = Overlay::new(x, y, dimension(width)?, dimension(height)?)?;
        unsafe { out.write(Box::into_raw(Box::new(overlay))) };
        Ok(Status::OK)
    })
}

/// Destroys an overlay surface. Null is ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_surface_destroy(surface: *mut Overlay) {
    if !surface.is_null() {
        drop(unsafe { Box::from_raw(surface) });
    }
}

/// Uploads a packed BGRA image and presents it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_surface_upload(
    surface: *mut Overlay,
    data: *const u8,
    width: i32,
    height: i32,
    channels: i32,
) -> i32 {
    let Some(overlay) = (unsafe { surface.as_mut() }) else {
        return Status::INVALID_ARG.code();
    };
    if data.is_null() {
        return Status::INVALID_ARG.code();
    }

    guarded(|| {
        let (width, height, len) = image_len(width, height, channels)?;

        let pixels = unsafe { slice::from_raw_parts(data, len) };
        overlay.upload(pixels, width, height, 4)?;
        Ok(Status::OK)
    })
}

/// Moves an overlay surface. `S_FALSE` when the window system refused the move.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_surface_set_position(surface: *mut Overlay, x: i32, y: i32) -> i32 {
    let Some(overlay) = (unsafe { surface.as_mut() }) else {
        return Status::INVALID_ARG.code();
    };

    guarded(|| Ok(adjustment_status(overlay.set_position(x, y))))
}

/// Resizes an overlay surface. `S_FALSE` when the window system refused the resize.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_surface_set_size(surface: *mut Overlay, width: i32, height: i32) -> i32 {
    let Some(overlay) = (unsafe { surface.as_mut() }) else {
        return Status::INVALID_ARG.code();
    };

    guarded(|| Ok(adjustment_status(overlay.set_size(dimension(width)?, dimension(height)?)?)))
}

/// X position of an overlay surface, 0 for null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_surface_get_position_x(surface: *const Overlay) -> i32 {
    unsafe { surface.as_ref() }.map_or(0, |overlay| overlay.position().0)
}

/// Y position of an overlay surface, 0 for null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_surface_get_position_y(surface: *const Overlay) -> i32 {
    unsafe { surface.as_ref() }.map_or(0, |overlay| overlay.position().1)
}

/// Width of an overlay surface, 0 for null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_surface_get_width(surface: *const Overlay) -> i32 {
    unsafe { surface.as_ref() }.map_or(0, |overlay| to_c_int(overlay.size().0))
}

/// Height of an overlay surface, 0 for null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_surface_get_height(surface: *const Overlay) -> i32 {
    unsafe { surface.as_ref() }.map_or(0, |overlay| to_c_int(overlay.size().1))
}

/// Primary display width recorded when the surface was created, 0 for null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_surface_get_display_width(surface: *const Overlay) -> i32 {
    unsafe { surface.as_ref() }.map_or(0, |overlay| overlay.display_size().0)
}

/// Primary display height recorded when the surface was created, 0 for null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_surface_get_display_height(surface: *const Overlay) -> i32 {
    unsafe { surface.as_ref() }.map_or(0, |overlay| overlay.display_size().1)
}

/// Dispatches pending window messages of an overlay surface.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_surface_poll_events(surface: *const Overlay) {
    if let Some(overlay) = unsafe { surface.as_ref() } {
        overlay.poll_events();
    }
}

/// Creates a capture session and writes its handle to `out`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_capture_create(out: *mut *mut Capture) -> i32 {
    if out.is_null() {
        return Status::INVALID_ARG.code();
    }
    unsafe { out.write(ptr::null_mut()) };

    guarded(|| {
        let session = Capture::new()?;
        unsafe { out.write(Box::into_raw(Box::new(session))) };
        Ok(Status::OK)
    })
}

/// Destroys a capture session. Null is ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_capture_destroy(session: *mut Capture) {
    if !session.is_null() {
        drop(unsafe { Box::from_raw(session) });
    }
}

/// Copies the next frame into `buffer`, which must hold `width * height * 4`
/// bytes. Returns `S_OK` with `buffer` untouched when no new frame arrived.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_capture_get_frame(session: *mut Capture, buffer: *mut u8) -> i32 {
    let Some(session) = (unsafe { session.as_mut() }) else {
        return Status::INVALID_ARG.code();
    };
    if buffer.is_null() {
        return Status::INVALID_ARG.code();
    }

    guarded(|| {
        let buffer = unsafe { slice::from_raw_parts_mut(buffer, session.buffer_len()) };
        session.get_frame(buffer)?;
        Ok(Status::OK)
    })
}

/// Width of the captured output, 0 for null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_capture_get_width(session: *const Capture) -> i32 {
    unsafe { session.as_ref() }.map_or(0, |session| to_c_int(session.width()))
}

/// Height of the captured output, 0 for null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dovl_capture_get_height(session: *const Capture) -> i32 {
    unsafe { session.as_ref() }.map_or(0, |session| to_c_int(session.height()))
}
