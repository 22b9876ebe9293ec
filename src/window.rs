//! Win32 implementation of [`WindowHost`].
//!
//! Overlay windows are visible popups without a redirection surface; their
//! content comes from a composition visual. They are input-transparent,
//! topmost and never activated. They belong to one window class that must be
//! registered before the first overlay is created, see [`WindowClass`].
use log::{debug, warn};
use windows::Win32::Foundation::{ERROR_CLASS_ALREADY_EXISTS, GetLastError, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::ValidateRect;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetSystemMetrics, HWND_TOPMOST, MSG, PM_REMOVE,
    PeekMessageW, RegisterClassExW, SM_CXSCREEN, SM_CYSCREEN, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SWP_NOZORDER,
    SetWindowPos, TranslateMessage, UnregisterClassW, WM_DESTROY, WM_ERASEBKGND, WM_NCHITTEST, WM_PAINT, WNDCLASSEXW,
    WS_EX_NOACTIVATE, WS_EX_NOREDIRECTIONBITMAP, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP, WS_VISIBLE,
};
use windows::core::{HSTRING, PCWSTR, w};

use crate::driver::{RawWindow, WindowHost};
use crate::error::{Error, Status};

/// Name of the overlay window class.
pub const WINDOW_CLASS_NAME: PCWSTR = w!("DESKTOP_OVERLAY_SURFACE");

/// `HTTRANSPARENT`: hit tests fall through to the window underneath.
const HIT_TRANSPARENT: LRESULT = LRESULT(-1);

unsafe extern "system" fn overlay_window_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match msg {
        WM_ERASEBKGND => LRESULT(1),
        WM_PAINT => {
            // Nothing is drawn through GDI; validating stops repeated WM_PAINT.
            let _ = unsafe { ValidateRect(Some(hwnd), None) };
            LRESULT(0)
        }
        WM_NCHITTEST => HIT_TRANSPARENT,
        WM_DESTROY => LRESULT(0),
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

/// Registers the overlay window class. Registering twice is not an error.
///
/// # Errors
///
/// Returns [`Error::Driver`] when the module handle cannot be resolved or the
/// class cannot be registered.
pub fn register_window_class() -> Result<(), Error> {
    let instance = unsafe { GetModuleHandleW(None)? };
    let class = WNDCLASSEXW {
        cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
        lpfnWndProc: Some(overlay_window_proc),
        hInstance: instance.into(),
        lpszClassName: WINDOW_CLASS_NAME,
        ..Default::default()
    };

    if unsafe { RegisterClassExW(&class) } == 0 {
        let error = unsafe { GetLastError() };
        if error != ERROR_CLASS_ALREADY_EXISTS {
            return Err(Error::from(Status(error.to_hresult().0)));
        }
    }

    debug!("Registered overlay window class");
    Ok(())
}

/// Unregisters the overlay window class.
///
/// # Errors
///
/// Returns [`Error::Driver`] if the class is unknown or windows of the class
/// still exist.
pub fn unregister_window_class() -> Result<(), Error> {
    let instance = unsafe { GetModuleHandleW(None)? };
    unsafe { UnregisterClassW(WINDOW_CLASS_NAME, Some(instance.into()))? };

    debug!("Unregistered overlay window class");
    Ok(())
}

/// Keeps the overlay window class registered until dropped.
#[must_use = "the window class is unregistered when the guard is dropped"]
pub struct WindowClass {
    _private: (),
}

impl WindowClass {
    /// Registers the overlay window class.
    ///
    /// # Errors
    ///
    /// See [`register_window_class`].
    pub fn register() -> Result<Self, Error> {
        register_window_class()?;
        Ok(Self { _private: () })
    }
}

impl Drop for WindowClass {
    fn drop(&mut self) {
        if let Err(e) = unregister_window_class() {
            warn!("Failed to unregister overlay window class: {e}");
        }
    }
}

/// An overlay window. Destroyed when dropped.
#[derive(Debug)]
pub struct HostWindow {
    hwnd: HWND,
}

impl HostWindow {
    /// Gets the raw window handle.
    #[inline]
    #[must_use]
    pub const fn as_raw_hwnd(&self) -> HWND {
        self.hwnd
    }
}

impl Drop for HostWindow {
    fn drop(&mut self) {
        if let Err(e) = unsafe { DestroyWindow(self.hwnd) } {
            warn!("Failed to destroy overlay window: {e}");
        }
    }
}

/// Creates overlay windows of the class registered by [`register_window_class`].
#[derive(Eq, PartialEq, Clone, Copy, Debug, Default)]
pub struct Win32Host;

impl WindowHost for Win32Host {
    type Window = HostWindow;

    fn create_window(&self, name: &str, x: i32, y: i32, width: i32, height: i32) -> Result<Self::Window, Error> {
        let instance = unsafe { GetModuleHandleW(None)? };
        let title = HSTRING::from(name);

        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_NOREDIRECTIONBITMAP | WS_EX_NOACTIVATE | WS_EX_TRANSPARENT | WS_EX_TOPMOST,
                WINDOW_CLASS_NAME,
                &title,
                WS_POPUP | WS_VISIBLE,
                x,
                y,
                width,
                height,
                None,
                None,
                Some(instance.into()),
                None,
            )?
        };
        let window = HostWindow { hwnd };

        // The extended styles only take effect after a position change.
        if let Err(e) = unsafe { SetWindowPos(hwnd, Some(HWND_TOPMOST), 0, 0, 0, 0, SWP_NOSIZE | SWP_NOMOVE) } {
            warn!("Failed to raise overlay window {name} to the top: {e}");
        }

        Ok(window)
    }

    #[inline]
    fn raw_window(&self, window: &Self::Window) -> RawWindow {
        RawWindow(window.hwnd.0 as isize)
    }

    fn move_window(&self, window: &Self::Window, x: i32, y: i32) -> Result<(), Error> {
        unsafe { SetWindowPos(window.hwnd, None, x, y, 0, 0, SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE)? };
        Ok(())
    }

    fn resize_window(&self, window: &Self::Window, width: i32, height: i32) -> Result<(), Error> {
        unsafe { SetWindowPos(window.hwnd, None, 0, 0, width, height, SWP_NOMOVE | SWP_NOZORDER | SWP_NOACTIVATE)? };
        Ok(())
    }

    fn pump_messages(&self, window: &Self::Window) {
        let mut msg = MSG::default();
        unsafe {
            while PeekMessageW(&mut msg, Some(window.hwnd), 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    fn display_size(&self) -> (i32, i32) {
        unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) }
    }
}
