use std::time::Duration;

use crate::registry::WindowRegistry;

/// Default wait for a new desktop frame.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(15);

/// How the compositor interprets the alpha channel of an overlay.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Default)]
pub enum AlphaMode {
    /// Color channels are already multiplied by alpha.
    #[default]
    Premultiplied,
    /// Alpha is ignored and the surface is opaque.
    Ignore,
}

/// Swap chain parameters used both at creation and on resize.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub struct SwapChainConfig {
    /// Number of buffers, 2 for double buffering.
    pub buffer_count: u32,
    /// Alpha interpretation.
    pub alpha_mode: AlphaMode,
    /// Whether presents may tear.
    pub allow_tearing: bool,
}

impl Default for SwapChainConfig {
    fn default() -> Self {
        Self { buffer_count: 2, alpha_mode: AlphaMode::Premultiplied, allow_tearing: true }
    }
}

/// Overlay surface settings.
#[derive(Clone, Copy, Debug)]
pub struct OverlaySettings {
    /// Swap chain parameters.
    pub swap_chain: SwapChainConfig,
    /// Registry the overlay window identifier is leased from.
    pub registry: &'static WindowRegistry,
}

impl OverlaySettings {
    /// Overlay settings leasing window identifiers from `registry`.
    #[inline]
    #[must_use]
    pub fn with_registry(registry: &'static WindowRegistry) -> Self {
        Self { registry, ..Self::default() }
    }
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self { swap_chain: SwapChainConfig::default(), registry: WindowRegistry::global() }
    }
}

/// Capture session settings.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub struct CaptureSettings {
    /// Maximum wait for a new desktop frame in [`crate::capture::CaptureSession::get_frame`].
    pub acquire_timeout: Duration,
}

impl CaptureSettings {
    /// Acquisition timeout in whole milliseconds, saturated to `u32`.
    #[inline]
    #[must_use]
    pub fn acquire_timeout_ms(&self) -> u32 {
        u32::try_from(self.acquire_timeout.as_millis()).unwrap_or(u32::MAX)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self { acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT }
    }
}
