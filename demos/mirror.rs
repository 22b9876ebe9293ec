//! Mirrors a scaled-down copy of the primary display into an overlay until Ctrl+C.

#[cfg(windows)]
mod mirror {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use clap::Parser;
    use desktop_overlay::capture::{CaptureSession, Frame};
    use desktop_overlay::d3d11::Direct3D11;
    use desktop_overlay::overlay::OverlaySurface;
    use desktop_overlay::settings::{CaptureSettings, OverlaySettings};
    use desktop_overlay::window::{WindowClass, Win32Host};

    #[derive(Parser)]
    #[command(name = "Desktop Mirror")]
    #[command(version = "1.0")]
    #[command(about = "Shows a scaled-down live copy of the primary display in a click-through overlay")]
    struct Cli {
        /// Overlay x position
        #[arg(long, default_value_t = 32)]
        x: i32,

        /// Overlay y position
        #[arg(long, default_value_t = 32)]
        y: i32,

        /// Downscale divisor applied to both dimensions
        #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..=64))]
        scale: u32,

        /// Overlay opacity, 0 to 255
        #[arg(long, default_value_t = 200)]
        opacity: u8,

        /// Maximum wait for a new desktop frame in milliseconds
        #[arg(long, default_value_t = 15)]
        timeout_ms: u64,
    }

    /// Nearest-neighbour downscale with premultiplied opacity.
    fn downscale(source: &[u8], width: u32, scale: u32, opacity: u8, target: &mut [u8], target_width: u32) {
        let source_row = width as usize * 4;
        let target_row = target_width as usize * 4;

        for (ty, row) in target.chunks_exact_mut(target_row).enumerate() {
            let sy = ty * scale as usize;
            for (tx, pixel) in row.chunks_exact_mut(4).enumerate() {
                let sx = tx * scale as usize;
                let from = sy * source_row + sx * 4;
                for channel in 0..3 {
                    pixel[channel] = (u16::from(source[from + channel]) * u16::from(opacity) / 255) as u8;
                }
                pixel[3] = opacity;
            }
        }
    }

    pub fn main() -> Result<(), Box<dyn std::error::Error>> {
        let cli = Cli::parse();

        let stop_flag = Arc::new(AtomicBool::new(false));
        {
            let stop_flag = stop_flag.clone();
            ctrlc::set_handler(move || {
                stop_flag.store(true, Ordering::SeqCst);
            })?;
        }

        let _class = WindowClass::register()?;

        let mut session = CaptureSession::create(
            Direct3D11::new(Direct3D11::CAPTURE_FEATURE_LEVEL),
            CaptureSettings { acquire_timeout: Duration::from_millis(cli.timeout_ms) },
        )?;
        let (width, height) = session.size();
        let (target_width, target_height) = ((width / cli.scale).max(1), (height / cli.scale).max(1));

        let mut overlay = OverlaySurface::create(
            Direct3D11::new(Direct3D11::OVERLAY_FEATURE_LEVEL),
            Win32Host,
            OverlaySettings::default(),
            cli.x,
            cli.y,
            target_width,
            target_height,
        )?;
        println!(
            "Mirroring {width}x{height} as {target_width}x{target_height} in {} on a {}x{} display",
            overlay.window_name(),
            overlay.display_size().0,
            overlay.display_size().1
        );

        let mut frame = vec![0; session.buffer_len()];
        let mut scaled = vec![0; target_width as usize * target_height as usize * 4];
        let mut delivered = 0_u64;

        while !stop_flag.load(Ordering::SeqCst) {
            match session.get_frame(&mut frame) {
                Ok(Frame::Delivered(_)) => {
                    downscale(&frame, width, cli.scale, cli.opacity, &mut scaled, target_width);
                    overlay.upload(&scaled, target_width, target_height, 4)?;
                    delivered += 1;
                }
                Ok(Frame::Unchanged) => (),
                Err(e) if e.is_access_lost() => {
                    eprintln!("Desktop duplication access lost, stopping");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            overlay.poll_events();
        }

        println!("Presented {delivered} frame(s)");

        Ok(())
    }
}

#[cfg(windows)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    mirror::main()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("The mirror demo needs Windows desktop duplication");
}
