//! Fractus fractal viewer
//!
//! Renders the Mandelbrot, Tricorn and Burning Ship fractals with Vulkan
//! compute, alongside a minimap of the matching Julia set.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p fractus-viewer -- [OPTIONS]
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)
//! - `FRACTUS_KERNEL_DIR`: Load `.spv` kernels from this directory instead of the built-in ones

mod options;

use fractus_app::{run_app, AppConfig};

use crate::options::{Command, KERNEL_DIR_ENV};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> anyhow::Result<()> {
    let mut config = AppConfig::new("Fractus").with_size(WIDTH, HEIGHT);
    if let Some(dir) = std::env::var_os(KERNEL_DIR_ENV) {
        config = config.with_kernel_dir(dir);
    }

    match options::parse(std::env::args().skip(1), config)? {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Run(config) => run_app(config),
    }
}

fn print_help() {
    eprintln!(
        "Fractus fractal viewer

USAGE:
    cargo run -p fractus-viewer -- [OPTIONS]

DISPLAY OPTIONS:
    --size <WxH>            Initial window size (default: 1280x720, minimum 300x200)
    --vsync                 Present with vsync (default)
    --no-vsync              Present without vsync
    --fullscreen            Start in borderless fullscreen

RENDER OPTIONS:
    --family <NAME>         mandelbrot, tricorn or burningship (default: mandelbrot)
    --detail-only           Start in detail-only mode (no minimap)
    --view-config <FILE>    TOML file with the starting view (family, center, scale, ...)
    --slots <N>             Frames in flight (default: 3)
    --kernels <DIR>         Load compiled kernels from DIR instead of the built-in ones
    --no-async-compute      Run compute on the present queue family
    --validation            Enable Vulkan validation layers

CONTROLS:
    W A S D                 Pan
    Q / E                   Zoom out / in
    Left mouse (hold)       Pick the Julia seed under the cursor
    1 2 3                   Select fractal family
    Space                   Toggle detail-only mode
    V                       Toggle vsync
    Alt+Enter               Toggle fullscreen
    Escape                  Quit

OTHER:
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)
    {KERNEL_DIR_ENV}      Kernel directory, overridden by --kernels"
    );
}
