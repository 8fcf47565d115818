//! Command line options.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use fractus_app::AppConfig;
use fractus_core::{FractalFamily, RenderMode, ViewConfig};

/// Environment variable overriding the kernel directory.
pub const KERNEL_DIR_ENV: &str = "FRACTUS_KERNEL_DIR";

/// What the command line asked for.
#[derive(Debug)]
pub enum Command {
    Help,
    Run(AppConfig),
}

/// Parse `args` (without the program name) on top of `config`.
///
/// Flags apply in order, so `--family` after `--view-config` wins.
pub fn parse<I>(args: I, mut config: AppConfig) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| anyhow!("{flag} expects a value"))
        };

        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--size" => {
                let (width, height) = parse_size(&value("--size")?)?;
                config = config.with_size(width, height);
            }
            "--vsync" => config = config.with_vsync(true),
            "--no-vsync" => config = config.with_vsync(false),
            "--fullscreen" => config = config.with_fullscreen(true),
            "--validation" => config = config.with_validation(true),
            "--no-async-compute" => config = config.with_async_compute(false),
            "--kernels" => config = config.with_kernel_dir(PathBuf::from(value("--kernels")?)),
            "--slots" => {
                let raw = value("--slots")?;
                let slots = raw
                    .parse()
                    .with_context(|| format!("invalid slot count '{raw}'"))?;
                config = config.with_slots(slots);
            }
            "--family" => {
                let family = parse_family(&value("--family")?)?;
                config.view = config.view.with_family(family);
            }
            "--detail-only" => config.view.mode = RenderMode::DetailOnly,
            "--view-config" => config.view = load_view_config(&value("--view-config")?)?,
            other => bail!("unknown option '{other}' (see --help)"),
        }
    }

    config.validate()?;
    Ok(Command::Run(config))
}

fn load_view_config(path: &str) -> anyhow::Result<ViewConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read view config '{path}'"))?;
    ViewConfig::from_toml_str(&text).with_context(|| format!("in view config '{path}'"))
}

fn parse_size(raw: &str) -> anyhow::Result<(u32, u32)> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("size must look like WIDTHxHEIGHT, got '{raw}'"))?;
    let width = width
        .parse()
        .with_context(|| format!("invalid width in '{raw}'"))?;
    let height = height
        .parse()
        .with_context(|| format!("invalid height in '{raw}'"))?;
    Ok((width, height))
}

fn parse_family(raw: &str) -> anyhow::Result<FractalFamily> {
    match raw.to_ascii_lowercase().as_str() {
        "mandelbrot" => Ok(FractalFamily::Mandelbrot),
        "tricorn" => Ok(FractalFamily::Tricorn),
        "burningship" | "burning-ship" => Ok(FractalFamily::BurningShip),
        _ => bail!("unknown fractal family '{raw}' (mandelbrot, tricorn, burningship)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fractus_app::KernelSource;

    fn run(args: &[&str]) -> anyhow::Result<AppConfig> {
        match parse(args.iter().map(ToString::to_string), AppConfig::default())? {
            Command::Run(config) => Ok(config),
            Command::Help => bail!("unexpected help"),
        }
    }

    #[test]
    fn no_arguments_keep_defaults() {
        let config = run(&[]).unwrap();
        assert_eq!((config.width, config.height), (1280, 720));
        assert!(config.vsync);
        assert_eq!(config.view.mode, RenderMode::Base);
    }

    #[test]
    fn flags_apply_in_order() {
        let config = run(&[
            "--size",
            "800x600",
            "--no-vsync",
            "--family",
            "burning-ship",
            "--detail-only",
            "--slots",
            "2",
            "--kernels",
            "/opt/kernels",
        ])
        .unwrap();

        assert_eq!((config.width, config.height), (800, 600));
        assert!(!config.vsync);
        assert_eq!(config.view.family, FractalFamily::BurningShip);
        assert_eq!(config.view.mode, RenderMode::DetailOnly);
        assert_eq!(config.slots, 2);
        assert_eq!(
            config.kernels,
            KernelSource::Directory(PathBuf::from("/opt/kernels"))
        );
    }

    #[test]
    fn built_in_kernels_without_flag() {
        assert_eq!(run(&[]).unwrap().kernels, KernelSource::Embedded);
    }

    #[test]
    fn view_config_file_then_flags() {
        let path = std::env::temp_dir().join(format!("fractus-view-{}.toml", std::process::id()));
        std::fs::write(&path, "family = \"tricorn\"\nmax_iterations = 64.0\n").unwrap();
        let path = path.to_string_lossy().into_owned();

        let config = run(&["--view-config", &path, "--detail-only"]).unwrap();
        assert_eq!(config.view.family, FractalFamily::Tricorn);
        assert_eq!(config.view.mode, RenderMode::DetailOnly);
        assert_relative_eq!(config.view.max_iterations, 64.0);

        let config = run(&["--view-config", &path, "--family", "mandelbrot"]).unwrap();
        assert_eq!(config.view.family, FractalFamily::Mandelbrot);

        std::fs::remove_file(&path).unwrap();
        assert!(run(&["--view-config", &path]).is_err());
    }

    #[test]
    fn help_wins() {
        let command = parse(
            ["--size", "800x600", "--help"].map(String::from),
            AppConfig::default(),
        )
        .unwrap();
        assert!(matches!(command, Command::Help));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(run(&["--size", "800"]).is_err());
        assert!(run(&["--size", "100x100"]).is_err());
        assert!(run(&["--slots", "0"]).is_err());
        assert!(run(&["--slots"]).is_err());
        assert!(run(&["--family", "julia"]).is_err());
        assert!(run(&["--frobnicate"]).is_err());
    }
}
