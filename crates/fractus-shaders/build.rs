//! Build script compiling the fractal kernels from GLSL to SPIR-V.

use shaderc::{Compiler, ShaderKind};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let shader_dir = Path::new("shaders");

    println!("cargo:rerun-if-changed=shaders/");

    let compiler = Compiler::new().expect("Failed to create shader compiler");

    let mut sources: Vec<PathBuf> = fs::read_dir(shader_dir)
        .expect("Failed to read shaders/")
        .map(|entry| entry.expect("Failed to read shader entry").path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "comp"))
        .collect();
    sources.sort();

    for source in &sources {
        let output = out_dir.join(source.with_extension("spv").file_name().expect("file name"));
        compile_kernel(&compiler, source, &output);
    }
}

fn compile_kernel(compiler: &Compiler, input: &Path, output: &Path) {
    let source = fs::read_to_string(input)
        .unwrap_or_else(|e| panic!("Failed to read kernel {}: {e}", input.display()));
    let file_name = input
        .file_name()
        .and_then(|name| name.to_str())
        .expect("kernel file names are UTF-8");

    let mut options = shaderc::CompileOptions::new().expect("Failed to create compile options");
    options.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_3 as u32,
    );
    options.set_target_spirv(shaderc::SpirvVersion::V1_6);
    options.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let artifact = compiler
        .compile_into_spirv(&source, ShaderKind::Compute, file_name, "main", Some(&options))
        .unwrap_or_else(|e| panic!("Failed to compile kernel {}: {e}", input.display()));

    if artifact.get_num_warnings() > 0 {
        println!(
            "cargo:warning={}: {}",
            input.display(),
            artifact.get_warning_messages()
        );
    }

    fs::write(output, bytemuck::cast_slice::<u32, u8>(artifact.as_binary()))
        .unwrap_or_else(|e| panic!("Failed to write kernel {}: {e}", output.display()));
}
