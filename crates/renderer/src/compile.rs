use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::backend::ShaderDiagnostics;

/// Compiles a catalog GLSL stage, capturing validation errors instead of
/// letting wgpu's uncaptured error handler panic.
pub(crate) fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, ShaderDiagnostics> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_owned()),
            stage,
            defines: &[],
        },
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(ShaderDiagnostics::new(stage_name(stage), err.to_string())),
        None => Ok(module),
    }
}

pub(crate) fn stage_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
        ShaderStage::Compute => "compute",
        _ => "shader",
    }
}

#[cfg(test)]
mod tests {
    use catalog::{fragment_source, vertex_source, EffectKind};
    use wgpu::naga::front::glsl::{Frontend, Options};
    use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

    use super::*;

    fn validate(label: &str, source: &str, stage: ShaderStage) {
        let module = Frontend::default()
            .parse(&Options::from(stage), source)
            .unwrap_or_else(|err| panic!("{label} {} failed to parse: {err:?}", stage_name(stage)));
        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .unwrap_or_else(|err| panic!("{label} {} failed to validate: {err:?}", stage_name(stage)));
    }

    #[test]
    fn catalog_programs_parse_and_validate() {
        validate("shared", vertex_source(), ShaderStage::Vertex);
        for kind in EffectKind::ALL {
            validate(kind.as_str(), &fragment_source(kind), ShaderStage::Fragment);
        }
    }

    #[test]
    fn broken_fragment_is_rejected_by_frontend() {
        let source = "#version 450\nlayout(location = 0) out vec4 color;\nvoid main() { color = undefined_value; }\n";
        assert!(Frontend::default()
            .parse(&Options::from(ShaderStage::Fragment), source)
            .is_err());
    }

    #[test]
    fn stage_names() {
        assert_eq!(stage_name(ShaderStage::Vertex), "vertex");
        assert_eq!(stage_name(ShaderStage::Fragment), "fragment");
    }
}
