use catalog::{
    uniform_contract, EffectKind, EffectSpec, UniformLayout, UniformType, LUT_SIZE_UNIFORM,
    RESOLUTION_UNIFORM,
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Binding {
    name: &'static str,
    ty: UniformType,
    value: [f32; 4],
}

/// Final uniform values for one draw.
///
/// Every draw starts from the kind's contract defaults, so a value set on an
/// earlier effect never leaks into a later draw of the same program. Names
/// the program does not declare, and values whose shape does not match the
/// declaration, are skipped. `resolution` and `lutSize` are owned by the
/// renderer and always overwrite caller input.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUniforms {
    kind: EffectKind,
    bindings: Vec<Binding>,
}

impl ResolvedUniforms {
    pub fn resolve(spec: &EffectSpec, resolution: (u32, u32), lut_size: Option<u32>) -> Self {
        let mut bindings: Vec<Binding> = std::iter::once(Binding {
            name: RESOLUTION_UNIFORM,
            ty: UniformType::Vec2,
            value: [0.0; 4],
        })
        .chain(uniform_contract(spec.kind).iter().map(|decl| Binding {
            name: decl.name,
            ty: decl.ty,
            value: decl.default,
        }))
        .collect();

        for (name, value) in &spec.uniforms {
            let Some(binding) = bindings.iter_mut().find(|binding| binding.name == name) else {
                debug!(kind = %spec.kind, uniform = %name, "skipping uniform the program does not declare");
                continue;
            };
            if value.ty() != Some(binding.ty) {
                debug!(
                    kind = %spec.kind,
                    uniform = %name,
                    expected = binding.ty.glsl_name(),
                    "skipping uniform with mismatched shape"
                );
                continue;
            }
            binding.value = value.components();
        }

        let mut resolved = Self {
            kind: spec.kind,
            bindings,
        };
        resolved.set(
            RESOLUTION_UNIFORM,
            [resolution.0 as f32, resolution.1 as f32, 0.0, 0.0],
        );
        if let Some(size) = lut_size {
            resolved.set(LUT_SIZE_UNIFORM, [size as f32, 0.0, 0.0, 0.0]);
        }
        resolved
    }

    fn set(&mut self, name: &str, value: [f32; 4]) {
        if let Some(binding) = self.bindings.iter_mut().find(|binding| binding.name == name) {
            binding.value = value;
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn get(&self, name: &str) -> Option<[f32; 4]> {
        self.bindings
            .iter()
            .find(|binding| binding.name == name)
            .map(|binding| binding.value)
    }

    /// Scalar value, or 0.0 for a name the program does not declare.
    pub fn float(&self, name: &str) -> f32 {
        self.get(name).map_or(0.0, |value| value[0])
    }

    pub fn vec2(&self, name: &str) -> [f32; 2] {
        let value = self.get(name).unwrap_or_default();
        [value[0], value[1]]
    }

    pub fn vec3(&self, name: &str) -> [f32; 3] {
        let value = self.get(name).unwrap_or_default();
        [value[0], value[1], value[2]]
    }

    /// Contents of the program's `EffectParams` block as 32-bit words.
    pub fn std140_words(&self) -> Vec<f32> {
        UniformLayout::for_kind(self.kind).pack(|name| self.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::UniformValue;

    #[test]
    fn defaults_fill_unset_uniforms() {
        let spec = EffectSpec::new(EffectKind::Vignette).with("amount", 1.0);
        let resolved = ResolvedUniforms::resolve(&spec, (64, 32), None);
        assert_eq!(resolved.float("amount"), 1.0);
        assert_eq!(resolved.float("size"), 0.5);
        assert_eq!(resolved.float("softness"), 0.3);
        assert_eq!(resolved.vec2("resolution"), [64.0, 32.0]);
    }

    #[test]
    fn undeclared_and_mismatched_values_are_skipped() {
        let spec = EffectSpec::new(EffectKind::ChromaKey)
            .with("unknown", 3.0)
            .with("tolerance", [0.1, 0.2])
            .with("keyColor", UniformValue::Other(vec![1.0; 5]));
        let resolved = ResolvedUniforms::resolve(&spec, (8, 8), None);
        assert_eq!(resolved.get("unknown"), None);
        assert_eq!(resolved.float("tolerance"), 0.3);
        assert_eq!(resolved.vec3("keyColor"), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn renderer_owned_uniforms_win() {
        let spec = EffectSpec::new(EffectKind::Lut)
            .with("resolution", [1.0, 1.0])
            .with("lutSize", 4.0);
        let resolved = ResolvedUniforms::resolve(&spec, (320, 240), Some(32));
        assert_eq!(resolved.vec2("resolution"), [320.0, 240.0]);
        assert_eq!(resolved.float("lutSize"), 32.0);
    }

    #[test]
    fn words_follow_the_block_layout() {
        let spec = EffectSpec::new(EffectKind::ChromaKey).with("spillSuppression", 0.5);
        let words = ResolvedUniforms::resolve(&spec, (10, 20), None).std140_words();
        assert_eq!(words.len(), 12);
        assert_eq!(&words[0..2], &[10.0, 20.0]);
        assert_eq!(&words[4..7], &[0.0, 1.0, 0.0]);
        assert_eq!(words[7], 0.3);
        assert_eq!(words[9], 0.5);
    }
}
