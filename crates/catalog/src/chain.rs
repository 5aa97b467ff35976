use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kind::{EffectKind, UnknownEffectKind};
use crate::shaders::uniform_contract;
use crate::uniform::UniformValue;

/// Name of the uniform the realtime loop fills with the playback clock.
pub const TIME_UNIFORM: &str = "time";

#[derive(Debug, thiserror::Error)]
pub enum ChainParseError {
    #[error(transparent)]
    UnknownKind(#[from] UnknownEffectKind),
    #[error("malformed effect chain: {0}")]
    Json(#[from] serde_json::Error),
}

/// One requested transformation: a catalog kind plus its uniform values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSpec {
    pub kind: EffectKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub uniforms: BTreeMap<String, UniformValue>,
}

impl EffectSpec {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            uniforms: BTreeMap::new(),
        }
    }

    /// Sets a uniform, replacing any previous value with the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        self.uniforms.insert(name.into(), value.into());
        self
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }
}

/// Ordered list of effects applied to one frame. Order is significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectChain {
    effects: Vec<EffectSpec>,
}

#[derive(Deserialize)]
struct RawSpec {
    kind: String,
    #[serde(default)]
    uniforms: BTreeMap<String, UniformValue>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON array of `{ "kind": ..., "uniforms": {...} }` objects.
    ///
    /// Every kind is resolved against the catalog before a chain is returned,
    /// so an unknown kind never reaches a renderer.
    pub fn from_json(source: &str) -> Result<Self, ChainParseError> {
        let raw: Vec<RawSpec> = serde_json::from_str(source)?;
        let effects = raw
            .into_iter()
            .map(|spec| {
                Ok(EffectSpec {
                    kind: spec.kind.parse()?,
                    uniforms: spec.uniforms,
                })
            })
            .collect::<Result<Vec<_>, UnknownEffectKind>>()?;
        Ok(Self { effects })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn push(&mut self, spec: EffectSpec) {
        self.effects.push(spec);
    }

    pub fn then(mut self, spec: EffectSpec) -> Self {
        self.effects.push(spec);
        self
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EffectSpec> {
        self.effects.iter()
    }

    pub fn effects(&self) -> &[EffectSpec] {
        &self.effects
    }

    /// Whether any effect declares a `time` uniform the caller left unset.
    pub fn needs_clock(&self) -> bool {
        self.effects.iter().any(|spec| {
            !spec.uniforms.contains_key(TIME_UNIFORM)
                && uniform_contract(spec.kind)
                    .iter()
                    .any(|decl| decl.name == TIME_UNIFORM)
        })
    }

    /// Copy of the chain where unset `time` uniforms read `seconds`.
    pub fn at_time(&self, seconds: f32) -> Self {
        let effects = self
            .effects
            .iter()
            .map(|spec| {
                let declares_time = uniform_contract(spec.kind)
                    .iter()
                    .any(|decl| decl.name == TIME_UNIFORM);
                let mut spec = spec.clone();
                if declares_time {
                    spec.uniforms
                        .entry(TIME_UNIFORM.to_string())
                        .or_insert(UniformValue::Float(seconds));
                }
                spec
            })
            .collect();
        Self { effects }
    }
}

impl From<Vec<EffectSpec>> for EffectChain {
    fn from(effects: Vec<EffectSpec>) -> Self {
        Self { effects }
    }
}

impl FromIterator<EffectSpec> for EffectChain {
    fn from_iter<T: IntoIterator<Item = EffectSpec>>(iter: T) -> Self {
        Self {
            effects: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EffectChain {
    type Item = &'a EffectSpec;
    type IntoIter = std::slice::Iter<'a, EffectSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.effects.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ordered_chain() {
        let chain = EffectChain::from_json(
            r#"[
                {"kind": "vignette", "uniforms": {"amount": 1.0, "size": 0.5}},
                {"kind": "chromaKey", "uniforms": {"keyColor": [0, 1, 0]}},
                {"kind": "blur"}
            ]"#,
        )
        .unwrap();

        let kinds: Vec<_> = chain.iter().map(|spec| spec.kind).collect();
        assert_eq!(
            kinds,
            [EffectKind::Vignette, EffectKind::ChromaKey, EffectKind::Blur]
        );
        assert_eq!(
            chain.effects()[1].uniform("keyColor"),
            Some(&UniformValue::Vec3([0.0, 1.0, 0.0]))
        );
    }

    #[test]
    fn unknown_kind_is_a_typed_error() {
        let err = EffectChain::from_json(r#"[{"kind": "blur"}, {"kind": "nonexistent"}]"#)
            .unwrap_err();
        match err {
            ChainParseError::UnknownKind(UnknownEffectKind(name)) => {
                assert_eq!(name, "nonexistent")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = EffectChain::from_json("{").unwrap_err();
        assert!(matches!(err, ChainParseError::Json(_)));
    }

    #[test]
    fn clock_only_fills_unset_time() {
        let chain = EffectChain::new()
            .then(EffectSpec::new(EffectKind::Distortion).with("mode", 2.0))
            .then(EffectSpec::new(EffectKind::Distortion).with("time", 9.0))
            .then(EffectSpec::new(EffectKind::Blur));
        assert!(chain.needs_clock());

        let timed = chain.at_time(1.5);
        assert_eq!(
            timed.effects()[0].uniform("time"),
            Some(&UniformValue::Float(1.5))
        );
        assert_eq!(
            timed.effects()[1].uniform("time"),
            Some(&UniformValue::Float(9.0))
        );
        assert_eq!(timed.effects()[2].uniform("time"), None);
        assert!(!timed.needs_clock());
    }

    #[test]
    fn serializes_back_to_wire_names() {
        let chain = EffectChain::new().then(EffectSpec::new(EffectKind::EdgeDetect));
        let json = chain.to_json().unwrap();
        assert!(json.contains("\"edgeDetect\""));
        assert_eq!(EffectChain::from_json(&json).unwrap(), chain);
    }
}
