use crate::kind::EffectKind;
use crate::shaders::uniform_contract;
use crate::uniform::UniformType;

/// Name of the uniform every program receives ahead of its own contract.
pub const RESOLUTION_UNIFORM: &str = "resolution";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: &'static str,
    pub ty: UniformType,
    /// Byte offset inside the std140 block.
    pub offset: usize,
}

/// std140 placement of a program's `EffectParams` block.
///
/// Field order matches the generated GLSL declaration: `resolution` first,
/// then the kind's contract in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    slots: Vec<UniformSlot>,
    size: usize,
}

impl UniformLayout {
    pub fn for_kind(kind: EffectKind) -> Self {
        let fields = std::iter::once((RESOLUTION_UNIFORM, UniformType::Vec2)).chain(
            uniform_contract(kind)
                .iter()
                .map(|decl| (decl.name, decl.ty)),
        );

        let mut slots = Vec::new();
        let mut cursor = 0usize;
        for (name, ty) in fields {
            let offset = align_to(cursor, ty.std140_align());
            slots.push(UniformSlot { name, ty, offset });
            cursor = offset + ty.std140_size();
        }

        Self {
            slots,
            size: align_to(cursor.max(16), 16),
        }
    }

    pub fn slots(&self) -> &[UniformSlot] {
        &self.slots
    }

    /// Block size in bytes, rounded up to a multiple of 16.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    /// Packs values into 32-bit words ready for upload.
    ///
    /// `lookup` returns the components for a slot name; slots it returns
    /// `None` for stay zeroed.
    pub fn pack(&self, lookup: impl Fn(&str) -> Option<[f32; 4]>) -> Vec<f32> {
        let mut words = vec![0.0f32; self.size / 4];
        for slot in &self.slots {
            if let Some(components) = lookup(slot.name) {
                let start = slot.offset / 4;
                let count = slot.ty.components();
                words[start..start + count].copy_from_slice(&components[..count]);
            }
        }
        words
    }
}

fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chroma_key_vec3_is_aligned_to_sixteen() {
        let layout = UniformLayout::for_kind(EffectKind::ChromaKey);
        assert_eq!(layout.slot("resolution").unwrap().offset, 0);
        assert_eq!(layout.slot("keyColor").unwrap().offset, 16);
        assert_eq!(layout.slot("tolerance").unwrap().offset, 28);
        assert_eq!(layout.slot("softness").unwrap().offset, 32);
        assert_eq!(layout.slot("spillSuppression").unwrap().offset, 36);
        assert_eq!(layout.size(), 48);
    }

    #[test]
    fn scalars_pack_after_resolution() {
        let layout = UniformLayout::for_kind(EffectKind::Blur);
        assert_eq!(layout.slot("radius").unwrap().offset, 8);
        assert_eq!(layout.size(), 16);

        let words = layout.pack(|name| match name {
            "resolution" => Some([640.0, 480.0, 0.0, 0.0]),
            "radius" => Some([2.5, 0.0, 0.0, 0.0]),
            _ => None,
        });
        assert_eq!(words, vec![640.0, 480.0, 2.5, 0.0]);
    }

    #[test]
    fn every_kind_has_a_block() {
        for kind in EffectKind::ALL {
            let layout = UniformLayout::for_kind(kind);
            assert_eq!(layout.size() % 16, 0, "{kind}");
            assert_eq!(layout.slots().len(), uniform_contract(kind).len() + 1);
        }
    }
}
