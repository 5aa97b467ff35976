use tracing::{debug, info};

use crate::gpu::context::{adapter_capabilities, create_instance, request_adapter};
use crate::types::{GpuCapabilities, GpuPowerPreference};

/// Reports what the graphics hardware supports.
///
/// Probing never fails: when no adapter can be created the probe answers
/// with [`GpuCapabilities::unavailable`].
pub trait CapabilityProbe {
    fn probe(&self) -> GpuCapabilities;
}

/// Asks wgpu for an adapter and reads its limits. The adapter is dropped
/// before returning.
#[derive(Debug, Clone, Copy, Default)]
pub struct WgpuProbe {
    pub power: GpuPowerPreference,
}

impl WgpuProbe {
    pub fn new(power: GpuPowerPreference) -> Self {
        Self { power }
    }
}

impl CapabilityProbe for WgpuProbe {
    fn probe(&self) -> GpuCapabilities {
        let instance = create_instance();
        match request_adapter(&instance, self.power) {
            Ok(adapter) => {
                let capabilities = adapter_capabilities(&adapter);
                info!(
                    renderer = %capabilities.renderer,
                    max_texture_size = capabilities.max_texture_size,
                    full_featured = capabilities.full_featured,
                    "probed GPU"
                );
                capabilities
            }
            Err(err) => {
                debug!(error = %format!("{err:#}"), "GPU probe found no adapter");
                GpuCapabilities::unavailable()
            }
        }
    }
}

/// Reports the CPU rasterizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareProbe;

impl CapabilityProbe for SoftwareProbe {
    fn probe(&self) -> GpuCapabilities {
        GpuCapabilities::software_rasterizer()
    }
}

/// Returns a fixed answer. Useful to pin a quality tier.
#[derive(Debug, Clone)]
pub struct FixedProbe(pub GpuCapabilities);

impl CapabilityProbe for FixedProbe {
    fn probe(&self) -> GpuCapabilities {
        self.0.clone()
    }
}

/// Probes the default high-performance adapter.
pub fn probe() -> GpuCapabilities {
    WgpuProbe::default().probe()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_probe_is_available_but_small() {
        let caps = SoftwareProbe.probe();
        assert!(caps.available);
        assert!(caps.software);
        assert!(!caps.full_featured);
        assert!(caps.max_texture_size < 4096);
    }

    #[test]
    fn unavailable_serializes_all_false() {
        let caps = FixedProbe(GpuCapabilities::unavailable()).probe();
        let json = serde_json::to_value(&caps).unwrap();
        assert_eq!(json["available"], false);
        assert_eq!(json["full_featured"], false);
        assert_eq!(json["max_texture_size"], 0);
    }
}
