//! Post-processing plan and runtime settings.
//!
//! The pass list is decided once from [`ExperimentConfig`] and never rebuilt.
//! Each optional pass carries an `enabled` flag in [`PostSettings`]; turning
//! it off makes the pass a no-op for that frame. The GPU side lives in
//! `gpu::post_process` and walks [`PassPlan::passes`] in order.

use crate::config::{AoParams, BloomParams, ExperimentConfig, MotionBlurParams, ToneMapping};
use crate::controls::{Controls, ParamValue, Tweakable};

/// Exponent applied to the exposure slider before it reaches tone mapping.
pub const EXPOSURE_CURVE: f32 = 4.0;

/// One image-space stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Rasterize the scene into the HDR target.
    Scene,
    /// Threshold, blur and add bright regions.
    Bloom,
    /// Darken creases from the depth buffer.
    AmbientOcclusion,
    /// Blend the current image with the saved previous frame.
    AfterimageBlend,
    /// Copy the blended image into the persistent history target.
    AfterimageSave,
    /// Tone map into the visible surface.
    Output,
}

impl PassKind {
    /// Only the output pass writes to the visible surface.
    pub fn writes_surface(self) -> bool {
        matches!(self, PassKind::Output)
    }
}

/// Ordered pass list for one experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassPlan {
    passes: Vec<PassKind>,
}

impl PassPlan {
    /// `Scene`, then bloom, ambient occlusion and the motion-blur pair as
    /// configured, then `Output`.
    pub fn from_config(config: &ExperimentConfig) -> Self {
        let mut passes = vec![PassKind::Scene];
        if config.bloom.is_some() {
            passes.push(PassKind::Bloom);
        }
        if config.ambient_occlusion.is_some() {
            passes.push(PassKind::AmbientOcclusion);
        }
        if config.motion_blur.is_some() {
            passes.push(PassKind::AfterimageBlend);
            passes.push(PassKind::AfterimageSave);
        }
        passes.push(PassKind::Output);
        Self { passes }
    }

    pub fn passes(&self) -> &[PassKind] {
        &self.passes
    }

    pub fn contains(&self, pass: PassKind) -> bool {
        self.passes.contains(&pass)
    }

    /// Passes that do work this frame given the enable flags.
    pub fn active<'a>(&'a self, settings: &'a PostSettings) -> impl Iterator<Item = PassKind> + 'a {
        self.passes.iter().copied().filter(move |p| settings.is_enabled(*p))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    pub enabled: bool,
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AoSettings {
    pub enabled: bool,
    pub params: AoParams,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AfterimageSettings {
    pub enabled: bool,
    pub damp: f32,
}

/// Runtime-mutable parameters of every configured pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PostSettings {
    /// Exposure slider value; see [`PostSettings::tone_mapping_exposure`].
    pub exposure: f32,
    pub tone_mapping: ToneMapping,
    pub bloom: Option<BloomSettings>,
    pub ambient_occlusion: Option<AoSettings>,
    pub afterimage: Option<AfterimageSettings>,
}

impl PostSettings {
    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self {
            exposure: config.bloom.map(|b| b.exposure).unwrap_or(1.0),
            tone_mapping: config.tone_mapping,
            bloom: config.bloom.map(|b: BloomParams| BloomSettings {
                enabled: true,
                threshold: b.threshold,
                strength: b.strength,
                radius: b.radius,
            }),
            ambient_occlusion: config.ambient_occlusion.map(|params| AoSettings {
                enabled: true,
                params,
            }),
            afterimage: config.motion_blur.map(|m: MotionBlurParams| AfterimageSettings {
                enabled: true,
                damp: m.damp,
            }),
        }
    }

    /// Exposure actually fed to tone mapping: `exposure ^ 4`.
    pub fn tone_mapping_exposure(&self) -> f32 {
        self.exposure.powf(EXPOSURE_CURVE)
    }

    pub fn is_enabled(&self, pass: PassKind) -> bool {
        match pass {
            PassKind::Scene | PassKind::Output => true,
            PassKind::Bloom => self.bloom.is_some_and(|b| b.enabled),
            PassKind::AmbientOcclusion => self.ambient_occlusion.is_some_and(|a| a.enabled),
            PassKind::AfterimageBlend | PassKind::AfterimageSave => {
                self.afterimage.is_some_and(|a| a.enabled)
            }
        }
    }
}

impl Tweakable for PostSettings {
    fn register(&self, controls: &mut Controls) {
        if let Some(bloom) = &self.bloom {
            controls
                .folder("Bloom")
                .add_bool("bloom", "enabled", bloom.enabled)
                .add_float("exposure", "exposure", self.exposure, 0.1, 2.0, 0.01)
                .add_float("bloomThreshold", "threshold", bloom.threshold, 0.0, 1.0, 0.01)
                .add_float("bloomStrength", "strength", bloom.strength, 0.0, 3.0, 0.01)
                .add_float("bloomRadius", "radius", bloom.radius, 0.0, 1.0, 0.01);
        }
        if let Some(ao) = &self.ambient_occlusion {
            let p = &ao.params;
            controls
                .folder("Ambient occlusion")
                .add_bool("ao", "enabled", ao.enabled)
                .add_float("aoBias", "bias", p.bias, -1.0, 1.0, 0.01)
                .add_float("aoIntensity", "intensity", p.intensity, 0.0, 1.0, 0.01)
                .add_float("aoScale", "scale", p.scale, 0.0, 10.0, 0.01)
                .add_float("aoKernelRadius", "kernel radius", p.kernel_radius, 1.0, 100.0, 1.0)
                .add_float("aoMinResolution", "min resolution", p.min_resolution, 0.0, 1.0, 0.001)
                .add_bool("aoBlur", "blur", p.blur)
                .add_float("aoBlurRadius", "blur radius", p.blur_radius, 0.0, 200.0, 1.0)
                .add_float("aoBlurStdDev", "blur std dev", p.blur_std_dev, 0.5, 150.0, 0.01)
                .add_float("aoBlurDepthCutoff", "blur depth cutoff", p.blur_depth_cutoff, 0.0, 0.1, 0.001);
        }
        if let Some(after) = &self.afterimage {
            controls
                .folder("Motion blur")
                .add_bool("motionBlur", "enabled", after.enabled)
                .add_float("motionBlurDamp", "damp", after.damp, 0.0, 0.999, 0.001);
        }
    }

    fn apply(&mut self, key: &str, value: &ParamValue) -> bool {
        let f = value.as_f32();
        let b = value.as_bool();
        match key {
            "exposure" => f.map(|v| self.exposure = v).is_some(),
            "bloom" | "bloomThreshold" | "bloomStrength" | "bloomRadius" => {
                let Some(bloom) = self.bloom.as_mut() else { return false };
                match key {
                    "bloom" => b.map(|v| bloom.enabled = v).is_some(),
                    "bloomThreshold" => f.map(|v| bloom.threshold = v).is_some(),
                    "bloomStrength" => f.map(|v| bloom.strength = v).is_some(),
                    _ => f.map(|v| bloom.radius = v).is_some(),
                }
            }
            "motionBlur" | "motionBlurDamp" => {
                let Some(after) = self.afterimage.as_mut() else { return false };
                match key {
                    "motionBlur" => b.map(|v| after.enabled = v).is_some(),
                    _ => f.map(|v| after.damp = v).is_some(),
                }
            }
            _ if key.starts_with("ao") => {
                let Some(ao) = self.ambient_occlusion.as_mut() else { return false };
                let p = &mut ao.params;
                match key {
                    "ao" => b.map(|v| ao.enabled = v).is_some(),
                    "aoBias" => f.map(|v| p.bias = v).is_some(),
                    "aoIntensity" => f.map(|v| p.intensity = v).is_some(),
                    "aoScale" => f.map(|v| p.scale = v).is_some(),
                    "aoKernelRadius" => f.map(|v| p.kernel_radius = v).is_some(),
                    "aoMinResolution" => f.map(|v| p.min_resolution = v).is_some(),
                    "aoBlur" => b.map(|v| p.blur = v).is_some(),
                    "aoBlurRadius" => f.map(|v| p.blur_radius = v).is_some(),
                    "aoBlurStdDev" => f.map(|v| p.blur_std_dev = v).is_some(),
                    "aoBlurDepthCutoff" => f.map(|v| p.blur_depth_cutoff = v).is_some(),
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> ExperimentConfig {
        ExperimentConfig::default()
            .with_bloom(BloomParams::default())
            .with_ambient_occlusion(AoParams::default())
            .with_motion_blur(MotionBlurParams::default())
    }

    #[test]
    fn test_plain_config_is_scene_then_output() {
        let plan = PassPlan::from_config(&ExperimentConfig::default());
        assert_eq!(plan.passes(), &[PassKind::Scene, PassKind::Output]);
    }

    #[test]
    fn test_full_plan_order() {
        let plan = PassPlan::from_config(&full_config());
        assert_eq!(
            plan.passes(),
            &[
                PassKind::Scene,
                PassKind::Bloom,
                PassKind::AmbientOcclusion,
                PassKind::AfterimageBlend,
                PassKind::AfterimageSave,
                PassKind::Output,
            ]
        );
        let surface_writers: Vec<_> = plan.passes().iter().filter(|p| p.writes_surface()).collect();
        assert_eq!(surface_writers, vec![&PassKind::Output]);
    }

    #[test]
    fn test_disabling_keeps_plan() {
        let config = full_config();
        let plan = PassPlan::from_config(&config);
        let mut settings = PostSettings::from_config(&config);
        assert!(settings.apply("bloom", &ParamValue::Bool(false)));
        assert!(settings.apply("motionBlur", &ParamValue::Bool(false)));

        assert_eq!(plan.passes().len(), 6);
        let active: Vec<_> = plan.active(&settings).collect();
        assert_eq!(active, vec![PassKind::Scene, PassKind::AmbientOcclusion, PassKind::Output]);
    }

    #[test]
    fn test_exposure_curve() {
        let mut settings = PostSettings::from_config(&full_config());
        assert!(settings.apply("exposure", &ParamValue::Float(0.5)));
        assert!((settings.tone_mapping_exposure() - 0.0625).abs() < 1e-6);
    }

    #[test]
    fn test_apply_rejects_unconfigured_and_mistyped() {
        let mut settings = PostSettings::from_config(&ExperimentConfig::default());
        assert!(!settings.apply("bloomStrength", &ParamValue::Float(1.0)));
        assert!(!settings.apply("aoBias", &ParamValue::Float(0.1)));

        let mut settings = PostSettings::from_config(&full_config());
        assert!(!settings.apply("bloomStrength", &ParamValue::Bool(true)));
        assert!(settings.apply("aoKernelRadius", &ParamValue::Float(16.0)));
        assert_eq!(settings.ambient_occlusion.unwrap().params.kernel_radius, 16.0);
    }

    #[test]
    fn test_register_exposes_every_pass() {
        let settings = PostSettings::from_config(&full_config());
        let mut controls = Controls::new();
        settings.register(&mut controls);
        assert_eq!(controls.folders(), vec!["Bloom", "Ambient occlusion", "Motion blur"]);
        assert_eq!(controls.get("bloomRadius"), Some(&ParamValue::Float(0.84)));
    }
}
