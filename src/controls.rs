//! Live-editable parameters.
//!
//! [`Controls`] is a registry of named parameters grouped into folders. A
//! panel (the egui one behind the `egui` feature, or a test) writes values
//! with [`Controls::set`]; writes are validated immediately but only queued.
//! The render loop drains the queue at the start of the next frame and hands
//! each change to its owner, so nothing assumes synchronous application.

use glam::Vec3;
use std::collections::VecDeque;

use crate::error::ControlError;

/// Constraint attached to a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Float { min: f32, max: f32, step: f32 },
    Bool,
    /// Linear RGB.
    Color,
    Choice(Vec<String>),
    Button,
}

/// Current value of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Bool(bool),
    Color(Vec3),
    /// Index into the choice list.
    Choice(usize),
    Pressed,
}

impl ParamValue {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Vec3> {
        match self {
            ParamValue::Color(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<usize> {
        match self {
            ParamValue::Choice(v) => Some(*v),
            _ => None,
        }
    }
}

/// One registered parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub key: String,
    pub label: String,
    pub folder: String,
    pub kind: ParamKind,
    pub value: ParamValue,
}

/// A queued write.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlChange {
    pub key: String,
    pub value: ParamValue,
}

/// Parameter registry with a change queue.
#[derive(Debug, Default)]
pub struct Controls {
    params: Vec<Param>,
    pending: VecDeque<ControlChange>,
    folder: String,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters added after this call are grouped under `name`.
    pub fn folder(&mut self, name: &str) -> &mut Self {
        self.folder = name.to_string();
        self
    }

    fn push(&mut self, key: &str, label: &str, kind: ParamKind, value: ParamValue) -> &mut Self {
        let param = Param {
            key: key.to_string(),
            label: label.to_string(),
            folder: self.folder.clone(),
            kind,
            value,
        };
        match self.params.iter_mut().find(|p| p.key == key) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
        self
    }

    pub fn add_float(&mut self, key: &str, label: &str, value: f32, min: f32, max: f32, step: f32) -> &mut Self {
        let value = value.clamp(min, max);
        self.push(key, label, ParamKind::Float { min, max, step }, ParamValue::Float(value))
    }

    pub fn add_bool(&mut self, key: &str, label: &str, value: bool) -> &mut Self {
        self.push(key, label, ParamKind::Bool, ParamValue::Bool(value))
    }

    pub fn add_color(&mut self, key: &str, label: &str, value: Vec3) -> &mut Self {
        self.push(key, label, ParamKind::Color, ParamValue::Color(value))
    }

    pub fn add_choice(&mut self, key: &str, label: &str, options: &[&str], selected: usize) -> &mut Self {
        let options: Vec<String> = options.iter().map(|s| s.to_string()).collect();
        let selected = selected.min(options.len().saturating_sub(1));
        self.push(key, label, ParamKind::Choice(options), ParamValue::Choice(selected))
    }

    pub fn add_button(&mut self, key: &str, label: &str) -> &mut Self {
        self.push(key, label, ParamKind::Button, ParamValue::Pressed)
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.key == key).map(|p| &p.value)
    }

    /// Folder names in registration order.
    pub fn folders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for p in &self.params {
            if !names.contains(&p.folder.as_str()) {
                names.push(&p.folder);
            }
        }
        names
    }

    /// Validate and queue a new value.
    ///
    /// Floats are clamped to their range and snapped to their step; choice
    /// indices are clamped to the option list.
    pub fn set(&mut self, key: &str, value: ParamValue) -> Result<(), ControlError> {
        let param = self
            .params
            .iter_mut()
            .find(|p| p.key == key)
            .ok_or_else(|| ControlError::UnknownParam(key.to_string()))?;

        let mismatch = |expected| ControlError::TypeMismatch {
            key: key.to_string(),
            expected,
        };
        let value = match (&param.kind, value) {
            (ParamKind::Float { min, max, step }, ParamValue::Float(v)) => {
                let snapped = if *step > 0.0 {
                    min + ((v - min) / step).round() * step
                } else {
                    v
                };
                ParamValue::Float(snapped.clamp(*min, *max))
            }
            (ParamKind::Float { .. }, _) => return Err(mismatch("float")),
            (ParamKind::Bool, v @ ParamValue::Bool(_)) => v,
            (ParamKind::Bool, _) => return Err(mismatch("bool")),
            (ParamKind::Color, v @ ParamValue::Color(_)) => v,
            (ParamKind::Color, _) => return Err(mismatch("color")),
            (ParamKind::Choice(options), ParamValue::Choice(i)) => {
                ParamValue::Choice(i.min(options.len().saturating_sub(1)))
            }
            (ParamKind::Choice(_), _) => return Err(mismatch("choice")),
            (ParamKind::Button, ParamValue::Pressed) => ParamValue::Pressed,
            (ParamKind::Button, _) => return Err(mismatch("button")),
        };

        param.value = value;
        self.pending.push_back(ControlChange {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    /// Queue a button press.
    pub fn press(&mut self, key: &str) -> Result<(), ControlError> {
        self.set(key, ParamValue::Pressed)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Take every queued change in write order.
    pub fn drain(&mut self) -> Vec<ControlChange> {
        self.pending.drain(..).collect()
    }
}

/// State that exposes its knobs through [`Controls`].
pub trait Tweakable {
    /// Register parameters with their current values.
    fn register(&self, controls: &mut Controls);

    /// Apply one change. Returns `false` if `key` is not one of ours.
    fn apply(&mut self, key: &str, value: &ParamValue) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls() -> Controls {
        let mut c = Controls::new();
        c.folder("Bloom")
            .add_float("bloomStrength", "Strength", 1.7, 0.0, 3.0, 0.01)
            .add_bool("bloom", "Enabled", true);
        c.folder("Cube").add_button("shuffle", "Shuffle");
        c
    }

    #[test]
    fn test_set_is_queued_not_applied() {
        let mut c = controls();
        c.set("bloomStrength", ParamValue::Float(2.5)).unwrap();
        assert!(c.has_pending());
        let changes = c.drain();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].value, ParamValue::Float(2.5));
        assert!(!c.has_pending());
    }

    #[test]
    fn test_float_is_clamped_and_snapped() {
        let mut c = controls();
        c.set("bloomStrength", ParamValue::Float(9.0)).unwrap();
        assert_eq!(c.get("bloomStrength"), Some(&ParamValue::Float(3.0)));

        c.set("bloomStrength", ParamValue::Float(1.234)).unwrap();
        let v = c.get("bloomStrength").and_then(|v| v.as_f32()).unwrap();
        assert!((v - 1.23).abs() < 1e-4);
    }

    #[test]
    fn test_errors() {
        let mut c = controls();
        assert_eq!(
            c.set("missing", ParamValue::Bool(true)),
            Err(ControlError::UnknownParam("missing".into()))
        );
        assert!(matches!(
            c.set("bloom", ParamValue::Float(1.0)),
            Err(ControlError::TypeMismatch { expected: "bool", .. })
        ));
        assert!(!c.has_pending());
    }

    #[test]
    fn test_folders_keep_order_and_reregistration_replaces() {
        let mut c = controls();
        c.folder("Bloom").add_bool("bloom", "Enabled", false);
        assert_eq!(c.folders(), vec!["Bloom", "Cube"]);
        assert_eq!(c.params().len(), 3);
        assert_eq!(c.get("bloom"), Some(&ParamValue::Bool(false)));
    }

    #[test]
    fn test_press_button() {
        let mut c = controls();
        c.press("shuffle").unwrap();
        assert_eq!(c.drain()[0].key, "shuffle");
    }
}
