//! Egui panel for [`Controls`].
//!
//! Every registered parameter is drawn in its folder. Edits go through
//! [`Controls::set`], so they are validated and applied at the start of the
//! next frame like any other control write.

use crate::controls::{Controls, ParamKind, ParamValue};

/// Draw the controls window. `fps` adds a counter line at the top.
pub fn show_controls(ctx: &egui::Context, controls: &mut Controls, fps: Option<f32>) {
    if controls.params().is_empty() && fps.is_none() {
        return;
    }
    egui::Window::new("Controls")
        .default_pos([12.0, 12.0])
        .resizable(false)
        .show(ctx, |ui| {
            if let Some(fps) = fps {
                ui.label(format!("{:.0} fps", fps));
                ui.separator();
            }
            render_controls_panel(ui, controls);
        });
}

/// Returns true if any value was written this frame.
pub fn render_controls_panel(ui: &mut egui::Ui, controls: &mut Controls) -> bool {
    let mut edits: Vec<(String, ParamValue)> = Vec::new();
    let folders: Vec<String> = controls.folders().into_iter().map(String::from).collect();

    for folder in &folders {
        let draw = |ui: &mut egui::Ui, edits: &mut Vec<(String, ParamValue)>| {
            for param in controls.params().iter().filter(|p| &p.folder == folder) {
                if let Some(value) = param_widget(ui, &param.label, &param.kind, param.value) {
                    edits.push((param.key.clone(), value));
                }
            }
        };
        if folder.is_empty() {
            draw(ui, &mut edits);
        } else {
            egui::CollapsingHeader::new(folder.as_str())
                .default_open(true)
                .show(ui, |ui| draw(ui, &mut edits));
        }
    }

    let changed = !edits.is_empty();
    for (key, value) in edits {
        if let Err(e) = controls.set(&key, value) {
            log::warn!("Rejected control write: {}", e);
        }
    }
    changed
}

fn param_widget(ui: &mut egui::Ui, label: &str, kind: &ParamKind, value: ParamValue) -> Option<ParamValue> {
    match (kind, value) {
        (ParamKind::Float { min, max, step }, ParamValue::Float(mut v)) => {
            let slider = egui::Slider::new(&mut v, *min..=*max).text(label);
            let slider = if *step > 0.0 { slider.step_by(*step as f64) } else { slider };
            ui.add(slider).changed().then_some(ParamValue::Float(v))
        }
        (ParamKind::Bool, ParamValue::Bool(mut v)) => {
            ui.checkbox(&mut v, label).changed().then_some(ParamValue::Bool(v))
        }
        (ParamKind::Color, ParamValue::Color(c)) => {
            let mut rgb = c.to_array();
            let changed = ui
                .horizontal(|ui| {
                    let changed = ui.color_edit_button_rgb(&mut rgb).changed();
                    ui.label(label);
                    changed
                })
                .inner;
            changed.then(|| ParamValue::Color(glam::Vec3::from_array(rgb)))
        }
        (ParamKind::Choice(options), ParamValue::Choice(selected)) => {
            let mut picked = selected;
            let current = options.get(selected).map(String::as_str).unwrap_or("");
            egui::ComboBox::from_label(label)
                .selected_text(current)
                .show_ui(ui, |ui| {
                    for (i, option) in options.iter().enumerate() {
                        ui.selectable_value(&mut picked, i, option);
                    }
                });
            (picked != selected).then_some(ParamValue::Choice(picked))
        }
        (ParamKind::Button, _) => ui.button(label).clicked().then_some(ParamValue::Pressed),
        _ => None,
    }
}
