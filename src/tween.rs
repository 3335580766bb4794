//! Time-driven tweens and easing curves.
//!
//! A [`Tween`] interpolates between two values over a duration, after an
//! optional delay. It is advanced with frame deltas, so progress depends on
//! elapsed time only.
//!
//! ```ignore
//! let mut scale = Tween::new(0.1_f32, 1.0, 0.3).with_ease(Ease::Power3Out);
//! // each frame:
//! let s = scale.advance(delta);
//! ```

use glam::{Quat, Vec3, Vec4};

/// Easing curves, named after their GSAP counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ease {
    #[default]
    Linear,
    Power1InOut,
    Power2Out,
    Power3Out,
    Power3InOut,
    Power4Out,
}

impl Ease {
    /// Map linear progress `t` in `[0, 1]` to eased progress.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::Power1InOut => in_out(t, 2),
            Ease::Power2Out => out(t, 3),
            Ease::Power3Out => out(t, 4),
            Ease::Power3InOut => in_out(t, 4),
            Ease::Power4Out => out(t, 5),
        }
    }
}

fn out(t: f32, power: i32) -> f32 {
    1.0 - (1.0 - t).powi(power)
}

fn in_out(t: f32, power: i32) -> f32 {
    if t < 0.5 {
        (2.0 * t).powi(power) / 2.0
    } else {
        1.0 - (2.0 * (1.0 - t)).powi(power) / 2.0
    }
}

/// Values a [`Tween`] can interpolate.
pub trait Lerp: Copy {
    fn lerp_to(self, to: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp_to(self, to: Self, t: f32) -> Self {
        self + (to - self) * t
    }
}

impl Lerp for Vec3 {
    fn lerp_to(self, to: Self, t: f32) -> Self {
        self.lerp(to, t)
    }
}

impl Lerp for Vec4 {
    fn lerp_to(self, to: Self, t: f32) -> Self {
        self.lerp(to, t)
    }
}

impl Lerp for Quat {
    fn lerp_to(self, to: Self, t: f32) -> Self {
        self.slerp(to, t)
    }
}

/// Blend factor for easing `rate` of the way toward a target per 60 Hz
/// frame, corrected for a frame that took `delta` seconds.
pub fn follow_factor(rate: f32, delta: f32) -> f32 {
    1.0 - (1.0 - rate.clamp(0.0, 1.0)).powf(delta.max(0.0) * 60.0)
}

/// An interpolation from `from` to `to` over `duration` seconds.
#[derive(Debug, Clone, Copy)]
pub struct Tween<T: Lerp> {
    pub from: T,
    pub to: T,
    pub duration: f32,
    pub delay: f32,
    pub ease: Ease,
    time: f32,
}

impl<T: Lerp> Tween<T> {
    pub fn new(from: T, to: T, duration: f32) -> Self {
        Self {
            from,
            to,
            duration,
            delay: 0.0,
            ease: Ease::Linear,
            time: 0.0,
        }
    }

    pub fn with_ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }

    /// Hold at `from` for `delay` seconds before starting.
    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay.max(0.0);
        self
    }

    /// Advance by `dt` seconds and return the new value.
    pub fn advance(&mut self, dt: f32) -> T {
        self.time += dt.max(0.0);
        self.value()
    }

    /// Linear progress in `[0, 1]`, ignoring easing.
    pub fn progress(&self) -> f32 {
        let active = self.time - self.delay;
        if self.duration <= 0.0 {
            if active >= 0.0 {
                1.0
            } else {
                0.0
            }
        } else if active <= 0.0 {
            0.0
        } else {
            (active / self.duration).min(1.0)
        }
    }

    pub fn value(&self) -> T {
        self.from.lerp_to(self.to, self.ease.apply(self.progress()))
    }

    pub fn is_finished(&self) -> bool {
        self.time >= self.delay + self.duration
    }

    /// Restart toward a new target from the current value.
    pub fn retarget(&mut self, to: T) {
        self.from = self.value();
        self.to = to;
        self.time = 0.0;
        self.delay = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eases_hit_endpoints() {
        for ease in [
            Ease::Linear,
            Ease::Power1InOut,
            Ease::Power2Out,
            Ease::Power3Out,
            Ease::Power3InOut,
            Ease::Power4Out,
        ] {
            assert!(ease.apply(0.0).abs() < 1e-6, "{:?}", ease);
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-6, "{:?}", ease);
        }
    }

    #[test]
    fn test_ease_out_leads_linear() {
        assert!(Ease::Power3Out.apply(0.3) > 0.3);
        assert!((Ease::Power3InOut.apply(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_tween_respects_delay() {
        let mut tween = Tween::new(0.0_f32, 10.0, 1.0).with_delay(0.5);
        assert_eq!(tween.advance(0.4), 0.0);
        assert!((tween.advance(0.6) - 5.0).abs() < 1e-5);
        assert!(!tween.is_finished());
        assert_eq!(tween.advance(1.0), 10.0);
        assert!(tween.is_finished());
    }

    #[test]
    fn test_zero_duration_jumps() {
        let mut tween = Tween::new(Vec3::ZERO, Vec3::ONE, 0.0);
        assert_eq!(tween.advance(0.0), Vec3::ONE);
        assert!(tween.is_finished());
    }

    #[test]
    fn test_zero_duration_waits_for_delay() {
        let mut tween = Tween::new(0.0_f32, 1.0, 0.0).with_delay(0.2);
        assert_eq!(tween.advance(0.1), 0.0);
        assert!(!tween.is_finished());
        assert_eq!(tween.advance(0.1), 1.0);
        assert!(tween.is_finished());
    }

    #[test]
    fn test_follow_factor_is_frame_rate_independent() {
        assert!((follow_factor(0.1, 1.0 / 60.0) - 0.1).abs() < 1e-5);
        assert_eq!(follow_factor(0.1, 0.0), 0.0);

        let slow = 0.0_f32.lerp_to(1.0, follow_factor(0.1, 1.0 / 30.0));
        let mut fast = 0.0_f32;
        for _ in 0..2 {
            fast = fast.lerp_to(1.0, follow_factor(0.1, 1.0 / 60.0));
        }
        assert!((slow - fast).abs() < 1e-5);
    }

    #[test]
    fn test_retarget_starts_from_current() {
        let mut tween = Tween::new(0.0_f32, 1.0, 1.0);
        tween.advance(0.5);
        tween.retarget(0.0);
        assert!((tween.value() - 0.5).abs() < 1e-6);
    }
}
