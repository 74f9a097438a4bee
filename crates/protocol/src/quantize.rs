//! Input quantization.
//!
//! Inputs are quantized before the client simulates them, so the client and
//! the authority run the exact same values. Dequantizing and quantizing
//! again gives back the same quantized value.

use std::f32::consts::TAU;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Steps per unit on each input axis.
pub const AXIS_STEPS: f32 = 100.0;

/// Steps per full turn of yaw.
pub const YAW_STEPS: f32 = 65536.0;

/// Compact input axes and yaw as carried on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantizedInput {
    /// Forward axis in 1/100 steps.
    pub x: i8,
    /// Right axis in 1/100 steps.
    pub y: i8,
    /// Up axis in 1/100 steps.
    pub z: i8,
    /// Yaw in 1/65536 turns.
    pub yaw: u16,
}

impl QuantizedInput {
    /// Quantize an input vector `(forward, right, up)` and a yaw in radians.
    pub fn new(input: Vec3, yaw: f32) -> Self {
        Self {
            x: quantize_axis(input.x),
            y: quantize_axis(input.y),
            z: quantize_axis(input.z),
            yaw: quantize_yaw(yaw),
        }
    }

    /// The input vector `(forward, right, up)`.
    pub fn vector(&self) -> Vec3 {
        Vec3::new(
            dequantize_axis(self.x),
            dequantize_axis(self.y),
            dequantize_axis(self.z),
        )
    }

    /// Yaw in radians, in `[0, 2π)`.
    pub fn yaw_radians(&self) -> f32 {
        dequantize_yaw(self.yaw)
    }
}

/// Quantize one axis value in `[-1, 1]`. Non-finite values become 0.
pub fn quantize_axis(value: f32) -> i8 {
    if !value.is_finite() {
        return 0;
    }
    (value.clamp(-1.0, 1.0) * AXIS_STEPS).round() as i8
}

pub fn dequantize_axis(value: i8) -> f32 {
    (f32::from(value) / AXIS_STEPS).clamp(-1.0, 1.0)
}

/// Quantize a yaw angle, wrapping it into one turn.
pub fn quantize_yaw(yaw: f32) -> u16 {
    if !yaw.is_finite() {
        return 0;
    }
    let turns = yaw.rem_euclid(TAU) / TAU;
    ((turns * YAW_STEPS).round() as u32 % YAW_STEPS as u32) as u16
}

pub fn dequantize_yaw(yaw: u16) -> f32 {
    f32::from(yaw) * (TAU / YAW_STEPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_clamps_and_rounds() {
        assert_eq!(quantize_axis(1.0), 100);
        assert_eq!(quantize_axis(-3.0), -100);
        assert_eq!(quantize_axis(0.123), 12);
        assert_eq!(quantize_axis(f32::NAN), 0);
    }

    #[test]
    fn test_yaw_wraps() {
        assert_eq!(quantize_yaw(0.0), 0);
        assert_eq!(quantize_yaw(TAU), 0);
        assert_eq!(quantize_yaw(-TAU / 4.0), quantize_yaw(3.0 * TAU / 4.0));
        assert_eq!(quantize_yaw(TAU / 2.0), 32768);
    }

    #[test]
    fn test_requantize_is_stable() {
        let samples = [
            (Vec3::new(0.707, -0.707, 0.0), 1.234),
            (Vec3::new(1.0, 0.33, -0.01), 6.2),
            (Vec3::new(-0.5, 0.0, 1.0), -2.0),
        ];
        for (input, yaw) in samples {
            let q = QuantizedInput::new(input, yaw);
            let again = QuantizedInput::new(q.vector(), q.yaw_radians());
            assert_eq!(q, again, "input {input:?} yaw {yaw}");
        }
    }

    #[test]
    fn test_dequantized_yaw_in_range() {
        let q = QuantizedInput::new(Vec3::ZERO, TAU - 1.0e-6);
        assert!(q.yaw_radians() >= 0.0 && q.yaw_radians() < TAU);
    }
}
