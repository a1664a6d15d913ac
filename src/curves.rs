//! Color transfer utilities
//!
//! Pure numeric conversions between signal-domain and linear-light values,
//! used so the inspector can show physically meaningful numbers instead of
//! raw signal bytes. Each curve is piecewise: a linear (or low-power)
//! segment below an exact cutoff and a power-law segment above it.
//!
//! All functions are total over the documented [0, 1] domain; inputs
//! outside it fall through to the power function's natural extension and
//! are not separately guarded.

/// Signal level where the sRGB encode switches from its linear segment to
/// the power-law segment. Chosen so the two branches meet exactly.
pub const SRGB_ENCODE_CUTOFF: f64 = 0.003_039_934_639_778_431_4;

/// Slope of the linear segment of the sRGB encode.
pub const SRGB_ENCODE_SLOPE: f64 = 12.923_210_180_787_86;

/// Encode a linear-light value with the sRGB transfer curve.
pub fn srgb_encode(linear: f64) -> f64 {
    if linear < SRGB_ENCODE_CUTOFF {
        linear * SRGB_ENCODE_SLOPE
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

/// Signal level where the analog video decode leaves its linear segment.
pub const ANALOG_VIDEO_CUTOFF: f64 = 0.0913;

const ANALOG_VIDEO_ALPHA: f64 = 0.111_572_195_921_731_2;
const ANALOG_VIDEO_BETA: f64 = 1.0 + ANALOG_VIDEO_ALPHA;

/// Decode a composite-video signal level to linear light.
pub fn analog_video_decode(signal: f64) -> f64 {
    if signal < ANALOG_VIDEO_CUTOFF {
        signal / 4.0
    } else {
        ((signal + ANALOG_VIDEO_ALPHA) / ANALOG_VIDEO_BETA).powf(1.0 / 0.45)
    }
}

/// Knee where the display curve switches exponents.
pub const DISPLAY_CURVE_KNEE: f64 = 0.35;

/// Default peak luminance for [`display_curve_decode`].
pub const DISPLAY_WHITE_LEVEL: f64 = 1.0;

/// Default black lift for [`display_curve_decode`].
pub const DISPLAY_BLACK_LEVEL: f64 = 0.0181;

const DISPLAY_EXPONENT_HIGH: f64 = 2.6;
const DISPLAY_EXPONENT_LOW: f64 = 3.0;

/// Decode a signal through a two-exponent display curve.
///
/// Above the knee the curve is `k * (signal + black_level)^2.6`; below it
/// the exponent steepens to 3.0, with the low branch scaled by
/// `(knee + black_level)^(2.6 - 3.0)` so the two pieces meet exactly at
/// the knee. `k = white_level / (1 + black_level)^2.6` normalizes the
/// curve so a full-scale signal reaches `white_level`.
pub fn display_curve_decode(signal: f64, white_level: f64, black_level: f64) -> f64 {
    let k = white_level / (1.0 + black_level).powf(DISPLAY_EXPONENT_HIGH);
    let lifted = signal + black_level;
    if signal < DISPLAY_CURVE_KNEE {
        let join = (DISPLAY_CURVE_KNEE + black_level)
            .powf(DISPLAY_EXPONENT_HIGH - DISPLAY_EXPONENT_LOW);
        k * join * lifted.powf(DISPLAY_EXPONENT_LOW)
    } else {
        k * lifted.powf(DISPLAY_EXPONENT_HIGH)
    }
}

/// [`display_curve_decode`] with the default white and black levels.
pub fn display_curve_decode_default(signal: f64) -> f64 {
    display_curve_decode(signal, DISPLAY_WHITE_LEVEL, DISPLAY_BLACK_LEVEL)
}

/// Boundary below which the measured curve blends toward the analog
/// decode.
pub const MEASURED_CURVE_BOUNDARY: f64 = 0.36;

const MEASURED_EXPONENT: f64 = 2.31;

/// Decode a signal through a measured CRT response.
///
/// At and above the boundary this is a plain `signal^2.31` power curve.
/// Below it, the result blends linearly (weight `signal / 0.36`) between
/// [`analog_video_decode`] and the power curve, which keeps the function
/// continuous at the boundary.
pub fn measured_curve_decode(signal: f64) -> f64 {
    let power = signal.powf(MEASURED_EXPONENT);
    if signal >= MEASURED_CURVE_BOUNDARY {
        power
    } else {
        let t = signal / MEASURED_CURVE_BOUNDARY;
        (1.0 - t) * analog_video_decode(signal) + t * power
    }
}

/// Value-display curve selection for annotations.
///
/// `Linear` passes values through untouched; the remaining variants
/// dispatch to the module's transfer functions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransferCurve {
    #[default]
    Linear,
    SrgbEncode,
    AnalogVideo,
    DisplayCurve,
    MeasuredCurve,
}

impl TransferCurve {
    /// Display name for UI labels.
    pub fn name(&self) -> &'static str {
        match self {
            TransferCurve::Linear => "Linear",
            TransferCurve::SrgbEncode => "sRGB",
            TransferCurve::AnalogVideo => "Analog video",
            TransferCurve::DisplayCurve => "Display",
            TransferCurve::MeasuredCurve => "Measured",
        }
    }

    /// Apply the curve to one channel value.
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            TransferCurve::Linear => value,
            TransferCurve::SrgbEncode => srgb_encode(value),
            TransferCurve::AnalogVideo => analog_video_decode(value),
            TransferCurve::DisplayCurve => display_curve_decode_default(value),
            TransferCurve::MeasuredCurve => measured_curve_decode(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_encode_branches_agree_at_cutoff() {
        let linear = SRGB_ENCODE_CUTOFF * SRGB_ENCODE_SLOPE;
        let power = 1.055 * SRGB_ENCODE_CUTOFF.powf(1.0 / 2.4) - 0.055;
        assert!(
            (linear - power).abs() < 1e-6,
            "branch mismatch at cutoff: {} vs {}",
            linear,
            power
        );
    }

    #[test]
    fn test_srgb_encode_picks_correct_branch() {
        let below = SRGB_ENCODE_CUTOFF - 1e-7;
        let above = SRGB_ENCODE_CUTOFF + 1e-7;
        assert!((srgb_encode(below) - below * SRGB_ENCODE_SLOPE).abs() < 1e-12);
        assert!((srgb_encode(above) - (1.055 * above.powf(1.0 / 2.4) - 0.055)).abs() < 1e-12);
        // At the cutoff itself the power branch applies, and both agree.
        assert!((srgb_encode(SRGB_ENCODE_CUTOFF) - SRGB_ENCODE_CUTOFF * SRGB_ENCODE_SLOPE).abs() < 1e-6);
    }

    #[test]
    fn test_srgb_encode_endpoints() {
        assert_eq!(srgb_encode(0.0), 0.0);
        assert!((srgb_encode(1.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_analog_video_decode_branches() {
        assert!((analog_video_decode(0.04) - 0.01).abs() < 1e-9);
        // Full-scale signal decodes to full-scale light.
        assert!((analog_video_decode(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_display_curve_continuous_at_knee() {
        let eps = 1e-6;
        let below = display_curve_decode_default(DISPLAY_CURVE_KNEE - eps);
        let above = display_curve_decode_default(DISPLAY_CURVE_KNEE + eps);
        assert!(
            (below - above).abs() < 1e-4,
            "display curve jumps at knee: {} vs {}",
            below,
            above
        );
    }

    #[test]
    fn test_display_curve_reaches_white_level() {
        // A full-scale signal hits white_level by construction of k.
        let v = display_curve_decode(1.0, 1.0, DISPLAY_BLACK_LEVEL);
        assert!((v - 1.0).abs() < 1e-9);

        let v = display_curve_decode(1.0, 100.0, DISPLAY_BLACK_LEVEL);
        assert!((v - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_measured_curve_continuous_at_boundary() {
        let eps = 1e-6;
        let below = measured_curve_decode(MEASURED_CURVE_BOUNDARY - eps);
        let above = measured_curve_decode(MEASURED_CURVE_BOUNDARY + eps);
        assert!(
            (below - above).abs() < 1e-4,
            "measured curve jumps at boundary: {} vs {}",
            below,
            above
        );
    }

    #[test]
    fn test_measured_curve_is_pure_power_above_boundary() {
        let s = 0.7;
        assert!((measured_curve_decode(s) - s.powf(2.31)).abs() < 1e-12);
    }

    #[test]
    fn test_curves_monotonic_on_unit_interval() {
        let curves: [fn(f64) -> f64; 4] = [
            srgb_encode,
            analog_video_decode,
            display_curve_decode_default,
            measured_curve_decode,
        ];
        for decode in curves {
            let mut prev = decode(0.0);
            for i in 1..=100 {
                let v = decode(i as f64 / 100.0);
                assert!(v >= prev, "non-monotonic at step {}", i);
                prev = v;
            }
        }
    }

    #[test]
    fn test_transfer_curve_dispatch() {
        assert_eq!(TransferCurve::Linear.apply(0.42), 0.42);
        assert_eq!(TransferCurve::SrgbEncode.apply(0.5), srgb_encode(0.5));
        assert_eq!(TransferCurve::MeasuredCurve.apply(0.5), measured_curve_decode(0.5));
        assert_eq!(TransferCurve::default(), TransferCurve::Linear);
    }
}
