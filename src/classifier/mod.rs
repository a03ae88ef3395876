//! Hip-angle posture classification.
//!
//! The classifier measures the angle at the hip between the shoulder and the
//! knee. An upright seated posture opens that angle beyond 90 degrees; a
//! slouch closes it.
//!
//! ```text
//!   shoulder (a)
//!        \
//!         \  angle
//!     hip (b) ------ knee (c)
//! ```

use crate::models::{Classification, LandmarkFrame, Point, PoseLandmark, PostureStatus};
use crate::{Error, Result};

/// Angles strictly above this are classified as good posture.
pub const GOOD_POSTURE_THRESHOLD_DEG: f64 = 90.0;

/// Angle used as the neutral score when no data is available.
pub const NEUTRAL_ANGLE_DEG: f64 = 90.0;

/// Computes the angle at `b` formed by `a` and `c`, in degrees, and labels it.
///
/// # Errors
///
/// Returns [`Error::DegenerateInput`] if `a == b`, `c == b`, or any
/// coordinate is not finite. The angle is undefined in those cases and the
/// caller should skip the frame.
///
/// # Examples
///
/// ```rust
/// use posturelog::classify;
/// use posturelog::models::{Point, PostureStatus};
///
/// let (angle, label) = classify(
///     Point::new(0.5, 0.2),
///     Point::new(0.5, 0.6),
///     Point::new(0.9, 0.6),
/// )?;
/// assert!((angle - 90.0).abs() < 1e-9);
/// assert_eq!(label, PostureStatus::Bad);
/// # Ok::<(), posturelog::Error>(())
/// ```
pub fn classify(a: Point, b: Point, c: Point) -> Result<(f64, PostureStatus)> {
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return Err(Error::DegenerateInput(
            "landmark coordinates must be finite".to_string(),
        ));
    }

    let (bax, bay) = a.sub(b);
    let (bcx, bcy) = c.sub(b);

    let norm_ba = bax.hypot(bay);
    let norm_bc = bcx.hypot(bcy);
    if norm_ba == 0.0 || norm_bc == 0.0 {
        return Err(Error::DegenerateInput(
            "zero-length limb vector at the hip".to_string(),
        ));
    }

    let cosine = (bax.mul_add(bcx, bay * bcy) / (norm_ba * norm_bc)).clamp(-1.0, 1.0);
    let mut angle = cosine.acos().to_degrees();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }

    Ok((angle, label_for(angle)))
}

/// Labels an angle against [`GOOD_POSTURE_THRESHOLD_DEG`].
#[must_use]
pub fn label_for(angle: f64) -> PostureStatus {
    if angle > GOOD_POSTURE_THRESHOLD_DEG {
        PostureStatus::Good
    } else {
        PostureStatus::Bad
    }
}

/// Classifies a full pose frame using the left shoulder, hip and knee.
///
/// Returns `Ok(None)` when the frame does not contain those landmarks (no
/// person detected).
///
/// # Errors
///
/// Returns [`Error::DegenerateInput`] when the landmarks are present but
/// coincide.
pub fn classify_frame(frame: &LandmarkFrame) -> Result<Option<Classification>> {
    let (Some(shoulder), Some(hip), Some(knee)) = (
        frame.get(PoseLandmark::LeftShoulder),
        frame.get(PoseLandmark::LeftHip),
        frame.get(PoseLandmark::LeftKnee),
    ) else {
        return Ok(None);
    };

    let (angle, label) = classify(shoulder.point(), hip.point(), knee.point())?;
    Ok(Some(Classification::new(frame.captured_at, angle, label)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Landmark;
    use chrono::{TimeZone, Utc};
    use test_case::test_case;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test_case(p(0.0, 0.0), p(0.5, 0.0), p(1.0, 0.0), 180.0, PostureStatus::Good ; "straight line")]
    #[test_case(p(0.5, 0.0), p(0.5, 0.5), p(1.0, 0.5), 90.0, PostureStatus::Bad ; "right angle is bad")]
    #[test_case(p(0.2, 0.1), p(0.5, 0.5), p(1.0, 0.5), 126.869_897_645_844, PostureStatus::Good ; "open hip")]
    #[test_case(p(0.9, 0.1), p(0.5, 0.5), p(1.0, 0.5), 45.0, PostureStatus::Bad ; "slouch")]
    fn test_classify(a: Point, b: Point, c: Point, expected: f64, label: PostureStatus) {
        let (angle, got) = classify(a, b, c).unwrap();
        assert!((angle - expected).abs() < 1e-6, "angle {angle} != {expected}");
        assert_eq!(got, label);
    }

    #[test]
    fn test_coincident_points_are_degenerate() {
        let err = classify(p(0.5, 0.5), p(0.5, 0.5), p(0.9, 0.5)).unwrap_err();
        assert!(matches!(err, Error::DegenerateInput(_)));

        let err = classify(p(0.1, 0.5), p(0.5, 0.5), p(0.5, 0.5)).unwrap_err();
        assert!(matches!(err, Error::DegenerateInput(_)));
    }

    #[test]
    fn test_non_finite_is_degenerate() {
        let err = classify(p(f64::NAN, 0.5), p(0.5, 0.5), p(0.9, 0.5)).unwrap_err();
        assert!(matches!(err, Error::DegenerateInput(_)));
    }

    #[test]
    fn test_collinear_same_side_is_zero() {
        let (angle, label) = classify(p(1.0, 0.0), p(0.0, 0.0), p(2.0, 0.0)).unwrap();
        assert!(angle.abs() < 1e-9);
        assert_eq!(label, PostureStatus::Bad);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert_eq!(label_for(90.0), PostureStatus::Bad);
        assert_eq!(label_for(90.000_1), PostureStatus::Good);
    }

    fn frame_with(shoulder: Point, hip: Point, knee: Point) -> LandmarkFrame {
        let mut landmarks = vec![
            Landmark {
                x: 0.0,
                y: 0.0,
                visibility: 0.0,
            };
            33
        ];
        for (idx, point) in [(11, shoulder), (23, hip), (25, knee)] {
            landmarks[idx] = Landmark {
                x: point.x,
                y: point.y,
                visibility: 0.9,
            };
        }
        LandmarkFrame::new(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(), landmarks)
    }

    #[test]
    fn test_classify_frame_reads_left_side() {
        let frame = frame_with(p(0.5, 0.1), p(0.5, 0.5), p(0.5, 0.9));
        let c = classify_frame(&frame).unwrap().unwrap();
        assert!((c.angle - 180.0).abs() < 1e-9);
        assert_eq!(c.label, PostureStatus::Good);
        assert_eq!(c.timestamp, frame.captured_at);
    }

    #[test]
    fn test_classify_frame_without_pose() {
        let frame = LandmarkFrame::new(Utc::now(), Vec::new());
        assert!(classify_frame(&frame).unwrap().is_none());
    }

    #[test]
    fn test_classify_frame_degenerate() {
        let frame = frame_with(p(0.5, 0.5), p(0.5, 0.5), p(0.5, 0.9));
        assert!(classify_frame(&frame).is_err());
    }
}
