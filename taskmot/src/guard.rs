//! Non-finite payload rejection.
//!
//! A non-finite value reaching the executor would corrupt its trajectory
//! state. Offending commands are dropped: the operation reports
//! [`Dispatch::Dropped`](crate::error::Dispatch::Dropped) and nothing is
//! written.

use taskmot_common::command::MotionCommand;
use taskmot_common::pose::Pose;

/// True if `x` is neither NaN nor infinite.
#[inline]
pub fn is_finite(x: f64) -> bool {
    x.is_finite()
}

/// True if every value is finite.
#[inline]
pub fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| is_finite(*v))
}

/// True if every pose component is finite.
#[inline]
pub fn pose_is_finite(pose: &Pose) -> bool {
    all_finite(&pose.components())
}

/// Final gate applied to every outgoing command.
#[inline]
pub fn admit(command: &MotionCommand) -> bool {
    command.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use taskmot_common::command::LineMove;

    #[test]
    fn rejects_nan_and_infinity() {
        assert!(is_finite(0.0));
        assert!(is_finite(-1e300));
        assert!(!is_finite(f64::NAN));
        assert!(!is_finite(f64::INFINITY));
        assert!(!is_finite(f64::NEG_INFINITY));
        assert!(all_finite(&[]));
        assert!(!all_finite(&[1.0, f64::NAN]));
    }

    proptest! {
        #[test]
        fn any_bad_pose_component_blocks_line(idx in 0usize..9, bad in prop_oneof![
            Just(f64::NAN), Just(f64::INFINITY), Just(f64::NEG_INFINITY)
        ]) {
            let mut c = [1.0; 9];
            c[idx] = bad;
            let pose = Pose::from_components(&c).unwrap();
            prop_assert!(!pose_is_finite(&pose));
            let cmd = MotionCommand::SetLine(LineMove { end: pose, ..Default::default() });
            prop_assert!(!admit(&cmd));
        }

        #[test]
        fn finite_pose_admitted(c in proptest::array::uniform9(-1e6f64..1e6)) {
            let pose = Pose::from_components(&c).unwrap();
            let cmd = MotionCommand::SetWorldHome { pose };
            prop_assert!(admit(&cmd));
        }
    }
}
