//! Joint position file across bridge restarts.

mod common;

use std::fs;
use std::path::Path;

use common::{bridge_with, RecordingChannel};
use proptest::prelude::*;
use taskmot::bridge::MotionBridge;
use taskmot::error::{BridgeError, Dispatch};
use taskmot_common::command::MotionCommand;
use taskmot_common::snapshot::StatusSnapshot;
use tempfile::TempDir;

/// Three-joint machine persisting positions to `path`.
fn machine(path: &Path) -> String {
    format!(
        "[TRAJ]\nJOINTS = 3\nPOSITION_FILE = {:?}\n",
        path.display().to_string()
    )
}

/// Publish `positions` as joint feedback and run one update.
fn observe(
    bridge: &mut MotionBridge<RecordingChannel>,
    channel: &RecordingChannel,
    positions: &[f64],
) {
    let mut s = StatusSnapshot::new();
    for (fb, pos) in s.joints.iter_mut().zip(positions) {
        fb.pos_fb = *pos;
    }
    channel.set_status(s);
    bridge.update().unwrap();
}

fn motor_offsets(channel: &RecordingChannel) -> Vec<(usize, f64)> {
    channel
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            MotionCommand::SetMotorOffset { joint, offset } => Some((joint, offset)),
            _ => None,
        })
        .collect()
}

#[test]
fn first_start_without_file_sends_no_offsets() {
    let dir = TempDir::new().unwrap();
    let (mut b, channel) = bridge_with(&machine(&dir.path().join("position.txt")));
    b.motion_init().unwrap();
    assert!(motor_offsets(&channel).is_empty());
    assert_eq!(b.position_load().unwrap(), Dispatch::Local);
}

#[test]
fn halt_saves_one_line_per_joint() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("position.txt");
    let (mut b, channel) = bridge_with(&machine(&path));
    b.motion_init().unwrap();
    observe(&mut b, &channel, &[1.5, -2.25, 100.0]);
    b.motion_halt().unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let values: Vec<f64> = content.lines().map(|l| l.trim().parse().unwrap()).collect();
    assert_eq!(values, vec![1.5, -2.25, 100.0]);
}

#[test]
fn restart_restores_positions_as_offsets() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("position.txt");

    let (mut first, channel) = bridge_with(&machine(&path));
    first.motion_init().unwrap();
    observe(&mut first, &channel, &[10.0, 20.0, -30.0]);
    first.motion_halt().unwrap();

    let (mut second, channel) = bridge_with(&machine(&path));
    second.motion_init().unwrap();
    assert_eq!(
        motor_offsets(&channel),
        vec![(0, -10.0), (1, -20.0), (2, 30.0)]
    );
}

#[test]
fn malformed_file_fails_init_but_keeps_subsystems() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("position.txt");
    fs::write(&path, "1.0\nbogus\n3.0\n").unwrap();

    let (mut b, channel) = bridge_with(&machine(&path));
    let err = b.motion_init().unwrap_err();
    assert!(matches!(err, BridgeError::Persistence(_)));
    assert!(!b.is_initialized());
    assert!(b.tracker().any_active());
    assert!(channel.is_open());
    assert!(motor_offsets(&channel).is_empty());
}

#[test]
fn short_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("position.txt");
    fs::write(&path, "1.0\n2.0\n").unwrap();

    let (mut b, _channel) = bridge_with(&machine(&path));
    b.traj_init().unwrap();
    assert!(matches!(b.position_load(), Err(BridgeError::Persistence(_))));
}

#[test]
fn unwritable_position_file_fails_halt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing-dir").join("position.txt");
    let (mut b, channel) = bridge_with(&machine(&path));
    b.motion_init().unwrap();

    assert!(matches!(b.motion_halt(), Err(BridgeError::Persistence(_))));
    // Every other halt step still ran.
    assert!(!channel.is_open());
}

#[test]
fn persistence_disabled_without_path() {
    let (mut b, _channel) = bridge_with("[TRAJ]\nJOINTS = 2\n");
    b.motion_init().unwrap();
    assert_eq!(b.position_save().unwrap(), Dispatch::Local);
    assert_eq!(b.position_load().unwrap(), Dispatch::Local);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Saved positions come back bit-exact as negated motor offsets.
    #[test]
    fn save_then_load_restores_exact_offsets(
        positions in proptest::array::uniform3(-1e6f64..1e6)
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("position.txt");

        let (mut first, channel) = bridge_with(&machine(&path));
        first.motion_init().unwrap();
        observe(&mut first, &channel, &positions);
        first.position_save().unwrap();

        let (mut second, channel) = bridge_with(&machine(&path));
        second.motion_init().unwrap();
        let expected: Vec<(usize, f64)> =
            positions.iter().enumerate().map(|(j, p)| (j, -p)).collect();
        prop_assert_eq!(motor_offsets(&channel), expected);
    }
}
