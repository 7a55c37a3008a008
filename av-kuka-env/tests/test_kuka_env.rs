mod common;
use anyhow::Result;
use av_core::{error::AvError, record::BufferedRecorder, util, Env, Obs};
use av_kuka_env::{
    geometry::projection_matrix_fov, BoundingBox, ControlMode, EpisodeState, KukaAct,
    RandomPolicy, RenderMode,
};
use common::*;
use image::RgbImage;
use ndarray::Array2;
use tempdir::TempDir;

fn av_error(err: &anyhow::Error) -> Option<&AvError> {
    err.downcast_ref::<AvError>()
}

fn expected_bbox(rect: Rect) -> BoundingBox {
    BoundingBox::from_mask(&rect_mask(Some(rect), IMAGE_SIZE as _), IMAGE_SIZE as f32)
}

#[test]
fn test_step_before_reset() -> Result<()> {
    let (mut env, _, _) = env_with(config(), ScriptedSegmenter::new(vec![], Some(CENTER)))?;
    assert_eq!(env.state(), EpisodeState::Uninitialized);
    let err = env.step(&KukaAct(0)).unwrap_err();
    assert_eq!(av_error(&err), Some(&AvError::NotReset));
    Ok(())
}

#[test]
fn test_reset_builds_scene() -> Result<()> {
    let (mut env, log, _) = env_with(config(), ScriptedSegmenter::new(vec![], Some(CENTER)))?;
    let bbox = env.reset(None)?;

    assert_eq!(bbox, expected_bbox(CENTER));
    assert_eq!(env.state(), EpisodeState::Stepping);
    assert_eq!(env.step_counter(), 0);
    assert_eq!(env.end_effector_position().to_vec(), START.to_vec());

    let log = log.borrow();
    assert_eq!(log.n_resets, 1);
    let assets: Vec<&str> = log.loaded.iter().map(|(a, _)| a.as_str()).collect();
    assert_eq!(assets, vec!["plane.urdf", "kuka_iiwa/model.urdf", "sphere2.urdf"]);

    let robot = log.loaded[1].1;
    let object = log.loaded[2].1;
    assert_eq!(robot, [0.0, 0.0, 0.001]);
    let r = (object[0] - robot[0]).hypot(object[1] - robot[1]);
    assert!((r - 3.0).abs() < 1e-9);
    assert_eq!(object[2], 0.5);
    assert_eq!(env.object_position(), Some(object));
    Ok(())
}

#[test]
fn test_exploration_when_target_lost() -> Result<()> {
    let segmenter = ScriptedSegmenter::new(vec![None, None], Some(CENTER));
    let (mut env, log, _) = env_with(config(), segmenter)?;
    assert_eq!(env.reset(None)?.area(), 0.0);

    // The action is ignored while exploring.
    let (step, record) = env.step(&KukaAct(3))?;
    assert_eq!(step.info.mode, ControlMode::Explore);
    assert_eq!(step.reward, vec![0.0]);
    assert_eq!(record.get_scalar("position_gain")?, 0.15);

    let target = log.borrow().ik_targets[0];
    assert!((target[0].hypot(target[1]) - 2.0).abs() < 1e-9);
    assert_eq!(target[2], 0.5);
    // (0.5, 0) rotated by -45 degrees.
    assert!(target[1] < 0.0);
    assert!((target[0] + target[1]).abs() < 1e-9);

    let command = log.borrow().commands[0].clone();
    assert_eq!(command.position_gains, vec![0.15; 7]);
    assert_eq!(command.forces, vec![300.0; 7]);
    assert_eq!(command.joint_indices, (0..7).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn test_tracking_moves_in_end_effector_frame() -> Result<()> {
    let (mut env, log, _) = env_with(config(), ScriptedSegmenter::new(vec![], Some(CENTER)))?;
    env.reset(None)?;

    let (step, record) = env.step(&KukaAct(1))?;
    assert_eq!(step.info.mode, ControlMode::Track);
    assert_eq!(record.get_scalar("position_gain")?, 0.03);

    let target = log.borrow().ik_targets[0];
    assert!((target[0] - 0.8).abs() < 1e-9);
    assert!(target[1].abs() < 1e-9);
    assert!((target[2] - 1.0).abs() < 1e-9);
    assert_eq!(log.borrow().commands[0].position_gains, vec![0.03; 7]);

    // The mock reaches the target in one simulation step.
    assert!((env.end_effector_position()[0] - 0.8).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_invalid_action_while_tracking() -> Result<()> {
    let (mut env, _, _) = env_with(config(), ScriptedSegmenter::new(vec![], Some(CENTER)))?;
    env.reset(None)?;
    let err = env.step(&KukaAct(6)).unwrap_err();
    assert_eq!(av_error(&err), Some(&AvError::InvalidAction(6, 6)));
    Ok(())
}

#[test]
fn test_reward_is_area_of_observation() -> Result<()> {
    let small = (0, 3, 0, 7);
    let segmenter = ScriptedSegmenter::new(vec![Some(CENTER), Some(small)], Some(CENTER));
    let (mut env, _, n_calls) = env_with(config(), segmenter)?;
    env.reset(None)?;

    let (step, record) = env.step(&KukaAct(0))?;
    assert_eq!(step.obs, expected_bbox(small));
    assert_eq!(step.reward[0], step.obs.area());
    assert_eq!(record.get_scalar("bbox_area")?, step.obs.area());
    assert_eq!(record.get_array1("obs")?, Vec::<f32>::from(step.obs));
    assert_eq!(env.bounding_box(), step.obs);

    // One segmentation for the reset and one per step.
    assert_eq!(*n_calls.borrow(), 2);
    env.step(&KukaAct(0))?;
    env.step(&KukaAct(0))?;
    assert_eq!(*n_calls.borrow(), 4);
    Ok(())
}

#[test]
fn test_episode_horizon() -> Result<()> {
    let config = config().max_steps(3);
    let (mut env, _, _) = env_with(config, ScriptedSegmenter::new(vec![], Some(CENTER)))?;
    env.reset(None)?;

    for i in 1..=3 {
        let (step, record) = env.step(&KukaAct(5))?;
        assert_eq!(env.step_counter(), i);
        assert_eq!(record.get_scalar("step_counter")?, i as f32);
        assert_eq!(step.is_terminated, vec![0]);
        assert_eq!(step.is_truncated, vec![(i == 3) as i8]);
        assert_eq!(step.is_done(), i == 3);
    }
    assert_eq!(env.state(), EpisodeState::Done);

    let err = env.step(&KukaAct(5)).unwrap_err();
    assert_eq!(av_error(&err), Some(&AvError::EpisodeOver(3)));

    env.reset(None)?;
    assert_eq!(env.state(), EpisodeState::Stepping);
    assert_eq!(env.step_counter(), 0);
    Ok(())
}

#[test]
fn test_step_with_reset() -> Result<()> {
    let config = config().max_steps(2);
    let (mut env, log, _) = env_with(config, ScriptedSegmenter::new(vec![], Some(CENTER)))?;
    env.reset(None)?;

    let (step, _) = env.step_with_reset(&KukaAct(0))?;
    assert!(!step.is_done());
    assert_eq!(step.init_obs, BoundingBox::dummy());

    let (step, _) = env.step_with_reset(&KukaAct(0))?;
    assert!(step.is_done());
    assert_eq!(step.init_obs, expected_bbox(CENTER));
    assert_eq!(env.step_counter(), 0);
    assert_eq!(log.borrow().n_resets, 2);
    Ok(())
}

#[test]
fn test_reset_skipped_when_not_done() -> Result<()> {
    let (mut env, log, _) = env_with(config(), ScriptedSegmenter::new(vec![], Some(CENTER)))?;
    env.reset(None)?;
    env.step(&KukaAct(0))?;

    let bbox = env.reset(Some(&vec![0]))?;
    assert_eq!(bbox, env.bounding_box());
    assert_eq!(env.step_counter(), 1);
    assert_eq!(log.borrow().n_resets, 1);

    env.reset(Some(&vec![1]))?;
    assert_eq!(env.step_counter(), 0);
    assert_eq!(log.borrow().n_resets, 2);
    Ok(())
}

#[test]
fn test_reset_restores_initial_pose() -> Result<()> {
    let mut backend = MockBackend::new();
    backend.yaw_per_step = 0.3;
    let segmenter = ScriptedSegmenter::new(vec![], Some(CENTER));
    let (mut env, log, _) = env_with_backend(config(), backend, segmenter)?;
    let eye = Array2::<f64>::eye(3);

    env.reset(None)?;
    let initial_view = log.borrow().views[0];
    for _ in 0..4 {
        env.step(&KukaAct(3))?;
    }
    assert!(env.end_effector_position()[1] > 0.5);
    let yawed = env.rotation_matrix();
    assert!((yawed[[0, 0]] - 1.2f64.cos()).abs() < 1e-9);
    assert!((yawed[[1, 0]] - 1.2f64.sin()).abs() < 1e-9);
    assert_ne!(*log.borrow().views.last().unwrap(), initial_view);

    env.reset(None)?;
    assert_eq!(env.end_effector_position().to_vec(), START.to_vec());
    assert!(env
        .rotation_matrix()
        .iter()
        .zip(eye.iter())
        .all(|(a, b)| (a - b).abs() < 1e-12));

    // The first observation of the new episode is rendered from the initial pose.
    assert_eq!(*env.backend().log.borrow().views.last().unwrap(), initial_view);
    assert!(env.camera_image().is_some());
    Ok(())
}

#[test]
fn test_reset_with_empty_flags() -> Result<()> {
    let (mut env, log, _) = env_with(config(), ScriptedSegmenter::new(vec![], Some(CENTER)))?;
    env.reset(None)?;
    env.step(&KukaAct(0))?;
    env.reset(Some(&vec![]))?;
    assert_eq!(env.step_counter(), 0);
    assert_eq!(log.borrow().n_resets, 2);
    Ok(())
}

#[test]
fn test_reset_with_index_is_reproducible() -> Result<()> {
    let (mut env, _, _) = env_with(config(), ScriptedSegmenter::new(vec![], Some(CENTER)))?;
    env.reset_with_index(7)?;
    let first = env.object_position();
    env.reset_with_index(8)?;
    let other = env.object_position();
    env.reset_with_index(7)?;
    assert_eq!(env.object_position(), first);
    assert_ne!(other, first);
    Ok(())
}

#[test]
fn test_spaces_and_render() -> Result<()> {
    let (mut env, _, _) = env_with(config(), ScriptedSegmenter::new(vec![], Some(CENTER)))?;
    assert_eq!(env.action_space().n, 6);
    let camera = &env.config().camera;
    let projection = projection_matrix_fov(camera.fov, camera.aspect, camera.near, camera.far);
    assert_eq!(env.projection_matrix(), &projection);
    assert_eq!(projection[11], -1.0);
    let space = env.observation_space();
    assert_eq!(space.shape, vec![4]);

    assert!(env.render(RenderMode::RgbArray)?.is_none());
    let bbox = env.reset(None)?;
    assert!(space.contains(&bbox.to_array()));

    let frame = env.render(RenderMode::RgbArray)?.unwrap();
    assert_eq!(frame.dimensions(), (IMAGE_SIZE, IMAGE_SIZE));
    assert!(env.render(RenderMode::Human)?.is_none());
    Ok(())
}

#[test]
fn test_close_disconnects() -> Result<()> {
    let (env, log, _) = env_with(config(), ScriptedSegmenter::new(vec![], Some(CENTER)))?;
    env.close()?;
    assert!(log.borrow().disconnected);
    Ok(())
}

#[test]
fn test_build_loads_target_image() -> Result<()> {
    let dir = TempDir::new("kuka_env")?;
    let path = dir.path().join("target.png");
    RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 0])).save(&path)?;

    let config = config().target_image_path(&path);
    let mut env = TestEnv::build(&config, 0)?;
    assert_eq!(env.reset(None)?, expected_bbox(CENTER));

    // A failed build releases the connected backend.
    let n_disconnects = disconnects();
    let config = config.target_image_path(dir.path().join("missing.png"));
    assert!(TestEnv::build(&config, 0).is_err());
    assert_eq!(disconnects(), n_disconnects + 1);
    Ok(())
}

#[test]
fn test_random_policy_episodes() -> Result<()> {
    let config = config().max_steps(5);
    let (mut env, _, _) = env_with(config, ScriptedSegmenter::new(vec![], Some(CENTER)))?;
    let mut policy = RandomPolicy::new(0);
    let mut recorder = BufferedRecorder::new();

    let returns = util::eval_with_recorder(&mut env, &mut policy, 2, &mut recorder)?;
    assert_eq!(returns.len(), 2);
    assert_eq!(recorder.len(), 10);
    let area = expected_bbox(CENTER).area();
    for r in returns {
        assert!((r - 5.0 * area).abs() < 1e-5);
    }
    Ok(())
}
