use super::animation::{binary_search, wrap_degrees};
use crate::{
    Animation, BoneData, ColorTimeline, Curve, RotateTimeline, ScaleTimeline, Skeleton,
    SkeletonData, SlotData, Timeline, TranslateTimeline, apply_animation, mix_animation,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-5,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn skeleton_data_with_root(setup_x: f32, setup_y: f32, setup_rotation: f32) -> Arc<SkeletonData> {
    let mut root = BoneData::new("root", None);
    root.x = setup_x;
    root.y = setup_y;
    root.rotation = setup_rotation;
    root.scale_x = 2.0;
    root.scale_y = 4.0;
    Arc::new(SkeletonData {
        bones: vec![root],
        slots: vec![SlotData::new("slot", 0)],
        ..SkeletonData::default()
    })
}

fn translate_animation(duration: f32, keys: &[(f32, f32, f32)]) -> Animation {
    let mut timeline = TranslateTimeline::new(0, keys.len());
    for (i, &(time, x, y)) in keys.iter().enumerate() {
        timeline.set_frame(i, time, x, y);
    }
    Animation::new("translate", vec![Timeline::Translate(timeline)], duration)
}

fn rotate_animation(duration: f32, keys: &[(f32, f32)]) -> Animation {
    let mut timeline = RotateTimeline::new(0, keys.len());
    for (i, &(time, angle)) in keys.iter().enumerate() {
        timeline.set_frame(i, time, angle);
    }
    Animation::new("rotate", vec![Timeline::Rotate(timeline)], duration)
}

#[test]
fn binary_search_returns_first_frame_after_target() {
    let two_frames = [0.0, 10.0, 1.0, 20.0];
    assert_eq!(binary_search(&two_frames, 0.5, 2), 2);

    let frames = [0.0, 0.25, 0.5, 1.0];
    assert_eq!(binary_search(&frames, 0.1, 1), 1);
    assert_eq!(binary_search(&frames, 0.25, 1), 2);
    assert_eq!(binary_search(&frames, 0.3, 1), 2);
    assert_eq!(binary_search(&frames, 0.5, 1), 3);
    assert_eq!(binary_search(&frames, 0.75, 1), 3);
}

#[test]
fn binary_search_stays_in_range_past_last_frame() {
    let frames = [0.0, 1.0, 0.0, 0.5, 2.0, 0.0, 1.0, 3.0, 0.0];
    assert_eq!(binary_search(&frames, 5.0, 3), 6);
}

#[test]
fn wrap_degrees_keeps_half_open_range() {
    assert_approx(wrap_degrees(0.0), 0.0);
    assert_approx(wrap_degrees(180.0), 180.0);
    assert_approx(wrap_degrees(-180.0), 180.0);
    assert_approx(wrap_degrees(190.0), -170.0);
    assert_approx(wrap_degrees(-190.0), 170.0);
    assert_approx(wrap_degrees(540.0), 180.0);
    assert_approx(wrap_degrees(-340.0), 20.0);
}

#[test]
fn translate_timeline_interpolates() {
    let data = skeleton_data_with_root(2.0, 3.0, 0.0);
    let mut skeleton = Skeleton::new(data);
    let animation = translate_animation(1.0, &[(0.0, 0.0, 0.0), (1.0, 10.0, 0.0)]);

    apply_animation(&animation, &mut skeleton, 0.5, false);
    assert_approx(skeleton.bones[0].x, 7.0);
    assert_approx(skeleton.bones[0].y, 3.0);
}

#[test]
fn timeline_before_first_frame_is_a_no_op() {
    let data = skeleton_data_with_root(0.0, 0.0, 0.0);
    let mut skeleton = Skeleton::new(data);
    skeleton.bones[0].x = 42.0;
    skeleton.bones[0].rotation = 17.0;

    let translate = translate_animation(1.0, &[(0.5, 10.0, 10.0), (1.0, 20.0, 20.0)]);
    let rotate = rotate_animation(1.0, &[(0.5, 90.0), (1.0, 180.0)]);
    apply_animation(&translate, &mut skeleton, 0.25, false);
    apply_animation(&rotate, &mut skeleton, 0.25, false);

    assert_approx(skeleton.bones[0].x, 42.0);
    assert_approx(skeleton.bones[0].y, 0.0);
    assert_approx(skeleton.bones[0].rotation, 17.0);
}

#[test]
fn timeline_after_last_frame_holds_last_value() {
    let data = skeleton_data_with_root(1.0, 0.0, 0.0);
    let mut skeleton = Skeleton::new(data);
    let animation = translate_animation(1.0, &[(0.0, 0.0, 0.0), (1.0, 10.0, -4.0)]);

    apply_animation(&animation, &mut skeleton, 1.0, false);
    assert_approx(skeleton.bones[0].x, 11.0);
    assert_approx(skeleton.bones[0].y, -4.0);

    apply_animation(&animation, &mut skeleton, 7.5, false);
    assert_approx(skeleton.bones[0].x, 11.0);
    assert_approx(skeleton.bones[0].y, -4.0);
}

#[test]
fn single_frame_timeline_applies_its_value() {
    let data = skeleton_data_with_root(0.0, 0.0, 0.0);
    let mut skeleton = Skeleton::new(data);
    let animation = translate_animation(0.0, &[(0.0, 3.0, 4.0)]);

    apply_animation(&animation, &mut skeleton, 0.0, false);
    assert_approx(skeleton.bones[0].x, 3.0);
    assert_approx(skeleton.bones[0].y, 4.0);
}

#[test]
fn scale_timeline_is_relative_to_setup_minus_one() {
    let data = skeleton_data_with_root(0.0, 0.0, 0.0);
    let mut skeleton = Skeleton::new(data);
    let mut timeline = ScaleTimeline::new(0, 2);
    timeline.set_frame(0, 0.0, 1.0, 1.0);
    timeline.set_frame(1, 1.0, 2.0, 0.5);
    let animation = Animation::new("scale", vec![Timeline::Scale(timeline)], 1.0);

    apply_animation(&animation, &mut skeleton, 0.0, false);
    assert_approx(skeleton.bones[0].scale_x, 2.0);
    assert_approx(skeleton.bones[0].scale_y, 4.0);

    apply_animation(&animation, &mut skeleton, 1.0, false);
    assert_approx(skeleton.bones[0].scale_x, 3.0);
    assert_approx(skeleton.bones[0].scale_y, 3.5);
}

#[test]
fn rotate_timeline_takes_short_path_between_keys() {
    let data = skeleton_data_with_root(0.0, 0.0, 0.0);
    let mut skeleton = Skeleton::new(data);
    let animation = rotate_animation(1.0, &[(0.0, 170.0), (1.0, -170.0)]);

    apply_animation(&animation, &mut skeleton, 0.25, false);
    assert_approx(skeleton.bones[0].rotation, 175.0);

    skeleton.set_bones_to_setup_pose();
    apply_animation(&animation, &mut skeleton, 0.5, false);
    assert_approx(skeleton.bones[0].rotation, 180.0);

    skeleton.set_bones_to_setup_pose();
    apply_animation(&animation, &mut skeleton, 0.75, false);
    assert_approx(skeleton.bones[0].rotation, -175.0);
}

#[test]
fn rotate_timeline_is_relative_to_setup_rotation() {
    let data = skeleton_data_with_root(0.0, 0.0, 20.0);
    let mut skeleton = Skeleton::new(data);
    let animation = rotate_animation(1.0, &[(0.0, 0.0), (1.0, 90.0)]);

    apply_animation(&animation, &mut skeleton, 0.5, false);
    assert_approx(skeleton.bones[0].rotation, 65.0);
}

#[test]
fn rotate_after_last_frame_moves_the_short_way() {
    let data = skeleton_data_with_root(0.0, 0.0, 10.0);
    let mut skeleton = Skeleton::new(data);
    let animation = rotate_animation(1.0, &[(0.0, 0.0), (1.0, 350.0)]);

    apply_animation(&animation, &mut skeleton, 2.0, false);
    assert_approx(skeleton.bones[0].rotation, 0.0);
}

#[test]
fn mix_moves_alpha_of_the_way_to_the_target() {
    let data = skeleton_data_with_root(0.0, 0.0, 0.0);
    let mut skeleton = Skeleton::new(data);
    let rotate = rotate_animation(1.0, &[(0.0, 90.0)]);
    let translate = translate_animation(1.0, &[(0.0, 10.0, 0.0)]);

    mix_animation(&rotate, &mut skeleton, 0.0, false, 0.5);
    mix_animation(&translate, &mut skeleton, 0.0, false, 0.5);
    assert_approx(skeleton.bones[0].rotation, 45.0);
    assert_approx(skeleton.bones[0].x, 5.0);

    // Repeated mixes compose toward the target.
    mix_animation(&rotate, &mut skeleton, 0.0, false, 0.5);
    assert_approx(skeleton.bones[0].rotation, 67.5);
}

#[test]
fn stepped_curve_holds_previous_key() {
    let data = skeleton_data_with_root(0.0, 0.0, 0.0);
    let mut skeleton = Skeleton::new(data);
    let mut timeline = TranslateTimeline::new(0, 2);
    timeline.set_frame(0, 0.0, 0.0, 0.0);
    timeline.set_frame(1, 1.0, 10.0, 10.0);
    timeline.set_curve(0, Curve::Stepped);
    let animation = Animation::new("stepped", vec![Timeline::Translate(timeline)], 1.0);

    apply_animation(&animation, &mut skeleton, 0.99, false);
    assert_approx(skeleton.bones[0].x, 0.0);
    apply_animation(&animation, &mut skeleton, 1.0, false);
    assert_approx(skeleton.bones[0].x, 10.0);
}

#[test]
fn bezier_curve_reshapes_interpolation() {
    let data = skeleton_data_with_root(0.0, 0.0, 0.0);
    let mut skeleton = Skeleton::new(data);
    let mut timeline = TranslateTimeline::new(0, 2);
    timeline.set_frame(0, 0.0, 0.0, 0.0);
    timeline.set_frame(1, 1.0, 100.0, 0.0);
    timeline.set_curve(
        0,
        Curve::Bezier {
            cx1: 0.42,
            cy1: 0.0,
            cx2: 1.0,
            cy2: 1.0,
        },
    );
    let expected = timeline.curves().curve_percent(0, 0.25) * 100.0;
    let animation = Animation::new("ease", vec![Timeline::Translate(timeline)], 1.0);

    apply_animation(&animation, &mut skeleton, 0.25, false);
    assert_approx(skeleton.bones[0].x, expected);
    assert!(skeleton.bones[0].x < 25.0);
}

#[test]
fn looping_wraps_time_into_duration() {
    let data = skeleton_data_with_root(0.0, 0.0, 0.0);
    let mut skeleton = Skeleton::new(data);
    let animation = translate_animation(1.0, &[(0.0, 0.0, 0.0), (1.0, 10.0, 0.0)]);

    apply_animation(&animation, &mut skeleton, 0.25, true);
    let at_start = skeleton.bones[0].x;
    apply_animation(&animation, &mut skeleton, 1.25, true);
    assert_approx(skeleton.bones[0].x, at_start);
    apply_animation(&animation, &mut skeleton, 3.25, true);
    assert_approx(skeleton.bones[0].x, at_start);
    assert_approx(at_start, 2.5);
}

#[test]
fn color_timeline_sets_at_full_alpha_and_blends_below() {
    let data = skeleton_data_with_root(0.0, 0.0, 0.0);
    let mut skeleton = Skeleton::new(data);
    let mut timeline = ColorTimeline::new(0, 2);
    timeline.set_frame(0, 0.0, [1.0, 0.0, 0.0, 1.0]);
    timeline.set_frame(1, 1.0, [0.0, 0.0, 1.0, 1.0]);
    let animation = Animation::new("color", vec![Timeline::Color(timeline)], 1.0);

    apply_animation(&animation, &mut skeleton, 0.5, false);
    let color = skeleton.slots[0].color;
    for (actual, expected) in color.into_iter().zip([0.5, 0.0, 0.5, 1.0]) {
        assert_approx(actual, expected);
    }

    skeleton.set_slots_to_setup_pose();
    mix_animation(&animation, &mut skeleton, 0.5, false, 0.5);
    let color = skeleton.slots[0].color;
    for (actual, expected) in color.into_iter().zip([0.75, 0.5, 0.75, 1.0]) {
        assert_approx(actual, expected);
    }
}

#[test]
fn timelines_with_missing_targets_are_ignored() {
    let data = skeleton_data_with_root(0.0, 0.0, 0.0);
    let mut skeleton = Skeleton::new(data);
    let mut rotate = RotateTimeline::new(5, 1);
    rotate.set_frame(0, 0.0, 45.0);
    let mut color = ColorTimeline::new(9, 1);
    color.set_frame(0, 0.0, [0.0, 0.0, 0.0, 0.0]);
    let animation = Animation::new(
        "broken",
        vec![Timeline::Rotate(rotate), Timeline::Color(color)],
        1.0,
    );

    apply_animation(&animation, &mut skeleton, 0.5, false);
    assert_approx(skeleton.bones[0].rotation, 0.0);
    assert_approx(skeleton.slots[0].color[3], 1.0);
}
