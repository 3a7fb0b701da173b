use crate::{
    Attachment, BoneData, Error, PointAttachment, RegionAttachment, Skeleton, SkeletonData, Skin,
    SlotData,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn bone(name: &str, parent: Option<usize>, x: f32, y: f32, rotation: f32) -> BoneData {
    let mut bone = BoneData::new(name, parent);
    bone.x = x;
    bone.y = y;
    bone.rotation = rotation;
    bone
}

fn two_bone_data(root: BoneData, child: BoneData) -> Arc<SkeletonData> {
    Arc::new(SkeletonData {
        bones: vec![root, child],
        ..SkeletonData::default()
    })
}

#[test]
fn update_world_transform_root_and_child() {
    let data = two_bone_data(
        bone("root", None, 10.0, 20.0, 0.0),
        bone("child", Some(0), 5.0, 0.0, 90.0),
    );
    let mut skeleton = Skeleton::new(data);
    skeleton.update_world_transform();

    let root = &skeleton.bones[0];
    assert_approx(root.world_x, 10.0);
    assert_approx(root.world_y, 20.0);
    assert_approx(root.a, 1.0);
    assert_approx(root.d, 1.0);

    let child = &skeleton.bones[1];
    assert_approx(child.world_x, 15.0);
    assert_approx(child.world_y, 20.0);
    assert_approx(child.world_rotation, 90.0);
    assert_approx(child.a, 0.0);
    assert_approx(child.b, -1.0);
    assert_approx(child.c, 1.0);
    assert_approx(child.d, 0.0);
}

#[test]
fn children_follow_parent_rotation_and_scale() {
    let mut root = bone("root", None, 0.0, 0.0, 90.0);
    root.scale_x = 2.0;
    root.scale_y = 2.0;
    let data = two_bone_data(root, bone("child", Some(0), 5.0, 0.0, 30.0));
    let mut skeleton = Skeleton::new(data);
    skeleton.update_world_transform();

    let child = &skeleton.bones[1];
    assert_approx(child.world_x, 0.0);
    assert_approx(child.world_y, 10.0);
    assert_approx(child.world_rotation, 120.0);
    assert_approx(child.world_scale_x, 2.0);
    assert_approx(child.world_scale_y, 2.0);
}

#[test]
fn inherit_flags_detach_rotation_and_scale() {
    let mut root = bone("root", None, 0.0, 0.0, 90.0);
    root.scale_x = 2.0;
    root.scale_y = 2.0;
    let mut child = bone("child", Some(0), 5.0, 0.0, 30.0);
    child.inherit_rotation = false;
    child.inherit_scale = false;
    let data = two_bone_data(root, child);
    let mut skeleton = Skeleton::new(data);
    skeleton.update_world_transform();

    let child = &skeleton.bones[1];
    // Position still goes through the parent's matrix.
    assert_approx(child.world_x, 0.0);
    assert_approx(child.world_y, 10.0);
    assert_approx(child.world_rotation, 30.0);
    assert_approx(child.world_scale_x, 1.0);
    assert_approx(child.world_scale_y, 1.0);
}

#[test]
fn skeleton_position_moves_the_root() {
    let data = two_bone_data(
        bone("root", None, 10.0, 0.0, 0.0),
        bone("child", Some(0), 5.0, 0.0, 0.0),
    );
    let mut skeleton = Skeleton::new(data);
    skeleton.x = 100.0;
    skeleton.y = -50.0;
    skeleton.update_world_transform();

    assert_approx(skeleton.bones[0].world_x, 110.0);
    assert_approx(skeleton.bones[0].world_y, -50.0);
    assert_approx(skeleton.bones[1].world_x, 115.0);
    assert_approx(skeleton.bones[1].world_y, -50.0);
}

#[test]
fn flip_mirrors_the_hierarchy() {
    let data = two_bone_data(
        bone("root", None, 10.0, 10.0, 0.0),
        bone("child", Some(0), 5.0, 5.0, 0.0),
    );
    let mut skeleton = Skeleton::new(data);
    skeleton.x = 100.0;
    skeleton.flip_x = true;
    skeleton.update_world_transform();

    let root = &skeleton.bones[0];
    assert_approx(root.world_x, 90.0);
    assert_approx(root.world_y, 10.0);
    assert_approx(root.a, -1.0);
    assert_approx(root.d, 1.0);
    let child = &skeleton.bones[1];
    assert_approx(child.world_x, 85.0);
    assert_approx(child.world_y, 15.0);
    assert_approx(child.a, -1.0);

    skeleton.flip_x = false;
    skeleton.flip_y = true;
    skeleton.update_world_transform();
    let root = &skeleton.bones[0];
    assert_approx(root.world_x, 110.0);
    assert_approx(root.world_y, -10.0);
    assert_approx(root.a, 1.0);
    assert_approx(root.d, -1.0);
    assert_approx(skeleton.bones[1].world_y, -15.0);
}

#[test]
fn world_to_local_inverts_local_to_world() {
    let mut root = bone("root", None, 3.0, 4.0, 30.0);
    root.scale_x = 2.0;
    root.scale_y = 0.5;
    let data = Arc::new(SkeletonData {
        bones: vec![root],
        ..SkeletonData::default()
    });
    let mut skeleton = Skeleton::new(data);
    skeleton.update_world_transform();

    let bone = &skeleton.bones[0];
    let [world_x, world_y] = bone.local_to_world(1.0, 2.0);
    let [local_x, local_y] = bone.world_to_local(world_x, world_y);
    assert_approx(local_x, 1.0);
    assert_approx(local_y, 2.0);

    let [origin_x, origin_y] = bone.local_to_world(0.0, 0.0);
    assert_approx(origin_x, 3.0);
    assert_approx(origin_y, 4.0);
}

#[test]
fn zero_scale_bone_maps_world_points_to_origin() {
    let mut root = BoneData::new("root", None);
    root.scale_x = 0.0;
    let data = Arc::new(SkeletonData {
        bones: vec![root],
        ..SkeletonData::default()
    });
    let mut skeleton = Skeleton::new(data);
    skeleton.update_world_transform();
    assert_eq!(skeleton.bones[0].world_to_local(5.0, 5.0), [0.0, 0.0]);
}

fn slot_data() -> Arc<SkeletonData> {
    let mut default_skin = Skin::new("default");
    default_skin.set_attachment(
        0,
        "body",
        Attachment::Region(RegionAttachment::new("body", 4.0, 2.0)),
    );
    default_skin.set_attachment(
        0,
        "body-alt",
        Attachment::Region(RegionAttachment::new("body-alt", 4.0, 2.0)),
    );
    default_skin.set_attachment(
        1,
        "hand",
        Attachment::Point(PointAttachment {
            name: "hand".to_string(),
            x: 2.0,
            y: 0.0,
            rotation: 15.0,
        }),
    );

    let mut body = SlotData::new("body", 0);
    body.attachment = Some("body".to_string());
    body.color = [1.0, 0.5, 0.5, 1.0];
    let hand = SlotData::new("hand", 0);

    Arc::new(SkeletonData {
        bones: vec![bone("root", None, 10.0, 20.0, 90.0)],
        slots: vec![body, hand],
        default_skin: Some(Arc::new(default_skin)),
        ..SkeletonData::default()
    })
}

#[test]
fn new_skeleton_starts_in_setup_pose() {
    let skeleton = Skeleton::new(slot_data());
    assert_eq!(skeleton.slots[0].attachment_name(), Some("body"));
    assert_eq!(skeleton.slots[0].color, [1.0, 0.5, 0.5, 1.0]);
    assert!(skeleton.slots[1].attachment().is_none());
    assert_eq!(skeleton.draw_order, vec![0, 1]);
    assert_eq!(skeleton.root_bone().map(|bone| bone.rotation), Some(90.0));
}

#[test]
fn set_to_setup_pose_restores_bones_and_slots() {
    let mut skeleton = Skeleton::new(slot_data());
    skeleton.bones[0].x = -3.0;
    skeleton.bones[0].rotation = 12.0;
    skeleton.bones[0].scale_y = 4.0;
    skeleton.slots[0].color = [0.0, 0.0, 0.0, 0.0];
    skeleton.set_attachment("body", Some("body-alt")).unwrap();
    skeleton.set_attachment("hand", Some("hand")).unwrap();
    skeleton.draw_order.reverse();

    skeleton.set_bones_to_setup_pose();
    assert_eq!(skeleton.bones[0].x, 10.0);
    assert_eq!(skeleton.bones[0].rotation, 90.0);
    assert_eq!(skeleton.bones[0].scale_y, 1.0);
    // Slots are untouched by the bone reset.
    assert_eq!(skeleton.slots[0].attachment_name(), Some("body-alt"));

    skeleton.set_to_setup_pose();
    assert_eq!(skeleton.slots[0].attachment_name(), Some("body"));
    assert_eq!(skeleton.slots[0].color, [1.0, 0.5, 0.5, 1.0]);
    assert!(skeleton.slots[1].attachment().is_none());
    assert_eq!(skeleton.draw_order, vec![0, 1]);
}

#[test]
fn set_attachment_reports_unknown_names() {
    let mut skeleton = Skeleton::new(slot_data());

    let err = skeleton.set_attachment("tail", Some("body")).unwrap_err();
    assert!(matches!(err, Error::UnknownSlot { ref name } if name == "tail"));

    let err = skeleton.set_attachment("body", Some("hand")).unwrap_err();
    assert!(matches!(
        err,
        Error::UnknownAttachment { ref slot, ref attachment } if slot == "body" && attachment == "hand"
    ));
    assert_eq!(skeleton.slots[0].attachment_name(), Some("body"));

    skeleton.set_attachment("body", None).unwrap();
    assert!(skeleton.slots[0].attachment().is_none());
}

#[test]
fn attachment_lookup_by_slot_name() {
    let skeleton = Skeleton::new(slot_data());
    let hand = skeleton.attachment_by_name("hand", "hand");
    assert_eq!(hand.as_deref().map(Attachment::name), Some("hand"));
    assert!(skeleton.attachment_by_name("hand", "body").is_none());
    assert!(skeleton.attachment_by_name("tail", "hand").is_none());
}

#[test]
fn find_bone_and_slot_by_name() {
    let skeleton = Skeleton::new(slot_data());
    assert_eq!(skeleton.find_bone_index("root"), Some(0));
    assert!(skeleton.find_bone("missing").is_none());
    assert_eq!(skeleton.find_slot_index("hand"), Some(1));
    assert_eq!(skeleton.find_slot("hand").map(|slot| slot.bone()), Some(0));
    assert!(skeleton.find_slot("missing").is_none());
}

#[test]
fn attachment_time_counts_from_last_change() {
    let mut skeleton = Skeleton::new(slot_data());
    skeleton.update(1.5);
    assert_eq!(skeleton.time(), 1.5);
    assert_eq!(skeleton.slot_attachment_time(0), 1.5);

    skeleton.set_attachment("body", Some("body-alt")).unwrap();
    assert_eq!(skeleton.slot_attachment_time(0), 0.0);
    skeleton.update(0.5);
    assert_eq!(skeleton.slot_attachment_time(0), 0.5);

    skeleton.set_slot_attachment_time(0, 0.25);
    assert_eq!(skeleton.slot_attachment_time(0), 0.25);
    assert_eq!(skeleton.slot_attachment_time(9), 0.0);
}

#[test]
fn region_offsets_and_world_vertices() {
    let region = RegionAttachment::new("body", 4.0, 2.0);
    assert_eq!(
        region.offsets(),
        [-2.0, -1.0, -2.0, 1.0, 2.0, 1.0, 2.0, -1.0]
    );

    let mut shifted = region.clone();
    shifted.x = 1.0;
    shifted.y = 0.5;
    let offsets = shifted.offsets();
    assert_approx(offsets[0], -1.0);
    assert_approx(offsets[1], -0.5);
    assert_approx(offsets[4], 3.0);
    assert_approx(offsets[5], 1.5);

    let mut skeleton = Skeleton::new(slot_data());
    skeleton.update_world_transform();
    let vertices = region.compute_world_vertices(&skeleton.bones[0]);
    // Root sits at (10, 20) rotated 90 degrees: local (x, y) maps to (10 - y, 20 + x).
    let expected = [11.0, 18.0, 9.0, 18.0, 9.0, 22.0, 11.0, 22.0];
    for (actual, expected) in vertices.into_iter().zip(expected) {
        assert_approx(actual, expected);
    }
}

#[test]
fn point_attachment_world_position_and_rotation() {
    let mut skeleton = Skeleton::new(slot_data());
    skeleton.update_world_transform();

    let Some(Attachment::Point(point)) = skeleton.attachment(1, "hand").as_deref().cloned() else {
        panic!("expected point attachment");
    };
    let [x, y] = point.compute_world_position(&skeleton.bones[0]);
    assert_approx(x, 10.0);
    assert_approx(y, 22.0);
    assert_approx(point.compute_world_rotation(&skeleton.bones[0]), 105.0);
}
