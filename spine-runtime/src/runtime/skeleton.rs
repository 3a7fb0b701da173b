use crate::{
    Attachment, BoneData, Error, PointAttachment, RegionAttachment, Result, SkeletonData, Skin,
    SlotData,
};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,

    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,

    /// World matrix `[a b; c d]`, columns are the bone's world x and y axes.
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,
    pub world_rotation: f32,
    pub world_scale_x: f32,
    pub world_scale_y: f32,
}

impl Bone {
    fn new(data_index: usize, data: &BoneData) -> Self {
        Self {
            data_index,
            parent: data.parent,
            x: data.x,
            y: data.y,
            rotation: data.rotation,
            scale_x: data.scale_x,
            scale_y: data.scale_y,
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            world_x: 0.0,
            world_y: 0.0,
            world_rotation: 0.0,
            world_scale_x: 1.0,
            world_scale_y: 1.0,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    fn set_to_setup_pose(&mut self, data: &BoneData) {
        self.x = data.x;
        self.y = data.y;
        self.rotation = data.rotation;
        self.scale_x = data.scale_x;
        self.scale_y = data.scale_y;
    }

    pub fn local_to_world(&self, local_x: f32, local_y: f32) -> [f32; 2] {
        [
            self.a * local_x + self.b * local_y + self.world_x,
            self.c * local_x + self.d * local_y + self.world_y,
        ]
    }

    /// Inverse of [`Bone::local_to_world`]. A degenerate (zero scale) bone maps everything to its
    /// origin.
    pub fn world_to_local(&self, world_x: f32, world_y: f32) -> [f32; 2] {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() <= 1.0e-12 {
            return [0.0, 0.0];
        }
        let inv_det = 1.0 / det;
        let dx = world_x - self.world_x;
        let dy = world_y - self.world_y;
        [
            (self.d * dx - self.b * dy) * inv_det,
            (self.a * dy - self.c * dx) * inv_det,
        ]
    }
}

#[derive(Clone, Debug)]
pub struct Slot {
    data_index: usize,
    bone: usize,
    pub color: [f32; 4],
    attachment: Option<Arc<Attachment>>,
    /// Skeleton time at which the current attachment was assigned.
    attachment_stamp: f32,
}

impl Slot {
    fn new(data_index: usize, data: &SlotData) -> Self {
        Self {
            data_index,
            bone: data.bone,
            color: data.color,
            attachment: None,
            attachment_stamp: 0.0,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn bone(&self) -> usize {
        self.bone
    }

    pub fn attachment(&self) -> Option<&Arc<Attachment>> {
        self.attachment.as_ref()
    }

    pub fn attachment_name(&self) -> Option<&str> {
        self.attachment.as_deref().map(Attachment::name)
    }
}

impl RegionAttachment {
    /// Bone-local corners in `[bl, ul, ur, br]` order, `x, y` each.
    pub fn offsets(&self) -> [f32; 8] {
        let local_x = -self.width / 2.0 * self.scale_x;
        let local_y = -self.height / 2.0 * self.scale_y;
        let local_x2 = self.width / 2.0 * self.scale_x;
        let local_y2 = self.height / 2.0 * self.scale_y;
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let local_x_cos = local_x * cos + self.x;
        let local_x_sin = local_x * sin;
        let local_y_cos = local_y * cos + self.y;
        let local_y_sin = local_y * sin;
        let local_x2_cos = local_x2 * cos + self.x;
        let local_x2_sin = local_x2 * sin;
        let local_y2_cos = local_y2 * cos + self.y;
        let local_y2_sin = local_y2 * sin;
        [
            local_x_cos - local_y_sin,
            local_y_cos + local_x_sin,
            local_x_cos - local_y2_sin,
            local_y2_cos + local_x_sin,
            local_x2_cos - local_y2_sin,
            local_y2_cos + local_x2_sin,
            local_x2_cos - local_y_sin,
            local_y_cos + local_x2_sin,
        ]
    }

    pub fn compute_world_vertices(&self, bone: &Bone) -> [f32; 8] {
        let offsets = self.offsets();
        let mut vertices = [0.0; 8];
        for (corner, out) in offsets.chunks_exact(2).zip(vertices.chunks_exact_mut(2)) {
            let [x, y] = bone.local_to_world(corner[0], corner[1]);
            out[0] = x;
            out[1] = y;
        }
        vertices
    }
}

impl PointAttachment {
    pub fn compute_world_position(&self, bone: &Bone) -> [f32; 2] {
        bone.local_to_world(self.x, self.y)
    }

    pub fn compute_world_rotation(&self, bone: &Bone) -> f32 {
        bone.c.atan2(bone.a).to_degrees() + self.rotation
    }
}

/// Mutable pose instance of a [`SkeletonData`].
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub data: Arc<SkeletonData>,
    pub bones: Vec<Bone>,
    pub slots: Vec<Slot>,
    /// Slot indices in draw order.
    pub draw_order: Vec<usize>,
    skin: Option<Arc<Skin>>,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub flip_x: bool,
    pub flip_y: bool,
    time: f32,
}

impl Skeleton {
    pub fn new(data: Arc<SkeletonData>) -> Self {
        let bones = data
            .bones
            .iter()
            .enumerate()
            .map(|(i, bone)| Bone::new(i, bone))
            .collect();
        let slots = data
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| Slot::new(i, slot))
            .collect();
        let draw_order = (0..data.slots.len()).collect();
        let mut skeleton = Self {
            data,
            bones,
            slots,
            draw_order,
            skin: None,
            color: [1.0, 1.0, 1.0, 1.0],
            x: 0.0,
            y: 0.0,
            flip_x: false,
            flip_y: false,
            time: 0.0,
        };
        skeleton.set_slots_to_setup_pose();
        skeleton
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    pub fn update(&mut self, delta: f32) {
        self.time += delta;
    }

    /// Recomputes every bone's world transform from its local pose. Bones are stored parents first,
    /// so one pass in order sees each parent already updated.
    pub fn update_world_transform(&mut self) {
        let skeleton_data = self.data.clone();
        for bone_index in 0..self.bones.len() {
            let Some(data) = skeleton_data.bones.get(self.bones[bone_index].data_index) else {
                continue;
            };
            let parent = self.bones[bone_index]
                .parent
                .filter(|&parent| parent < bone_index)
                .map(|parent| {
                    let p = &self.bones[parent];
                    ParentTransform {
                        a: p.a,
                        b: p.b,
                        c: p.c,
                        d: p.d,
                        world_x: p.world_x,
                        world_y: p.world_y,
                        world_rotation: p.world_rotation,
                        world_scale_x: p.world_scale_x,
                        world_scale_y: p.world_scale_y,
                    }
                });
            let bone = &mut self.bones[bone_index];
            match parent {
                Some(parent) => update_world_transform_child(bone, data, &parent),
                None => update_world_transform_root(bone, self.x, self.y, self.flip_x, self.flip_y),
            }
            if self.flip_x {
                bone.a = -bone.a;
                bone.b = -bone.b;
            }
            if self.flip_y {
                bone.c = -bone.c;
                bone.d = -bone.d;
            }
        }
    }

    pub fn set_to_setup_pose(&mut self) {
        self.set_bones_to_setup_pose();
        self.set_slots_to_setup_pose();
    }

    pub fn set_bones_to_setup_pose(&mut self) {
        for bone in &mut self.bones {
            if let Some(data) = self.data.bones.get(bone.data_index) {
                bone.set_to_setup_pose(data);
            }
        }
    }

    /// Restores setup colors, setup attachments (resolved through the current skins) and the setup
    /// draw order.
    pub fn set_slots_to_setup_pose(&mut self) {
        let skeleton_data = self.data.clone();
        self.draw_order.clear();
        self.draw_order.extend(0..self.slots.len());
        for slot_index in 0..self.slots.len() {
            let Some(data) = skeleton_data.slots.get(self.slots[slot_index].data_index) else {
                continue;
            };
            let attachment = data
                .attachment
                .as_deref()
                .and_then(|name| self.attachment(slot_index, name));
            self.slots[slot_index].color = data.color;
            self.set_slot_attachment(slot_index, attachment);
        }
    }

    pub fn skin(&self) -> Option<&Arc<Skin>> {
        self.skin.as_ref()
    }

    /// Switches the active skin.
    ///
    /// Slots showing an attachment of the old skin get the attachment stored under the same name in
    /// the new skin, when it has one. Coming from no skin, slots take their setup attachment from
    /// the new skin when it defines one.
    pub fn set_skin(&mut self, skin: Option<Arc<Skin>>) {
        let old_skin = self.skin.take();
        if let Some(new_skin) = skin.as_ref() {
            match old_skin {
                Some(old_skin) => {
                    for (slot_index, name, attachment) in old_skin.attachments() {
                        let showing = self
                            .slots
                            .get(slot_index)
                            .and_then(|slot| slot.attachment.as_ref())
                            .is_some_and(|current| Arc::ptr_eq(current, attachment));
                        if !showing {
                            continue;
                        }
                        if let Some(replacement) = new_skin.attachment(slot_index, name) {
                            self.set_slot_attachment(slot_index, Some(replacement.clone()));
                        }
                    }
                }
                None => {
                    let skeleton_data = self.data.clone();
                    for slot_index in 0..self.slots.len() {
                        let setup_name = skeleton_data
                            .slots
                            .get(self.slots[slot_index].data_index)
                            .and_then(|slot| slot.attachment.as_deref());
                        let Some(setup_name) = setup_name else {
                            continue;
                        };
                        if let Some(attachment) = new_skin.attachment(slot_index, setup_name) {
                            self.set_slot_attachment(slot_index, Some(attachment.clone()));
                        }
                    }
                }
            }
        }
        log::debug!(
            "skeleton skin set to {:?}",
            skin.as_ref().map(|skin| skin.name.as_str())
        );
        self.skin = skin;
    }

    pub fn set_skin_by_name(&mut self, name: &str) -> Result<()> {
        let skin = self
            .data
            .find_skin(name)
            .cloned()
            .ok_or_else(|| Error::UnknownSkin {
                name: name.to_string(),
            })?;
        self.set_skin(Some(skin));
        Ok(())
    }

    /// Looks `name` up in the active skin, then in the default skin.
    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<Arc<Attachment>> {
        self.skin
            .as_ref()
            .and_then(|skin| skin.attachment(slot_index, name))
            .or_else(|| {
                self.data
                    .default_skin
                    .as_ref()
                    .and_then(|skin| skin.attachment(slot_index, name))
            })
            .cloned()
    }

    pub fn attachment_by_name(
        &self,
        slot_name: &str,
        attachment_name: &str,
    ) -> Option<Arc<Attachment>> {
        let slot_index = self.data.find_slot_index(slot_name)?;
        self.attachment(slot_index, attachment_name)
    }

    /// Sets or clears (`None`) the named slot's attachment.
    pub fn set_attachment(&mut self, slot_name: &str, attachment_name: Option<&str>) -> Result<()> {
        let slot_index = self
            .find_slot_index(slot_name)
            .ok_or_else(|| Error::UnknownSlot {
                name: slot_name.to_string(),
            })?;
        let attachment = match attachment_name {
            Some(name) => Some(self.attachment(slot_index, name).ok_or_else(|| {
                Error::UnknownAttachment {
                    slot: slot_name.to_string(),
                    attachment: name.to_string(),
                }
            })?),
            None => None,
        };
        self.set_slot_attachment(slot_index, attachment);
        Ok(())
    }

    /// Assigns `attachment` to the slot. Assigning the attachment the slot already shows keeps its
    /// attachment time.
    pub fn set_slot_attachment(&mut self, slot_index: usize, attachment: Option<Arc<Attachment>>) {
        let time = self.time;
        let Some(slot) = self.slots.get_mut(slot_index) else {
            return;
        };
        let unchanged = match (&slot.attachment, &attachment) {
            (Some(current), Some(next)) => Arc::ptr_eq(current, next),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        slot.attachment = attachment;
        slot.attachment_stamp = time;
    }

    /// Seconds since the slot's attachment last changed.
    pub fn slot_attachment_time(&self, slot_index: usize) -> f32 {
        self.slots
            .get(slot_index)
            .map_or(0.0, |slot| self.time - slot.attachment_stamp)
    }

    pub fn set_slot_attachment_time(&mut self, slot_index: usize, elapsed: f32) {
        let time = self.time;
        if let Some(slot) = self.slots.get_mut(slot_index) {
            slot.attachment_stamp = time - elapsed;
        }
    }

    pub fn root_bone(&self) -> Option<&Bone> {
        self.bones.first()
    }

    pub fn find_bone(&self, name: &str) -> Option<&Bone> {
        self.bones.get(self.find_bone_index(name)?)
    }

    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.data.find_bone_index(name)
    }

    pub fn find_slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(self.find_slot_index(name)?)
    }

    pub fn find_slot_index(&self, name: &str) -> Option<usize> {
        self.data.find_slot_index(name)
    }
}

struct ParentTransform {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    world_x: f32,
    world_y: f32,
    world_rotation: f32,
    world_scale_x: f32,
    world_scale_y: f32,
}

fn update_world_transform_root(bone: &mut Bone, x: f32, y: f32, flip_x: bool, flip_y: bool) {
    bone.world_x = if flip_x { -bone.x } else { bone.x } + x;
    bone.world_y = if flip_y { -bone.y } else { bone.y } + y;
    bone.world_scale_x = bone.scale_x;
    bone.world_scale_y = bone.scale_y;
    bone.world_rotation = bone.rotation;
    set_world_matrix(bone);
}

fn update_world_transform_child(bone: &mut Bone, data: &BoneData, parent: &ParentTransform) {
    bone.world_x = bone.x * parent.a + bone.y * parent.b + parent.world_x;
    bone.world_y = bone.x * parent.c + bone.y * parent.d + parent.world_y;
    if data.inherit_scale {
        bone.world_scale_x = parent.world_scale_x * bone.scale_x;
        bone.world_scale_y = parent.world_scale_y * bone.scale_y;
    } else {
        bone.world_scale_x = bone.scale_x;
        bone.world_scale_y = bone.scale_y;
    }
    bone.world_rotation = if data.inherit_rotation {
        parent.world_rotation + bone.rotation
    } else {
        bone.rotation
    };
    set_world_matrix(bone);
}

fn set_world_matrix(bone: &mut Bone) {
    let (sin, cos) = bone.world_rotation.to_radians().sin_cos();
    bone.a = cos * bone.world_scale_x;
    bone.c = sin * bone.world_scale_x;
    bone.b = -sin * bone.world_scale_y;
    bone.d = cos * bone.world_scale_y;
}
