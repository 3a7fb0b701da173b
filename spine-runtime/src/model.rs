use crate::{Curve, CurveTimeline, Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneData {
    pub name: String,
    pub parent: Option<usize>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub inherit_rotation: bool,
    pub inherit_scale: bool,
}

impl BoneData {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            length: 0.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            inherit_rotation: true,
            inherit_scale: true,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    pub color: [f32; 4],
    /// Setup-pose attachment, resolved through the skeleton's skins.
    pub attachment: Option<String>,
    pub additive_blending: bool,
}

impl SlotData {
    pub fn new(name: impl Into<String>, bone: usize) -> Self {
        Self {
            name: name.into(),
            bone,
            color: [1.0, 1.0, 1.0, 1.0],
            attachment: None,
            additive_blending: false,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionAttachment {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
}

impl RegionAttachment {
    pub fn new(name: impl Into<String>, width: f32, height: f32) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            color: [1.0, 1.0, 1.0, 1.0],
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width,
            height,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshAttachment {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    /// Bone-local `[x, y]` pairs.
    pub vertices: Vec<f32>,
    pub uvs: Vec<f32>,
    pub triangles: Vec<u16>,
    pub hull_length: usize,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBoxAttachment {
    pub name: String,
    pub vertices: Vec<f32>,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathAttachment {
    pub name: String,
    pub vertices: Vec<f32>,
    pub lengths: Vec<f32>,
    pub closed: bool,
    pub constant_speed: bool,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PointAttachment {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClippingAttachment {
    pub name: String,
    pub vertices: Vec<f32>,
    pub end_slot: Option<usize>,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    BoundingBox(BoundingBoxAttachment),
    Path(PathAttachment),
    Point(PointAttachment),
    Clipping(ClippingAttachment),
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Attachment::Region(a) => a.name.as_str(),
            Attachment::Mesh(a) => a.name.as_str(),
            Attachment::BoundingBox(a) => a.name.as_str(),
            Attachment::Path(a) => a.name.as_str(),
            Attachment::Point(a) => a.name.as_str(),
            Attachment::Clipping(a) => a.name.as_str(),
        }
    }
}

/// Attachments keyed by slot index and attachment name.
///
/// Entries are shared through `Arc` so skins built by copying other skins (see [`Skin::add_skin`])
/// hand out the same attachment instances as the skins they were built from.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Skin {
    pub name: String,
    attachments: Vec<HashMap<String, Arc<Attachment>>>,
}

impl Skin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attachments: Vec::new(),
        }
    }

    pub fn set_attachment(
        &mut self,
        slot_index: usize,
        name: impl Into<String>,
        attachment: Attachment,
    ) {
        self.set_shared_attachment(slot_index, name, Arc::new(attachment));
    }

    pub fn set_shared_attachment(
        &mut self,
        slot_index: usize,
        name: impl Into<String>,
        attachment: Arc<Attachment>,
    ) {
        if self.attachments.len() <= slot_index {
            self.attachments.resize_with(slot_index + 1, HashMap::new);
        }
        self.attachments[slot_index].insert(name.into(), attachment);
    }

    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<&Arc<Attachment>> {
        self.attachments
            .get(slot_index)
            .and_then(|slot_map| slot_map.get(name))
    }

    pub fn remove_attachment(&mut self, slot_index: usize, name: &str) -> Option<Arc<Attachment>> {
        self.attachments
            .get_mut(slot_index)
            .and_then(|slot_map| slot_map.remove(name))
    }

    /// Copies every entry of `other` into this skin, replacing entries with the same key.
    pub fn add_skin(&mut self, other: &Skin) {
        for (slot_index, name, attachment) in other.attachments() {
            self.set_shared_attachment(slot_index, name, attachment.clone());
        }
    }

    /// All `(slot index, attachment name, attachment)` entries. Order within a slot is unspecified.
    pub fn attachments(&self) -> impl Iterator<Item = (usize, &str, &Arc<Attachment>)> + '_ {
        self.attachments
            .iter()
            .enumerate()
            .flat_map(|(slot_index, slot_map)| {
                slot_map
                    .iter()
                    .map(move |(name, attachment)| (slot_index, name.as_str(), attachment))
            })
    }

    pub fn len(&self) -> usize {
        self.attachments.iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventData {
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
}

impl EventData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// One occurrence of an event on an event timeline.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    pub time: f32,
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
}

impl Event {
    pub fn new(time: f32, data: &EventData) -> Self {
        Self {
            time,
            name: data.name.clone(),
            int_value: data.int_value,
            float_value: data.float_value,
            string: data.string.clone(),
        }
    }
}

/// Flat `[time, value...]` keyframes plus one curve per segment.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct Keyframes {
    entries: usize,
    frames: Vec<f32>,
    curves: CurveTimeline,
}

impl Keyframes {
    fn new(entries: usize, frame_count: usize) -> Self {
        Self {
            entries,
            frames: vec![0.0; frame_count * entries],
            curves: CurveTimeline::new(frame_count),
        }
    }

    fn frame_count(&self) -> usize {
        self.frames.len() / self.entries
    }

    fn set(&mut self, frame_index: usize, values: &[f32]) {
        let start = frame_index * self.entries;
        if let Some(frame) = self.frames.get_mut(start..start + self.entries) {
            frame.copy_from_slice(values);
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RotateTimeline {
    pub bone_index: usize,
    keyframes: Keyframes,
}

impl RotateTimeline {
    /// Floats per frame: time, angle.
    pub const ENTRIES: usize = 2;

    pub fn new(bone_index: usize, frame_count: usize) -> Self {
        Self {
            bone_index,
            keyframes: Keyframes::new(Self::ENTRIES, frame_count),
        }
    }

    pub fn set_frame(&mut self, frame_index: usize, time: f32, degrees: f32) {
        self.keyframes.set(frame_index, &[time, degrees]);
    }

    pub fn frame_count(&self) -> usize {
        self.keyframes.frame_count()
    }

    /// Flat `[time, angle]` frames.
    pub fn frames(&self) -> &[f32] {
        &self.keyframes.frames
    }

    pub fn curves(&self) -> &CurveTimeline {
        &self.keyframes.curves
    }

    pub fn curves_mut(&mut self) -> &mut CurveTimeline {
        &mut self.keyframes.curves
    }

    pub fn set_curve(&mut self, frame_index: usize, curve: Curve) {
        self.keyframes.curves.set_curve(frame_index, curve);
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TranslateTimeline {
    pub bone_index: usize,
    keyframes: Keyframes,
}

impl TranslateTimeline {
    /// Floats per frame: time, x, y.
    pub const ENTRIES: usize = 3;

    pub fn new(bone_index: usize, frame_count: usize) -> Self {
        Self {
            bone_index,
            keyframes: Keyframes::new(Self::ENTRIES, frame_count),
        }
    }

    pub fn set_frame(&mut self, frame_index: usize, time: f32, x: f32, y: f32) {
        self.keyframes.set(frame_index, &[time, x, y]);
    }

    pub fn frame_count(&self) -> usize {
        self.keyframes.frame_count()
    }

    pub fn frames(&self) -> &[f32] {
        &self.keyframes.frames
    }

    pub fn curves(&self) -> &CurveTimeline {
        &self.keyframes.curves
    }

    pub fn curves_mut(&mut self) -> &mut CurveTimeline {
        &mut self.keyframes.curves
    }

    pub fn set_curve(&mut self, frame_index: usize, curve: Curve) {
        self.keyframes.curves.set_curve(frame_index, curve);
    }
}

/// Keyed values are added to `setup - 1`, so a keyed scale of 1 leaves the setup scale unchanged.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScaleTimeline {
    pub bone_index: usize,
    keyframes: Keyframes,
}

impl ScaleTimeline {
    /// Floats per frame: time, scale x, scale y.
    pub const ENTRIES: usize = 3;

    pub fn new(bone_index: usize, frame_count: usize) -> Self {
        Self {
            bone_index,
            keyframes: Keyframes::new(Self::ENTRIES, frame_count),
        }
    }

    pub fn set_frame(&mut self, frame_index: usize, time: f32, scale_x: f32, scale_y: f32) {
        self.keyframes.set(frame_index, &[time, scale_x, scale_y]);
    }

    pub fn frame_count(&self) -> usize {
        self.keyframes.frame_count()
    }

    pub fn frames(&self) -> &[f32] {
        &self.keyframes.frames
    }

    pub fn curves(&self) -> &CurveTimeline {
        &self.keyframes.curves
    }

    pub fn curves_mut(&mut self) -> &mut CurveTimeline {
        &mut self.keyframes.curves
    }

    pub fn set_curve(&mut self, frame_index: usize, curve: Curve) {
        self.keyframes.curves.set_curve(frame_index, curve);
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorTimeline {
    pub slot_index: usize,
    keyframes: Keyframes,
}

impl ColorTimeline {
    /// Floats per frame: time, r, g, b, a.
    pub const ENTRIES: usize = 5;

    pub fn new(slot_index: usize, frame_count: usize) -> Self {
        Self {
            slot_index,
            keyframes: Keyframes::new(Self::ENTRIES, frame_count),
        }
    }

    pub fn set_frame(&mut self, frame_index: usize, time: f32, color: [f32; 4]) {
        let [r, g, b, a] = color;
        self.keyframes.set(frame_index, &[time, r, g, b, a]);
    }

    pub fn frame_count(&self) -> usize {
        self.keyframes.frame_count()
    }

    /// Flat `[time, r, g, b, a]` frames.
    pub fn frames(&self) -> &[f32] {
        &self.keyframes.frames
    }

    pub fn curves(&self) -> &CurveTimeline {
        &self.keyframes.curves
    }

    pub fn curves_mut(&mut self) -> &mut CurveTimeline {
        &mut self.keyframes.curves
    }

    pub fn set_curve(&mut self, frame_index: usize, curve: Curve) {
        self.keyframes.curves.set_curve(frame_index, curve);
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttachmentTimeline {
    pub slot_index: usize,
    frames: Vec<f32>,
    attachment_names: Vec<Option<String>>,
}

impl AttachmentTimeline {
    pub fn new(slot_index: usize, frame_count: usize) -> Self {
        Self {
            slot_index,
            frames: vec![0.0; frame_count],
            attachment_names: vec![None; frame_count],
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn attachment_names(&self) -> &[Option<String>] {
        &self.attachment_names
    }

    /// A `None` name clears the slot's attachment from this frame on.
    pub fn set_frame(&mut self, frame_index: usize, time: f32, attachment_name: Option<&str>) {
        if frame_index >= self.frames.len() {
            return;
        }
        self.frames[frame_index] = time;
        self.attachment_names[frame_index] = attachment_name.map(str::to_string);
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventTimeline {
    frames: Vec<f32>,
    events: Vec<Event>,
}

impl EventTimeline {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: vec![0.0; frame_count],
            events: vec![Event::default(); frame_count],
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Stores `event` at `event.time`.
    pub fn set_frame(&mut self, frame_index: usize, event: Event) {
        if frame_index >= self.frames.len() {
            return;
        }
        self.frames[frame_index] = event.time;
        self.events[frame_index] = event;
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Timeline {
    Rotate(RotateTimeline),
    Translate(TranslateTimeline),
    Scale(ScaleTimeline),
    Color(ColorTimeline),
    Attachment(AttachmentTimeline),
    Event(EventTimeline),
}

impl Timeline {
    pub fn frame_count(&self) -> usize {
        match self {
            Timeline::Rotate(t) => t.frame_count(),
            Timeline::Translate(t) => t.frame_count(),
            Timeline::Scale(t) => t.frame_count(),
            Timeline::Color(t) => t.frame_count(),
            Timeline::Attachment(t) => t.frame_count(),
            Timeline::Event(t) => t.frame_count(),
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Animation {
    pub name: String,
    pub duration: f32,
    pub timelines: Vec<Timeline>,
}

impl Animation {
    pub fn new(name: impl Into<String>, timelines: Vec<Timeline>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration,
            timelines,
        }
    }
}

/// Immutable skeleton definition, shared by every [`crate::Skeleton`] built from it.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkeletonData {
    pub name: Option<String>,
    /// Parents before children.
    pub bones: Vec<BoneData>,
    /// Setup draw order.
    pub slots: Vec<SlotData>,
    pub skins: Vec<Arc<Skin>>,
    /// Always consulted after the skeleton's active skin.
    pub default_skin: Option<Arc<Skin>>,
    pub events: Vec<EventData>,
    pub animations: Vec<Animation>,
}

impl SkeletonData {
    pub fn find_bone(&self, name: &str) -> Option<&BoneData> {
        self.bones.iter().find(|bone| bone.name == name)
    }

    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    pub fn find_slot(&self, name: &str) -> Option<&SlotData> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    pub fn find_slot_index(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.name == name)
    }

    pub fn find_skin(&self, name: &str) -> Option<&Arc<Skin>> {
        self.skins
            .iter()
            .find(|skin| skin.name == name)
            .or_else(|| self.default_skin.as_ref().filter(|skin| skin.name == name))
    }

    pub fn find_event(&self, name: &str) -> Option<&EventData> {
        self.events.iter().find(|event| event.name == name)
    }

    pub fn find_animation(&self, name: &str) -> Option<&Animation> {
        self.animations
            .iter()
            .find(|animation| animation.name == name)
    }

    pub fn find_animation_index(&self, name: &str) -> Option<usize> {
        self.animations
            .iter()
            .position(|animation| animation.name == name)
    }

    /// Checks the structural invariants the runtime relies on: every bone's parent precedes it,
    /// every slot points at an existing bone, and every timeline targets an existing bone or slot.
    pub fn validate(&self) -> Result<()> {
        for (index, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent.filter(|&parent| parent >= index) {
                return Err(Error::InvalidData {
                    message: format!(
                        "bone '{}' (index {index}) has parent index {parent}, parents must come first",
                        bone.name
                    ),
                });
            }
        }
        for slot in &self.slots {
            if slot.bone >= self.bones.len() {
                return Err(Error::InvalidData {
                    message: format!("slot '{}' references missing bone {}", slot.name, slot.bone),
                });
            }
        }
        for animation in &self.animations {
            for timeline in &animation.timelines {
                let (kind, target, len) = match timeline {
                    Timeline::Rotate(t) => ("bone", t.bone_index, self.bones.len()),
                    Timeline::Translate(t) => ("bone", t.bone_index, self.bones.len()),
                    Timeline::Scale(t) => ("bone", t.bone_index, self.bones.len()),
                    Timeline::Color(t) => ("slot", t.slot_index, self.slots.len()),
                    Timeline::Attachment(t) => ("slot", t.slot_index, self.slots.len()),
                    Timeline::Event(_) => continue,
                };
                if target >= len {
                    return Err(Error::InvalidData {
                        message: format!(
                            "animation '{}' targets missing {kind} {target}",
                            animation.name
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}
