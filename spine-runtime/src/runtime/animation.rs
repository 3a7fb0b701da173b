use crate::{
    Animation, AttachmentTimeline, ColorTimeline, Event, EventTimeline, RotateTimeline,
    ScaleTimeline, Skeleton, Timeline, TranslateTimeline,
};

/// Poses `skeleton` with `animation` at `time`, overwriting every keyed property relative to the
/// setup pose. Event timelines fire nothing.
pub fn apply_animation(animation: &Animation, skeleton: &mut Skeleton, time: f32, looped: bool) {
    apply_timelines(animation, skeleton, time, time, looped, 1.0, None);
}

/// Like [`apply_animation`], but moves each keyed property only `alpha` of the way from its
/// current value toward the animation's value.
pub fn mix_animation(
    animation: &Animation,
    skeleton: &mut Skeleton,
    time: f32,
    looped: bool,
    alpha: f32,
) {
    apply_timelines(animation, skeleton, time, time, looped, alpha, None);
}

/// Applies `animation` at `time` with `alpha` and appends the events keyed in `(last_time, time]`.
pub fn apply_animation_with_events(
    animation: &Animation,
    skeleton: &mut Skeleton,
    last_time: f32,
    time: f32,
    looped: bool,
    alpha: f32,
    events: &mut Vec<Event>,
) {
    apply_timelines(
        animation,
        skeleton,
        last_time,
        time,
        looped,
        alpha,
        Some(events),
    );
}

fn apply_timelines(
    animation: &Animation,
    skeleton: &mut Skeleton,
    last_time: f32,
    time: f32,
    looped: bool,
    alpha: f32,
    mut events: Option<&mut Vec<Event>>,
) {
    let mut time = time;
    let mut last_time = last_time;
    if looped && animation.duration != 0.0 {
        time %= animation.duration;
        // `-1` (never applied) must stay below the first frame.
        if last_time > 0.0 {
            last_time %= animation.duration;
        }
    }

    for timeline in &animation.timelines {
        match timeline {
            Timeline::Rotate(t) => apply_rotate(t, skeleton, time, alpha),
            Timeline::Translate(t) => apply_translate(t, skeleton, time, alpha),
            Timeline::Scale(t) => apply_scale(t, skeleton, time, alpha),
            Timeline::Color(t) => apply_color(t, skeleton, time, alpha),
            Timeline::Attachment(t) => apply_attachment(t, skeleton, time),
            Timeline::Event(t) => {
                if let Some(out) = events.as_deref_mut() {
                    collect_events(t, last_time, time, out);
                }
            }
        }
    }
}

/// Restores the setup value of every bone and slot property `animation` keys, attachments aside.
/// Mixing starts from here so the blend does not depend on what the previous apply left behind.
pub(crate) fn set_keyed_to_setup_pose(animation: &Animation, skeleton: &mut Skeleton) {
    let skeleton_data = skeleton.data.clone();
    for timeline in &animation.timelines {
        match timeline {
            Timeline::Rotate(t) => {
                if let (Some(bone), Some(data)) = (
                    skeleton.bones.get_mut(t.bone_index),
                    skeleton_data.bones.get(t.bone_index),
                ) {
                    bone.rotation = data.rotation;
                }
            }
            Timeline::Translate(t) => {
                if let (Some(bone), Some(data)) = (
                    skeleton.bones.get_mut(t.bone_index),
                    skeleton_data.bones.get(t.bone_index),
                ) {
                    bone.x = data.x;
                    bone.y = data.y;
                }
            }
            Timeline::Scale(t) => {
                if let (Some(bone), Some(data)) = (
                    skeleton.bones.get_mut(t.bone_index),
                    skeleton_data.bones.get(t.bone_index),
                ) {
                    bone.scale_x = data.scale_x;
                    bone.scale_y = data.scale_y;
                }
            }
            Timeline::Color(t) => {
                if let (Some(slot), Some(data)) = (
                    skeleton.slots.get_mut(t.slot_index),
                    skeleton_data.slots.get(t.slot_index),
                ) {
                    slot.color = data.color;
                }
            }
            Timeline::Attachment(_) | Timeline::Event(_) => {}
        }
    }
}

/// Index (in floats) of the first frame after the first whose time is greater than `target`,
/// or of the last frame when none is. `values` holds `step` floats per frame, at least two frames.
pub(crate) fn binary_search(values: &[f32], target: f32, step: usize) -> usize {
    let count = values.len() / step;
    if count < 2 {
        return step;
    }
    let mut low = 1;
    let mut high = count - 1;
    while low < high {
        let mid = (low + high) / 2;
        if values[mid * step] > target {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    low * step
}

/// Wraps an angle difference into (-180, 180].
pub(crate) fn wrap_degrees(degrees: f32) -> f32 {
    degrees - ((degrees / 360.0) - 0.5).ceil() * 360.0
}

fn segment_percent(time: f32, previous_time: f32, next_time: f32) -> f32 {
    (1.0 - (time - next_time) / (previous_time - next_time)).clamp(0.0, 1.0)
}

pub(crate) fn apply_rotate(
    timeline: &RotateTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
) {
    const ENTRIES: usize = RotateTimeline::ENTRIES;
    let frames = timeline.frames();
    if frames.is_empty() || time < frames[0] {
        return;
    }
    let Some(setup) = skeleton
        .data
        .bones
        .get(timeline.bone_index)
        .map(|b| b.rotation)
    else {
        return;
    };
    let Some(bone) = skeleton.bones.get_mut(timeline.bone_index) else {
        return;
    };

    let last = frames.len() - ENTRIES;
    if time >= frames[last] {
        let amount = wrap_degrees(setup + frames[last + 1] - bone.rotation);
        bone.rotation += amount * alpha;
        return;
    }

    let frame = binary_search(frames, time, ENTRIES);
    let previous_value = frames[frame - 1];
    let percent = segment_percent(time, frames[frame - ENTRIES], frames[frame]);
    let percent = timeline
        .curves()
        .curve_percent(frame / ENTRIES - 1, percent);

    let delta = wrap_degrees(frames[frame + 1] - previous_value);
    let amount = wrap_degrees(setup + (previous_value + delta * percent) - bone.rotation);
    bone.rotation += amount * alpha;
}

/// Samples a `[time, x, y]` timeline. `None` before the first frame.
fn sample_vec2(
    frames: &[f32],
    curves: &crate::CurveTimeline,
    time: f32,
) -> Option<(f32, f32)> {
    const ENTRIES: usize = 3;
    if frames.is_empty() || time < frames[0] {
        return None;
    }
    let last = frames.len() - ENTRIES;
    if time >= frames[last] {
        return Some((frames[last + 1], frames[last + 2]));
    }

    let frame = binary_search(frames, time, ENTRIES);
    let previous_x = frames[frame - 2];
    let previous_y = frames[frame - 1];
    let percent = segment_percent(time, frames[frame - ENTRIES], frames[frame]);
    let percent = curves.curve_percent(frame / ENTRIES - 1, percent);
    Some((
        previous_x + (frames[frame + 1] - previous_x) * percent,
        previous_y + (frames[frame + 2] - previous_y) * percent,
    ))
}

pub(crate) fn apply_translate(
    timeline: &TranslateTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
) {
    let Some((x, y)) = sample_vec2(timeline.frames(), timeline.curves(), time) else {
        return;
    };
    let Some((setup_x, setup_y)) = skeleton
        .data
        .bones
        .get(timeline.bone_index)
        .map(|b| (b.x, b.y))
    else {
        return;
    };
    let Some(bone) = skeleton.bones.get_mut(timeline.bone_index) else {
        return;
    };
    bone.x += (setup_x + x - bone.x) * alpha;
    bone.y += (setup_y + y - bone.y) * alpha;
}

pub(crate) fn apply_scale(timeline: &ScaleTimeline, skeleton: &mut Skeleton, time: f32, alpha: f32) {
    let Some((x, y)) = sample_vec2(timeline.frames(), timeline.curves(), time) else {
        return;
    };
    let Some((setup_x, setup_y)) = skeleton
        .data
        .bones
        .get(timeline.bone_index)
        .map(|b| (b.scale_x, b.scale_y))
    else {
        return;
    };
    let Some(bone) = skeleton.bones.get_mut(timeline.bone_index) else {
        return;
    };
    bone.scale_x += (setup_x - 1.0 + x - bone.scale_x) * alpha;
    bone.scale_y += (setup_y - 1.0 + y - bone.scale_y) * alpha;
}

fn sample_color(timeline: &ColorTimeline, time: f32) -> Option<[f32; 4]> {
    const ENTRIES: usize = ColorTimeline::ENTRIES;
    let frames = timeline.frames();
    if frames.is_empty() || time < frames[0] {
        return None;
    }
    let last = frames.len() - ENTRIES;
    if time >= frames[last] {
        return Some([
            frames[last + 1],
            frames[last + 2],
            frames[last + 3],
            frames[last + 4],
        ]);
    }

    let frame = binary_search(frames, time, ENTRIES);
    let percent = segment_percent(time, frames[frame - ENTRIES], frames[frame]);
    let percent = timeline
        .curves()
        .curve_percent(frame / ENTRIES - 1, percent);
    let mut color = [0.0; 4];
    for (channel, value) in color.iter_mut().enumerate() {
        let previous = frames[frame - ENTRIES + 1 + channel];
        *value = previous + (frames[frame + 1 + channel] - previous) * percent;
    }
    Some(color)
}

pub(crate) fn apply_color(timeline: &ColorTimeline, skeleton: &mut Skeleton, time: f32, alpha: f32) {
    let Some(target) = sample_color(timeline, time) else {
        return;
    };
    let Some(slot) = skeleton.slots.get_mut(timeline.slot_index) else {
        return;
    };
    if alpha < 1.0 {
        for (current, target) in slot.color.iter_mut().zip(target) {
            *current += (target - *current) * alpha;
        }
    } else {
        slot.color = target;
    }
}

/// Step timeline: the active frame's attachment is resolved through the skeleton's skins. A name
/// that resolves to nothing clears the slot.
pub(crate) fn apply_attachment(timeline: &AttachmentTimeline, skeleton: &mut Skeleton, time: f32) {
    let frames = timeline.frames();
    if frames.is_empty() || time < frames[0] {
        return;
    }
    let last = frames.len() - 1;
    let frame_index = if time >= frames[last] {
        last
    } else {
        binary_search(frames, time, 1) - 1
    };

    let attachment = match timeline
        .attachment_names()
        .get(frame_index)
        .and_then(|name| name.as_deref())
    {
        Some(name) => {
            let attachment = skeleton.attachment(timeline.slot_index, name);
            if attachment.is_none() {
                log::trace!(
                    "attachment '{name}' not found for slot {}",
                    timeline.slot_index
                );
            }
            attachment
        }
        None => None,
    };
    skeleton.set_slot_attachment(timeline.slot_index, attachment);
}

/// Appends the events in `(last_time, time]`. When `last_time > time` the range wrapped around a
/// loop: events after `last_time` fire first, then events from the start through `time`.
/// A `last_time` below the first frame includes the first frame.
pub(crate) fn collect_events(
    timeline: &EventTimeline,
    last_time: f32,
    time: f32,
    out: &mut Vec<Event>,
) {
    let frames = timeline.frames();
    if frames.is_empty() {
        return;
    }

    let mut last_time = last_time;
    if last_time > time {
        collect_events(timeline, last_time, f32::MAX, out);
        last_time = -1.0;
    } else if last_time >= frames[frames.len() - 1] {
        return;
    }
    if time < frames[0] {
        return;
    }

    let start = if last_time < frames[0] {
        0
    } else {
        frames.partition_point(|&frame_time| frame_time <= last_time)
    };
    let events = timeline.events();
    for index in start..frames.len() {
        if time < frames[index] {
            break;
        }
        if let Some(event) = events.get(index) {
            out.push(event.clone());
        }
    }
}
