use super::animation::set_keyed_to_setup_pose;
use crate::{
    Error, Event, Result, Skeleton, SkeletonData, apply_animation, apply_animation_with_events,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct EntryId {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct EntrySlot {
    generation: u32,
    entry: Option<TrackEntry>,
}

/// Crossfade durations between pairs of animations.
#[derive(Clone, Debug)]
pub struct AnimationStateData {
    pub skeleton_data: Arc<SkeletonData>,
    default_mix: f32,
    mixes: HashMap<(usize, usize), f32>,
}

impl AnimationStateData {
    pub fn new(skeleton_data: Arc<SkeletonData>) -> Self {
        Self {
            skeleton_data,
            default_mix: 0.0,
            mixes: HashMap::new(),
        }
    }

    pub fn default_mix(&self) -> f32 {
        self.default_mix
    }

    /// Mix duration used for pairs without an explicit entry.
    pub fn set_default_mix(&mut self, duration: f32) -> Result<()> {
        check_mix_duration(duration)?;
        self.default_mix = duration;
        Ok(())
    }

    pub fn set_mix(&mut self, from: &str, to: &str, duration: f32) -> Result<()> {
        check_mix_duration(duration)?;
        let from_index = self.animation_index(from)?;
        let to_index = self.animation_index(to)?;
        log::trace!("mix {from} -> {to}: {duration}s");
        self.mixes.insert((from_index, to_index), duration);
        Ok(())
    }

    pub fn set_mix_by_index(&mut self, from: usize, to: usize, duration: f32) -> Result<()> {
        check_mix_duration(duration)?;
        for index in [from, to] {
            if index >= self.skeleton_data.animations.len() {
                return Err(Error::UnknownAnimationIndex { index });
            }
        }
        self.mixes.insert((from, to), duration);
        Ok(())
    }

    /// Mix duration between two named animations, `None` when either name is unknown.
    pub fn mix(&self, from: &str, to: &str) -> Option<f32> {
        let from_index = self.skeleton_data.find_animation_index(from)?;
        let to_index = self.skeleton_data.find_animation_index(to)?;
        Some(self.mix_duration(from_index, to_index))
    }

    pub fn mix_duration(&self, from_index: usize, to_index: usize) -> f32 {
        self.mixes
            .get(&(from_index, to_index))
            .copied()
            .unwrap_or(self.default_mix)
    }

    fn animation_index(&self, name: &str) -> Result<usize> {
        self.skeleton_data
            .find_animation_index(name)
            .ok_or_else(|| Error::UnknownAnimation {
                name: name.to_string(),
            })
    }
}

fn check_mix_duration(duration: f32) -> Result<()> {
    if !duration.is_finite() || duration < 0.0 {
        return Err(Error::InvalidValue {
            message: "mix duration must be finite and >= 0".to_string(),
        });
    }
    Ok(())
}

/// One playback of an animation on a track.
pub struct TrackEntry {
    pub track_index: usize,
    pub animation_index: usize,
    pub looped: bool,
    /// Seconds to wait before this entry starts. Queued entries become current once the previous
    /// entry's time reaches it.
    pub delay: f32,
    pub time: f32,
    /// Time at the previous apply, `-1` before the first one.
    pub last_time: f32,
    /// Non-looping entries clamp their time here and end once they have been applied past it.
    pub end_time: f32,
    pub time_scale: f32,
    pub mix_time: f32,
    pub mix_duration: f32,
    previous: Option<EntryId>,
    listener: Option<Box<dyn TrackEntryListener>>,
}

impl std::fmt::Debug for TrackEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackEntry")
            .field("track_index", &self.track_index)
            .field("animation_index", &self.animation_index)
            .field("looped", &self.looped)
            .field("delay", &self.delay)
            .field("time", &self.time)
            .field("last_time", &self.last_time)
            .field("end_time", &self.end_time)
            .field("time_scale", &self.time_scale)
            .field("mix_time", &self.mix_time)
            .field("mix_duration", &self.mix_duration)
            .field("previous", &self.previous)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl TrackEntry {
    fn new(track_index: usize, animation_index: usize, duration: f32, looped: bool) -> Self {
        Self {
            track_index,
            animation_index,
            looped,
            delay: 0.0,
            time: 0.0,
            last_time: -1.0,
            end_time: duration,
            time_scale: 1.0,
            mix_time: 0.0,
            mix_duration: 0.0,
            previous: None,
            listener: None,
        }
    }

    /// Whether a previous entry is still being mixed out underneath this one.
    pub fn is_mixing(&self) -> bool {
        self.previous.is_some()
    }

    /// Blend weight of this entry over the one it is mixing from.
    pub fn mix_alpha(&self) -> f32 {
        if self.mix_duration > 0.0 {
            (self.mix_time / self.mix_duration).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    fn applied_time(&self) -> f32 {
        if !self.looped && self.time > self.end_time {
            self.end_time
        } else {
            self.time
        }
    }
}

/// Stable reference to a track entry. Goes stale (every call becomes a no-op) once the entry is
/// disposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackEntryHandle {
    id: EntryId,
}

impl TrackEntryHandle {
    fn with_entry_mut(&self, state: &mut AnimationState, f: impl FnOnce(&mut TrackEntry)) {
        if let Some(entry) = state.entry_mut(self.id) {
            f(entry);
        }
    }

    pub fn is_valid(&self, state: &AnimationState) -> bool {
        state.entry(self.id).is_some()
    }

    pub fn set_listener<L: TrackEntryListener + 'static>(
        &self,
        state: &mut AnimationState,
        listener: L,
    ) {
        self.with_entry_mut(state, |entry| {
            entry.listener = Some(Box::new(listener));
        });
    }

    pub fn set_loop(&self, state: &mut AnimationState, looped: bool) {
        self.with_entry_mut(state, |entry| {
            entry.looped = looped;
        });
    }

    pub fn set_delay(&self, state: &mut AnimationState, delay: f32) {
        self.with_entry_mut(state, |entry| {
            entry.delay = delay;
        });
    }

    pub fn set_time(&self, state: &mut AnimationState, time: f32) {
        self.with_entry_mut(state, |entry| {
            entry.time = time;
        });
    }

    pub fn set_end_time(&self, state: &mut AnimationState, end_time: f32) {
        self.with_entry_mut(state, |entry| {
            entry.end_time = end_time;
        });
    }

    pub fn set_time_scale(&self, state: &mut AnimationState, time_scale: f32) {
        self.with_entry_mut(state, |entry| {
            entry.time_scale = time_scale;
        });
    }
}

/// What a listener sees of the entry an event belongs to.
#[derive(Clone, Debug)]
pub struct TrackEntrySnapshot {
    pub track_index: usize,
    pub animation_index: usize,
    pub animation_name: String,
    pub time: f32,
    pub looped: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnimationStateEvent {
    Start,
    Interrupt,
    End,
    /// Last event of an entry; its handle is stale afterwards.
    Dispose,
    Complete { loop_count: u32 },
    Event(Event),
}

pub trait TrackEntryListener {
    fn on_event(
        &mut self,
        state: &mut AnimationState,
        entry: &TrackEntrySnapshot,
        event: &AnimationStateEvent,
    );
}

pub trait AnimationStateListener {
    fn on_event(
        &mut self,
        state: &mut AnimationState,
        entry: &TrackEntrySnapshot,
        event: &AnimationStateEvent,
    );
}

#[derive(Clone, Debug)]
struct QueuedEvent {
    entry: EntryId,
    event: AnimationStateEvent,
}

#[derive(Default)]
struct Track {
    current: Option<EntryId>,
    queue: VecDeque<EntryId>,
}

/// Plays animations on numbered tracks, crossfading between consecutive animations on a track.
///
/// Call [`AnimationState::update`] then [`AnimationState::apply`] once per frame, then
/// [`Skeleton::update_world_transform`]. Lifecycle events are delivered to listeners at the end of
/// every public call, in the order they happened.
pub struct AnimationState {
    data: AnimationStateData,
    tracks: Vec<Track>,
    entries: Vec<EntrySlot>,
    free_list: Vec<usize>,
    event_queue: VecDeque<QueuedEvent>,
    listener: Option<Box<dyn AnimationStateListener>>,
    draining_events: bool,
    time_scale: f32,
}

impl AnimationState {
    pub fn new(data: AnimationStateData) -> Self {
        Self {
            data,
            tracks: Vec::new(),
            entries: Vec::new(),
            free_list: Vec::new(),
            event_queue: VecDeque::new(),
            listener: None,
            draining_events: false,
            time_scale: 1.0,
        }
    }

    pub fn set_listener<L: AnimationStateListener + 'static>(&mut self, listener: L) {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    pub fn data(&self) -> &AnimationStateData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut AnimationStateData {
        &mut self.data
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.time_scale = time_scale;
    }

    pub fn tracks_len(&self) -> usize {
        self.tracks.len()
    }

    pub fn current(&self, track_index: usize) -> Option<TrackEntryHandle> {
        let id = self.tracks.get(track_index)?.current?;
        Some(TrackEntryHandle { id })
    }

    pub fn track_entry(&self, handle: TrackEntryHandle) -> Option<&TrackEntry> {
        self.entry(handle.id)
    }

    pub fn with_track_entry<F: FnOnce(&TrackEntry) -> R, R>(
        &self,
        track_index: usize,
        f: F,
    ) -> Option<R> {
        let id = self.tracks.get(track_index)?.current?;
        let entry = self.entry(id)?;
        Some(f(entry))
    }

    /// Number of entries waiting behind the current one.
    pub fn queue_len(&self, track_index: usize) -> usize {
        self.tracks
            .get(track_index)
            .map_or(0, |track| track.queue.len())
    }

    /// Replaces the track's current animation right away, discarding anything queued. The old
    /// animation is mixed out when a mix duration is configured for the pair.
    pub fn set_animation(
        &mut self,
        track_index: usize,
        animation_name: &str,
        looped: bool,
    ) -> Result<TrackEntryHandle> {
        let animation_index = self.find_animation_index(animation_name)?;
        self.set_animation_by_index(track_index, animation_index, looped)
    }

    pub fn set_animation_by_index(
        &mut self,
        track_index: usize,
        animation_index: usize,
        looped: bool,
    ) -> Result<TrackEntryHandle> {
        let duration = self.animation_duration(animation_index)?;
        self.ensure_track(track_index);
        let queued: Vec<EntryId> = self.tracks[track_index].queue.drain(..).collect();
        for id in queued {
            push_event(&mut self.event_queue, id, AnimationStateEvent::Dispose);
        }

        let id = self.alloc_entry(TrackEntry::new(
            track_index,
            animation_index,
            duration,
            looped,
        ));
        self.set_current(track_index, id);
        self.drain_event_queue();
        Ok(TrackEntryHandle { id })
    }

    /// Queues an animation to play after the track's last entry.
    ///
    /// A `delay <= 0` is relative to the predecessor's end: the entry starts `mix` seconds before
    /// the predecessor ends (plus `delay`), so the crossfade completes as the predecessor finishes.
    /// On an empty track the entry starts immediately, after `delay` seconds when positive.
    pub fn add_animation(
        &mut self,
        track_index: usize,
        animation_name: &str,
        looped: bool,
        delay: f32,
    ) -> Result<TrackEntryHandle> {
        let animation_index = self.find_animation_index(animation_name)?;
        self.add_animation_by_index(track_index, animation_index, looped, delay)
    }

    pub fn add_animation_by_index(
        &mut self,
        track_index: usize,
        animation_index: usize,
        looped: bool,
        delay: f32,
    ) -> Result<TrackEntryHandle> {
        if !delay.is_finite() {
            return Err(Error::InvalidValue {
                message: "delay must be finite".to_string(),
            });
        }
        let duration = self.animation_duration(animation_index)?;
        self.ensure_track(track_index);

        let track = &self.tracks[track_index];
        let predecessor = track.queue.back().copied().or(track.current);
        let predecessor = predecessor.and_then(|id| {
            self.entry(id)
                .map(|entry| (entry.animation_index, entry.end_time))
        });

        let mut entry = TrackEntry::new(track_index, animation_index, duration, looped);
        let id = match predecessor {
            None => {
                entry.delay = delay.max(0.0);
                let id = self.alloc_entry(entry);
                self.set_current(track_index, id);
                id
            }
            Some((predecessor_index, predecessor_end)) => {
                entry.delay = if delay <= 0.0 {
                    let mix = self.data.mix_duration(predecessor_index, animation_index);
                    (delay + predecessor_end - mix).max(0.0)
                } else {
                    delay
                };
                log::trace!(
                    "track {track_index}: queued animation {animation_index} with delay {}",
                    entry.delay
                );
                let id = self.alloc_entry(entry);
                self.tracks[track_index].queue.push_back(id);
                id
            }
        };
        self.drain_event_queue();
        Ok(TrackEntryHandle { id })
    }

    /// Advances every track by `delta` seconds (scaled by the state's and each entry's time
    /// scale) and promotes queued entries whose delay has been reached.
    pub fn update(&mut self, delta: f32) {
        if !delta.is_finite() || delta < 0.0 {
            log::warn!("ignoring invalid animation state delta: {delta}");
            return;
        }
        let delta = delta * self.time_scale;

        for track_index in 0..self.tracks.len() {
            let Some(current_id) = self.tracks[track_index].current else {
                continue;
            };
            let Some(current) = self.entry_mut(current_id) else {
                self.tracks[track_index].current = None;
                continue;
            };

            let mut track_delta = delta * current.time_scale;
            if current.delay > 0.0 {
                current.delay -= track_delta;
                if current.delay > 0.0 {
                    continue;
                }
                track_delta = -current.delay;
                current.delay = 0.0;
            }

            current.time += track_delta;
            let previous = current.previous;
            if previous.is_some() {
                current.mix_time += track_delta;
            }
            let time = current.time;
            let finished = !current.looped && current.last_time >= current.end_time;

            // The mix runs on the current entry's clock, the mixed-out entry keeps its own.
            if let Some(previous) = previous.and_then(|id| self.entry_mut(id)) {
                previous.time += delta * previous.time_scale;
            }

            let next = self.tracks[track_index].queue.front().copied();
            match next {
                Some(next_id) => {
                    let next_delay = self.entry(next_id).map_or(0.0, |entry| entry.delay);
                    if time >= next_delay {
                        self.tracks[track_index].queue.pop_front();
                        if let Some(next) = self.entry_mut(next_id) {
                            next.delay = 0.0;
                        }
                        self.set_current(track_index, next_id);
                    }
                }
                None if finished => self.clear_track_internal(track_index),
                None => {}
            }
        }

        self.drain_event_queue();
    }

    /// Poses `skeleton` with every track's current animation, mixed over its previous one.
    ///
    /// While mixing, the properties the current animation keys are reset to the setup pose first,
    /// so applying again without an `update` gives the same pose.
    pub fn apply(&mut self, skeleton: &mut Skeleton) {
        let skeleton_data = self.data.skeleton_data.clone();
        let mut fired = Vec::new();

        for track_index in 0..self.tracks.len() {
            let Some(current_id) = self.tracks[track_index].current else {
                continue;
            };
            let Some(current) = self.entry(current_id) else {
                continue;
            };
            if current.delay > 0.0 {
                continue;
            }
            let Some(animation) = skeleton_data.animations.get(current.animation_index) else {
                continue;
            };

            let looped = current.looped;
            let last_time = current.last_time;
            let end_time = current.end_time;
            let time = current.applied_time();
            let alpha = current.mix_alpha();
            let previous = current.previous.and_then(|id| {
                self.entry(id)
                    .map(|entry| (id, entry.animation_index, entry.applied_time(), entry.looped))
            });

            fired.clear();
            match previous {
                Some((previous_id, previous_index, previous_time, previous_looped)) => {
                    set_keyed_to_setup_pose(animation, skeleton);
                    if let Some(previous_animation) = skeleton_data.animations.get(previous_index) {
                        apply_animation(previous_animation, skeleton, previous_time, previous_looped);
                    }
                    apply_animation_with_events(
                        animation, skeleton, last_time, time, looped, alpha, &mut fired,
                    );
                    if alpha >= 1.0 {
                        if let Some(current) = self.entry_mut(current_id) {
                            current.previous = None;
                        }
                        log::debug!("track {track_index}: mix finished");
                        push_event(&mut self.event_queue, previous_id, AnimationStateEvent::End);
                        push_event(&mut self.event_queue, previous_id, AnimationStateEvent::Dispose);
                    }
                }
                None => apply_animation_with_events(
                    animation, skeleton, last_time, time, looped, 1.0, &mut fired,
                ),
            }

            self.queue_applied_events(current_id, &fired, last_time, time, end_time, looped);
            if let Some(current) = self.entry_mut(current_id) {
                current.last_time = current.time;
            }
        }

        self.drain_event_queue();
    }

    pub fn clear_track(&mut self, track_index: usize) {
        self.clear_track_internal(track_index);
        self.drain_event_queue();
    }

    pub fn clear_tracks(&mut self) {
        for track_index in 0..self.tracks.len() {
            self.clear_track_internal(track_index);
        }
        self.tracks.clear();
        self.drain_event_queue();
    }

    fn find_animation_index(&self, name: &str) -> Result<usize> {
        self.data
            .skeleton_data
            .find_animation_index(name)
            .ok_or_else(|| Error::UnknownAnimation {
                name: name.to_string(),
            })
    }

    fn animation_duration(&self, animation_index: usize) -> Result<f32> {
        self.data
            .skeleton_data
            .animations
            .get(animation_index)
            .map(|animation| animation.duration)
            .ok_or(Error::UnknownAnimationIndex {
                index: animation_index,
            })
    }

    /// Makes `id` the track's current entry. The old current entry becomes the one mixed from
    /// when the pair has a mix duration, otherwise it ends right away. Whatever the old entry was
    /// itself mixing from is ended first: only one level mixes.
    fn set_current(&mut self, track_index: usize, id: EntryId) {
        self.ensure_track(track_index);
        let old = self.tracks[track_index].current.take();

        if let Some(old_id) = old {
            if let Some(stale) = self.entry_mut(old_id).and_then(|entry| entry.previous.take()) {
                push_event(&mut self.event_queue, stale, AnimationStateEvent::End);
                push_event(&mut self.event_queue, stale, AnimationStateEvent::Dispose);
            }

            let from_index = self.entry(old_id).map(|entry| entry.animation_index);
            let to_index = self.entry(id).map(|entry| entry.animation_index);
            let mix_duration = match (from_index, to_index) {
                (Some(from), Some(to)) => self.data.mix_duration(from, to),
                _ => 0.0,
            };
            log::debug!(
                "track {track_index}: {from_index:?} -> {to_index:?} (mix {mix_duration}s)"
            );

            push_event(&mut self.event_queue, old_id, AnimationStateEvent::Interrupt);
            if mix_duration > 0.0 {
                if let Some(entry) = self.entry_mut(id) {
                    entry.previous = Some(old_id);
                    entry.mix_time = 0.0;
                    entry.mix_duration = mix_duration;
                }
            } else {
                if let Some(entry) = self.entry_mut(id) {
                    entry.previous = None;
                    entry.mix_duration = 0.0;
                }
                push_event(&mut self.event_queue, old_id, AnimationStateEvent::End);
                push_event(&mut self.event_queue, old_id, AnimationStateEvent::Dispose);
            }
        } else {
            log::debug!(
                "track {track_index}: start {:?}",
                self.entry(id).map(|entry| entry.animation_index)
            );
        }

        if let Some(entry) = self.entry_mut(id) {
            entry.time = 0.0;
            entry.last_time = -1.0;
        }
        self.tracks[track_index].current = Some(id);
        push_event(&mut self.event_queue, id, AnimationStateEvent::Start);
    }

    fn clear_track_internal(&mut self, track_index: usize) {
        let Some(track) = self.tracks.get_mut(track_index) else {
            return;
        };
        let current = track.current.take();
        let queued: Vec<EntryId> = track.queue.drain(..).collect();

        if let Some(current_id) = current {
            log::debug!("track {track_index}: cleared");
            if let Some(previous) = self
                .entry_mut(current_id)
                .and_then(|entry| entry.previous.take())
            {
                push_event(&mut self.event_queue, previous, AnimationStateEvent::End);
                push_event(&mut self.event_queue, previous, AnimationStateEvent::Dispose);
            }
            push_event(&mut self.event_queue, current_id, AnimationStateEvent::End);
            push_event(&mut self.event_queue, current_id, AnimationStateEvent::Dispose);
        }
        for id in queued {
            push_event(&mut self.event_queue, id, AnimationStateEvent::Dispose);
        }
    }

    /// Queues the events fired by one apply plus `Complete` when the entry reached its end (or
    /// wrapped, when looping). Events keyed before a loop wrap are delivered before `Complete`.
    fn queue_applied_events(
        &mut self,
        id: EntryId,
        fired: &[Event],
        last_time: f32,
        time: f32,
        end_time: f32,
        looped: bool,
    ) {
        let complete = if looped {
            end_time > 0.0 && last_time % end_time > time % end_time
        } else {
            last_time < end_time && time >= end_time
        };
        if !complete {
            for event in fired {
                push_event(&mut self.event_queue, id, AnimationStateEvent::Event(event.clone()));
            }
            return;
        }

        let loop_count = if end_time > 0.0 {
            (time / end_time) as u32
        } else {
            1
        };
        let split = if looped {
            let wrapped_last = last_time % end_time;
            fired
                .iter()
                .take_while(|event| event.time > wrapped_last)
                .count()
        } else {
            fired.len()
        };
        for event in &fired[..split] {
            push_event(&mut self.event_queue, id, AnimationStateEvent::Event(event.clone()));
        }
        push_event(
            &mut self.event_queue,
            id,
            AnimationStateEvent::Complete { loop_count },
        );
        for event in &fired[split..] {
            push_event(&mut self.event_queue, id, AnimationStateEvent::Event(event.clone()));
        }
    }

    fn ensure_track(&mut self, track_index: usize) {
        if track_index >= self.tracks.len() {
            self.tracks.resize_with(track_index + 1, Track::default);
        }
    }

    fn alloc_entry(&mut self, entry: TrackEntry) -> EntryId {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.entries[index];
            slot.entry = Some(entry);
            EntryId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.entries.len();
            self.entries.push(EntrySlot {
                generation: 0,
                entry: Some(entry),
            });
            EntryId {
                index,
                generation: 0,
            }
        }
    }

    fn entry(&self, id: EntryId) -> Option<&TrackEntry> {
        let slot = self.entries.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut TrackEntry> {
        let slot = self.entries.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    fn free_entry(&mut self, id: EntryId) {
        let Some(slot) = self.entries.get_mut(id.index) else {
            return;
        };
        if slot.generation != id.generation {
            return;
        }
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
    }

    fn snapshot(&self, id: EntryId) -> Option<TrackEntrySnapshot> {
        let entry = self.entry(id)?;
        let animation_name = self
            .data
            .skeleton_data
            .animations
            .get(entry.animation_index)
            .map(|animation| animation.name.clone())
            .unwrap_or_default();
        Some(TrackEntrySnapshot {
            track_index: entry.track_index,
            animation_index: entry.animation_index,
            animation_name,
            time: entry.time,
            looped: entry.looped,
        })
    }

    fn take_entry_listener(&mut self, id: EntryId) -> Option<Box<dyn TrackEntryListener>> {
        self.entry_mut(id).and_then(|entry| entry.listener.take())
    }

    fn restore_entry_listener(&mut self, id: EntryId, listener: Box<dyn TrackEntryListener>) {
        if let Some(entry) = self.entry_mut(id) {
            if entry.listener.is_none() {
                entry.listener = Some(listener);
            }
        }
    }

    /// Delivers queued events, entry listener first. Listeners may call back into the state; the
    /// events that raises are appended and delivered by this same loop.
    fn drain_event_queue(&mut self) {
        if self.draining_events {
            return;
        }
        self.draining_events = true;

        while let Some(queued) = self.event_queue.pop_front() {
            let entry_id = queued.entry;
            let event = queued.event;

            let Some(snapshot) = self.snapshot(entry_id) else {
                log::trace!("dropping {event:?} for a disposed track entry");
                continue;
            };

            let mut entry_listener = self.take_entry_listener(entry_id);
            if let Some(listener) = entry_listener.as_mut() {
                listener.on_event(self, &snapshot, &event);
            }

            let mut state_listener = self.listener.take();
            if let Some(listener) = state_listener.as_mut() {
                listener.on_event(self, &snapshot, &event);
            }
            if self.listener.is_none() {
                self.listener = state_listener;
            }

            if matches!(event, AnimationStateEvent::Dispose) {
                self.free_entry(entry_id);
            } else if let Some(listener) = entry_listener {
                self.restore_entry_listener(entry_id, listener);
            }
        }

        self.draining_events = false;
    }
}

fn push_event(out: &mut VecDeque<QueuedEvent>, entry: EntryId, event: AnimationStateEvent) {
    out.push_back(QueuedEvent { entry, event });
}
