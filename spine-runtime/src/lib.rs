//! Skeletal animation runtime core.
//!
//! Holds the decoded skeleton model ([`SkeletonData`]), the mutable pose of one instance
//! ([`Skeleton`]), keyframed [`Animation`]s and the track mixer ([`AnimationState`]). Loading
//! skeleton files and drawing are left to the host: a loader fills in `SkeletonData`, a renderer
//! reads bone world transforms and slot attachments from `Skeleton`.

#![forbid(unsafe_code)]

mod curve;
mod error;
mod model;
mod runtime;

pub use curve::*;
pub use error::*;
pub use model::*;
pub use runtime::*;
