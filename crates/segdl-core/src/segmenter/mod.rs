//! Range math and segment bookkeeping.
//!
//! A download of known length is cut into fixed-size segments; a completion
//! bitmap records which are on disk. `SegmentMap` bundles both and is the
//! progress snapshot the transfer engine mutates and the resume state persists.

mod bitmap;
mod map;
mod range;

pub use bitmap::SegmentBitmap;
pub use map::SegmentMap;
pub use range::{plan_fixed, Segment};
