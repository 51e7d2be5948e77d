//! The note map: data model, lane assignment, persistence.

pub mod lanes;
pub mod model;
pub mod store;

pub use lanes::{
    assign_notes, clamp_power, Assignment, DescendingPattern, FrequencyMapping, HitContext,
    LaneAssigner, LaneStrategy, NoteTypeClassifier, RandomWalk, ROOT_LANE,
};
pub use model::{MapSummary, Note, NoteCursor, NoteMap, NoteType};
pub use store::{sanitize_file_name, MapStore};
