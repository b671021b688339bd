pub mod grid;

pub use grid::{EditableGrid, GridStatus, ViewRow};
