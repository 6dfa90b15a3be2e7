pub mod input;
pub mod output;
pub mod stack;

pub use input::{load_session, read_anchor_file};
pub use output::{save_session, write_midline_csv, write_phase_status_csv, write_projections_csv};
pub use stack::ImageStack;
