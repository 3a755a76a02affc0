//! Preview core: pure viewer state machine and view-model helpers.
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use state::{
    suggested_file_name, AttemptId, EmbedStatus, LoadStatus, ViewerState, LOAD_FAILED_MESSAGE,
    SAMPLE_LABEL_URL,
};
pub use update::update;
pub use view_model::ViewerViewModel;
