//! Sync core: pure session state machine, wire protocol and record validation.
mod effect;
mod login;
mod msg;
mod protocol;
mod record;
mod session;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use login::LoginState;
pub use msg::Msg;
pub use protocol::{ProtocolError, ScriptCommand, ScriptEvent};
pub use record::{parse_record, NoteRecord, RawRecord, RecordError};
pub use session::{SyncSession, SyncStatus, TransitionError};
pub use state::{ControllerState, SyncRejection};
pub use update::update;
pub use view_model::SyncViewModel;
