use crate::{NoteRecord, ScriptCommand};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Sample the current page and produce a fresh login snapshot.
    CheckReadiness,
    /// Construct the extraction run for a new session.
    BeginExtraction { session_id: String },
    /// Forward a command to the extraction run.
    SendCommand(ScriptCommand),
    /// Hand a validated record to storage.
    PersistRecord(NoteRecord),
}
