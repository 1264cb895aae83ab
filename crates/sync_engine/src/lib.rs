//! Sync engine: page heuristics, the extraction run and the controller host.
mod categorize;
mod config;
mod controller;
mod decode;
mod discovery;
mod extract;
mod extractor;
mod gate;
mod pagination;
mod persist;
mod readiness;
pub mod scripts;
mod selectors;
mod static_surface;
mod surface;
mod types;

pub use categorize::{categorize, default_categories, Category};
pub use config::{SettingsError, SyncSettings};
pub use controller::SyncController;
pub use decode::{decode_page, DecodedPage};
pub use discovery::{discover, estimate_total, Discovery, DiscoveryStrategy};
pub use extract::{candidate_count, extract_record, resolve_url, scan_page, PageScan};
pub use extractor::{ExtractionHandle, ExtractionSession};
pub use gate::{check_collection_page, GateReport};
pub use pagination::{find_load_more, scroll_plan, LoadMoreTarget};
pub use persist::{
    ensure_store_dir, AtomicFileWriter, JsonFileStore, RecordStore, StoreError, StoredNote,
    STORE_FILENAME,
};
pub use readiness::{detect_login, evaluate, PageSignals, ReadinessCheck, CHECKS};
pub use static_surface::{FetchSettings, StaticPageSurface};
pub use surface::{capture_snapshot, PageSnapshot, RenderingSurface};
pub use types::{CompletionReason, EvalError, NavigationError, SkipReason, SyncError};
