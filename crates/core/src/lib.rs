//! nview core library
//!
//! Reader page virtualization and the gallery thumbnail pipeline.
//!
//! The [`ReaderPageController`] decides which pages of an open comic are
//! fetched, kept and released as the reader scrolls; [`PageLoader`] runs the
//! loads it issues. [`ThumbnailPipeline`] produces cover thumbnails through a
//! cache holding one canonical rendition per source.

pub mod batch;
pub mod config;
pub mod layout;
pub mod loader;
pub mod metrics;
pub mod page;
pub mod reader;
pub mod thumbnail;

pub use batch::{
    compute_batch_mutation_plan, normalize_comic_dirs, resolve_activation_session_id, ActivationInputs, BatchMode,
    BatchMutationPlan, FocusPolicy,
};
pub use config::{
    ConfigError, EffectiveResidency, LayoutConfig, NviewConfig, ResidencyConfig, ThumbnailConfig,
    AGGRESSIVE_HYSTERESIS_CAP_MS, AGGRESSIVE_MODE_MIN_MS,
};
pub use layout::{fallback_height, slot_height, FitMode, PageLayout, PageMetric, Viewport};
pub use loader::{drain_loads, PageLoader};
pub use metrics::{MetricsSink, MetricsSnapshot};
pub use page::{PageDescriptor, PageState, RejectedResource, TransitionError};
pub use reader::{
    LoadCompletion, LoadFailure, LoadOutcome, LoadTicket, ReaderPageController, ReaderStats, ScrollBehavior,
    ScrollCommand,
};
pub use thumbnail::{
    compute_target_size, TargetSize, ThumbnailError, ThumbnailOutput, ThumbnailPipeline, ThumbnailRequest,
    DEFAULT_MAX_OUTPUT_SIZE,
};
