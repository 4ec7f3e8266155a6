// Osman - an OpenSearch manager
//
// This library keeps OpenSearch indices in step with locally maintained
// mappings, settings, search templates and painless scripts. Logical index
// names are served through aliases so that migrations swap physical indices
// without clients noticing.

// Re-export the OpenSearch layer
pub use osman_opensearch::*;

// Re-export logging
pub use osman_log as log;

// Re-exported for implementors of `IndexStore` and `ScriptStore`
pub use async_trait::async_trait;
pub use serde_json;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        async_trait,
        diff,
        Diff,
        IndexStore,
        OsmanClient,
        OsmanConfig,
        OsmanError,
        ReindexCoordinator,
        ReindexOutcome,
        Result,
        ScriptManager,
        ScriptStore,
        ScriptUpload,
        SkipReason,
        StoreResponse,
    };
}
