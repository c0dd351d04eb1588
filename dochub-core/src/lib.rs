mod hierarchy;
mod resolve;
mod run;
mod slug;

pub use hierarchy::{
    HierarchyNode, HierarchyTree, NodeKey, default_hierarchy, indent, normalize, outdent,
    set_enabled,
};
pub use resolve::{
    Category, ConfigWarning, EntityKind, PathBinding, Resolution, ResolvedPath, Supplier,
    SuppliersByCategory, resolve,
};
pub use run::{
    ActionKind, LOG_CREATED_PREFIX, LOG_DUPLICATE_PREFIX, LOG_FAILED_PREFIX, LOG_REUSED_PREFIX,
    RunRecord, RunStatus, SyncAction, summary_line,
};
pub use slug::{FALLBACK_SEGMENT, join_root_path, slugify_segment};
