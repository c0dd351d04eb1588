mod client;

pub use client::{
    BridgeClient, BridgeError, BridgeHealth, CreatedFolder, DEFAULT_BASE_URL,
    EnsureStructureRequest, EnsureStructureSummary, FolderCheck,
};
