mod client;

pub use client::{DriveClient, DriveError, DriveErrorClass, JobSnapshot, ResolvedRoot, StartedJob};
