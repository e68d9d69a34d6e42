pub mod cleanup;

pub use cleanup::CleanupTask;
