// The embedded provider is always built; tests and release binaries use it.
pub mod provider_embed;

// Reads assets from ../ui on every request, for editing the UI without rebuilding.
#[cfg(feature = "frontend_disk")]
pub mod provider_disk;
