//! Spatial sound registry for the Earshot core.
//!
//! Agents react to short-lived sound events. This crate caches those
//! events per world instance, bounds the cache by a weighted eviction
//! metric, and answers "what is the most interesting thing I can hear
//! from here" with occlusion taken into account.
//!
//! # Modules
//!
//! - [`registry`] -- `SoundRegistry`: insert, dedup, eviction, decay, nearest-event query
//! - [`ingest`] -- Registration helpers that fill in configured defaults
//! - [`attenuation`] -- Occlusion ray walk and its memo
//! - [`geometry`] -- The `Geometry` collaborator trait
//! - [`voxel`] -- In-memory voxel geometry
//! - [`surface`] -- Surface categories and their multipliers
//! - [`settings`] -- Raw `sounds` configuration and the compiled snapshot
//! - [`profile`] -- Listener profiles and their matcher chain

pub mod attenuation;
pub mod geometry;
mod grid;
pub mod ingest;
pub mod profile;
pub mod registry;
pub mod settings;
pub mod surface;
pub mod voxel;

pub use attenuation::{Attenuated, Attenuator, Emission};
pub use geometry::{Geometry, GeometryError, OpenAir, RayHit};
pub use grid::LARGE_RANGE_THRESHOLD;
pub use profile::{Posture, ProfileBook, ProfileConfig, ProfileMatcher, SoundProfile};
pub use registry::{InsertOutcome, RegistryStats, SoundRegistry};
pub use settings::{SettingsCell, SettingsError, SoundConfig, SoundDefaults, SoundSettings};
pub use surface::{SurfaceCategory, SurfaceConfig, SurfaceInfo, SurfaceRules};
pub use voxel::VoxelGeometry;
