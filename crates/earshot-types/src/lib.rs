//! Shared type definitions for the Earshot sound-coordination core.
//!
//! Every other crate in the workspace speaks in these types: agent and
//! sound identifiers, world instance keys, block and continuous positions,
//! the grid cell key, and the sound event record.
//!
//! # Modules
//!
//! - [`ids`] -- `AgentId` UUID wrapper, validated `SoundId`, `WorldKey`
//! - [`position`] -- `BlockPos`, `Vec3`, and the 16-unit `CellKey`
//! - [`sound`] -- `SoundEvent`, `SoundOrigin`, and the listener-side `HeardSound`
//! - [`oracle`] -- `AgentOracle`, the liveness check behind every identity reference
//! - [`error`] -- Validation errors

pub mod error;
pub mod ids;
pub mod oracle;
pub mod position;
pub mod sound;

// Re-export all public types at crate root for convenience.
pub use error::TypesError;
pub use ids::{AgentId, DEFAULT_NAMESPACE, SoundId, WorldKey};
pub use oracle::{AgentOracle, AllAlive};
pub use position::{BlockPos, CELL_SHIFT, CellKey, Vec3};
pub use sound::{HeardSound, SoundEvent, SoundOrigin};
