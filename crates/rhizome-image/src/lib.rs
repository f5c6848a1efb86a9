//! Binary image persistence for Rhizome.
//!
//! A binary image is a single relocatable file holding a complete compiled
//! knowledge base: the needed atoms, the expression pool, the constraint
//! table, and one tag-prefixed block per registered construct type. Saving
//! runs a two-pass protocol (mark everything reachable, then write dense
//! index-linked records); loading reads the blocks back and runs a fix-up
//! pass converting on-disk indices into live handles.
//!
//! Construct types participate through the [`BinaryItem`] trait and the
//! priority-ordered registry owned by [`ImageContext`].

pub mod atom_codec;
pub mod bload;
pub mod bsave;
pub mod chunked;
pub mod constraint_codec;
pub mod context;
pub mod dump;
pub mod expr_codec;
pub mod fact_codec;
pub mod io;
pub mod registry;
pub mod state;
pub mod template_codec;

#[cfg(test)]
mod chunked_tests;
#[cfg(test)]
mod dump_tests;
#[cfg(test)]
mod io_tests;
#[cfg(test)]
mod registry_tests;

use std::io as stdio;

pub use context::ImageContext;
pub use dump::dump;
pub use io::{IMAGE_PREFIX, IMAGE_VERSION, ImageSource, TAG_LEN};
pub use registry::{BinaryItem, BinaryRegistry, Hook, HookList, RegistryEntry};
pub use state::{AtomValueArrays, ChunkAllocator, DefaultAllocator, ImageState, SavedCounts};

/// Errors reported by the save and load drivers.
///
/// Fatal conditions only; degraded-but-continuing cases (an unknown
/// construct tag in the file) are diagnostics, not errors.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("i/o error: {0}")]
    Io(#[from] stdio::Error),

    /// The file does not start with the binary image prefix ID.
    #[error("not a binary construct file")]
    NotBinaryFile,

    /// The version ID does not match this build. The format is
    /// version-exact by design: any difference is a hard rejection.
    #[error("incompatible binary construct file version")]
    IncompatibleVersion,

    /// An image is active and at least one construct refused to release.
    #[error("the current binary image could not be cleared")]
    ClearFailed,

    /// The environment's clear-readiness check failed.
    #[error("the environment could not be cleared")]
    EnvironmentNotReady,

    /// Function names in the image that the live registry cannot resolve.
    #[error("undefined functions referenced by the image: {}", .0.join(", "))]
    MissingFunctions(Vec<String>),

    /// A save was requested while a binary image is active.
    #[error("a binary image is currently loaded")]
    SaveWhileLoaded,

    /// The chunked loader could not allocate even a single object.
    #[error("out of memory while loading a binary image")]
    OutOfMemory,
}

pub type ImageResult<T> = Result<T, ImageError>;
