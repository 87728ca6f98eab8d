//! Error taxonomy for loading, building and rendering.
//!
//! Every failure that can reach the `load_gltf` boundary is a value, never a panic.
//! [`LoadError::kind`] folds the detailed variants back onto the coarse
//! [`ErrorKind`] names that hosts report to users.

use std::fmt;

/// The asset tables a reference can point into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Buffers,
    BufferViews,
    Accessors,
    Meshes,
    Materials,
    Nodes,
    Scenes,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Table::Buffers => "buffers",
            Table::BufferViews => "bufferViews",
            Table::Accessors => "accessors",
            Table::Meshes => "meshes",
            Table::Materials => "materials",
            Table::Nodes => "nodes",
            Table::Scenes => "scenes",
        };
        f.write_str(name)
    }
}

/// Failures while decoding a binary container into asset tables.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed container: {reason}")]
    MalformedContainer { reason: String },

    #[error("truncated container: {region} declares {declared} bytes but only {available} are available")]
    TruncatedContainer {
        region: &'static str,
        declared: usize,
        available: usize,
    },

    #[error("dangling reference into {table} at index {index}")]
    DanglingReference { table: Table, index: usize },

    #[error("accessor {accessor} needs {required} bytes but its view holds {available}")]
    AccessorOutOfBounds {
        accessor: usize,
        required: usize,
        available: usize,
    },

    #[error("buffer view {view} ends at byte {required} but its buffer holds {available}")]
    BufferViewOutOfBounds {
        view: usize,
        required: usize,
        available: usize,
    },

    #[error("mesh {mesh} primitive {primitive} has no POSITION attribute")]
    MissingPositions { mesh: usize, primitive: usize },

    #[error("accessor {accessor} is unsupported: {reason}")]
    UnsupportedAccessor { accessor: usize, reason: String },

    #[error("node {node} breaks the hierarchy: {reason}")]
    InvalidHierarchy { node: usize, reason: &'static str },
}

impl ParseError {
    pub(crate) fn malformed<T: ToString>(reason: T) -> Self {
        ParseError::MalformedContainer {
            reason: reason.to_string(),
        }
    }
}

/// Failures of the renderer's mesh upload contract.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadError {
    #[error("primitive has no vertices")]
    EmptyMesh,

    #[error("index {index} exceeds vertex count {vertex_count}")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    #[error("{bytes} byte buffer exceeds the device limit of {limit} bytes")]
    TooLarge { bytes: u64, limit: u64 },

    #[error("device rejected upload: {0}")]
    Device(String),
}

/// Failures while turning asset tables into a renderable scene.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("container declares no default scene")]
    NoDefaultScene,

    #[error("node {node} lies deeper than the hierarchy limit of {limit}")]
    HierarchyTooDeep { node: usize, limit: usize },

    #[error("uploading mesh {mesh} primitive {primitive} failed: {source}")]
    AssetUploadFailed {
        mesh: usize,
        primitive: usize,
        #[source]
        source: UploadError,
    },

    #[error(transparent)]
    Container(#[from] ParseError),
}

/// Failures of a single frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("surface was lost or is outdated and has been reconfigured")]
    SurfaceLost,

    #[error("surface error: {0}")]
    Surface(String),

    #[error("session is stopped")]
    Stopped,
}

/// Errors of the session lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no drawing surface with id {surface_id:?}")]
    SurfaceNotFound { surface_id: String },

    #[error("graphics context unavailable: {0}")]
    GraphicsUnavailable(#[source] anyhow::Error),

    #[error("viewer is not running")]
    NotRunning,
}

/// Everything `load_gltf` can report back to its caller.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("viewer is not running")]
    NotRunning,
}

/// Coarse classification of a failure, stable enough to hand to a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedContainer,
    TruncatedContainer,
    DanglingReference,
    AccessorOutOfBounds,
    NoDefaultScene,
    HierarchyTooDeep,
    AssetUploadFailed,
    SurfaceNotFound,
    NotRunning,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedContainer => "MalformedContainer",
            ErrorKind::TruncatedContainer => "TruncatedContainer",
            ErrorKind::DanglingReference => "DanglingReference",
            ErrorKind::AccessorOutOfBounds => "AccessorOutOfBounds",
            ErrorKind::NoDefaultScene => "NoDefaultScene",
            ErrorKind::HierarchyTooDeep => "HierarchyTooDeep",
            ErrorKind::AssetUploadFailed => "AssetUploadFailed",
            ErrorKind::SurfaceNotFound => "SurfaceNotFound",
            ErrorKind::NotRunning => "NotRunning",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::TruncatedContainer { .. } => ErrorKind::TruncatedContainer,
            ParseError::DanglingReference { .. } => ErrorKind::DanglingReference,
            ParseError::AccessorOutOfBounds { .. } | ParseError::BufferViewOutOfBounds { .. } => {
                ErrorKind::AccessorOutOfBounds
            }
            ParseError::MalformedContainer { .. }
            | ParseError::MissingPositions { .. }
            | ParseError::UnsupportedAccessor { .. }
            | ParseError::InvalidHierarchy { .. } => ErrorKind::MalformedContainer,
        }
    }
}

impl BuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::NoDefaultScene => ErrorKind::NoDefaultScene,
            BuildError::HierarchyTooDeep { .. } => ErrorKind::HierarchyTooDeep,
            BuildError::AssetUploadFailed { .. } => ErrorKind::AssetUploadFailed,
            BuildError::Container(e) => e.kind(),
        }
    }
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Parse(e) => e.kind(),
            LoadError::Build(e) => e.kind(),
            LoadError::NotRunning => ErrorKind::NotRunning,
        }
    }
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::SurfaceNotFound { .. } => ErrorKind::SurfaceNotFound,
            SessionError::GraphicsUnavailable(_) | SessionError::NotRunning => ErrorKind::NotRunning,
        }
    }
}
