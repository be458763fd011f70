use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Shader stage a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Failure while compiling or linking a [`crate::ShaderProgram`].
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("vertex and fragment stages disagree on the uniform block layout")]
    UniformMismatch,
    #[error("neither stage declares a uniform block")]
    MissingUniformBlock,
    #[error("{stage} stage has no {stage} entry point")]
    MissingEntryPoint { stage: ShaderStage },
}

/// Failure while decoding slide images or clips.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unable to open {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to decode {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{} has zero width or height", path.display())]
    Empty { path: PathBuf },
}

/// Rejected geometry upload. The object is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("no vertices supplied")]
    NoVertices,
    #[error("{stream} stream has {actual} entries but there are {expected} vertices")]
    LengthMismatch {
        stream: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Fatal error while assembling the projector scene.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("shader program could not be built")]
    Shader(#[from] ShaderError),
    #[error("initial slide could not be loaded")]
    Media(#[from] MediaError),
    #[error("invalid key bindings")]
    Config(#[from] ConfigError),
    #[error("{name} geometry rejected")]
    Geometry {
        name: &'static str,
        #[source]
        source: GeometryError,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("unknown command `{0}` in key bindings")]
    UnknownCommand(String),
    #[error("unknown key `{0}` in key bindings")]
    UnknownKey(String),
}
