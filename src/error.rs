use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Variants fall into three groups: container parsing failures (`Malformed`, `OutOfBounds`,
/// `NotSupported`, `Empty`), pipeline outcomes (`UnusableTarget`, `NoSuitableModule`), and
/// transformation precondition violations (`ModuleTypeMissing`, `InitializerExists`). The
/// latter two groups map one-to-one onto the user-visible failure modes of the proxy
/// generator: a run either aborts before any artifact is written or completes with both the
/// proxy module and its manifest on disk.
#[derive(Error, Debug)]
pub enum Error {
    /// The module container is damaged and could not be parsed.
    ///
    /// Includes the source location where the malformation was detected
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing a module container.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    ///
    /// The input does not carry the module container magic, or uses a
    /// container format version this library does not understand.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// XML error while writing or parsing a redirect manifest.
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    /// The target path is missing or is not an executable module.
    ///
    /// Reported before any work happens; a run aborted with this error
    /// produces no output files.
    #[error("Not a usable executable target: {0}")]
    UnusableTarget(String),

    /// No declared dependency of the target could be resolved to a module
    /// that is allowed to be proxied.
    ///
    /// Every reference was either deny-listed, unresolvable, mixed-mode, or
    /// rejected by the signing policy.
    #[error("Couldn't find a suitable module to generate a proxy for")]
    NoSuitableModule,

    /// The module has no `<Module>` pseudo-type to attach an initializer to.
    #[error("Module has no <Module> pseudo-type")]
    ModuleTypeMissing,

    /// The module already declares a static initializer on its `<Module>`
    /// pseudo-type.
    ///
    /// Merging with a pre-existing initializer is not supported; injecting a
    /// second one would corrupt the module, so this is surfaced as a fatal
    /// error instead.
    #[error("Module already declares an initializer: {0}")]
    InitializerExists(String),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
