use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for Proxmox API operations.
///
/// Session-level failures (unreachable host, rejected credentials) are fatal for the
/// provisioning pipeline; everything else is scoped to the operation that produced it.
#[derive(Error, Debug)]
pub enum ProxmoxError {
    /// Represents errors that occur while talking to the API endpoint
    ///
    /// # Fields
    /// * `0` - A description of what went wrong during the request
    #[error("Connection error: {0}")]
    Connection(String),

    /// Represents authentication failures
    ///
    /// # Fields
    /// * `0` - A description of the authentication failure
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The API answered with a non-success status code
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Represents validation failures of client-side values
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An asynchronous hypervisor task did not finish successfully
    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Specialized error type for validation failures.
///
/// This enum provides detailed context about why a validation
/// failed, including field-specific errors and format violations.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Represents a validation failure for a specific field
    ///
    /// # Fields
    /// * `field` - The name of the field that failed validation
    /// * `message` - A detailed message about why validation failed
    #[error("Field '{field}' validation failed: {message}")]
    Field { field: String, message: String },

    /// Represents format/syntax validation failures
    #[error("Format error: {0}")]
    Format(String),

    /// Represents violations of domain constraints
    #[error("Domain constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Terminal failure of a polled hypervisor task.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The task stopped with an exit status other than `OK`.
    #[error("Task {upid} failed with exit status '{exitstatus}': {payload}")]
    Failed {
        upid: String,
        exitstatus: String,
        payload: String,
    },

    /// The task did not reach `stopped` before the polling deadline.
    ///
    /// The hypervisor task may still be running; only local waiting was abandoned.
    #[error("Task {upid} did not finish within {timeout:?}")]
    Timeout { upid: String, timeout: Duration },
}

/// Per-VM failure reported by the provisioning service.
#[derive(Error, Debug)]
pub enum VmError {
    #[error("VM '{vm}' is missing required fields: {}", .fields.join(", "))]
    MissingField {
        vm: String,
        fields: Vec<&'static str>,
    },

    #[error("VM ID {0} already exists")]
    DuplicateId(u32),

    #[error("Image file does not exist: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("Disk import for VM {vmid} failed: {reason}")]
    Import { vmid: u32, reason: String },

    #[error("VM {vmid} task failed: {source}")]
    Task {
        vmid: u32,
        #[source]
        source: TaskError,
    },

    #[error("VM {vmid} API call failed: {source}")]
    Api {
        vmid: u32,
        #[source]
        source: ProxmoxError,
    },
}

impl VmError {
    /// Wraps an API error raised while working on `vmid`, lifting task failures into
    /// their dedicated variant.
    pub(crate) fn api(vmid: u32, error: ProxmoxError) -> Self {
        match error {
            ProxmoxError::Task(source) => VmError::Task { vmid, source },
            source => VmError::Api { vmid, source },
        }
    }
}

/// Failure to load the configuration file. Always fatal for the process.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Cannot read configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Missing required section '{0}' in configuration file")]
    MissingSection(&'static str),

    #[error("VM configuration '{vm}' is missing required fields: {}", .fields.join(", "))]
    MissingVmField {
        vm: String,
        fields: Vec<&'static str>,
    },
}

/// Failures of the image transfer pipeline.
#[derive(Error, Debug)]
pub enum ImageError {
    /// SSH connect, authentication or SFTP subsystem negotiation failed.
    #[error("Failed to connect to {host}: {message}")]
    Connection { host: String, message: String },

    #[error("Not connected to PVE host")]
    NotConnected,

    #[error("Local file not found: {}", .0.display())]
    LocalNotFound(PathBuf),

    #[error("File {0} already exists on remote")]
    AlreadyExists(String),

    #[error("Image {0} not found")]
    NotFound(String),

    #[error("Failed to upload {file}: {message}")]
    Upload { file: String, message: String },

    #[error("Remote operation on {path} failed: {message}")]
    Remote { path: String, message: String },

    #[error("Local I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for Results that may fail with a ProxmoxError
pub type ProxmoxResult<T> = Result<T, ProxmoxError>;
