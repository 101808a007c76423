use crate::ProxmoxClient;
use crate::config::domain::model::{
    app_config::AppConfig,
    vm_spec::{DiskSpec, VmSpec},
};
use crate::core::domain::error::VmError;
use crate::core::domain::model::vm::{ImportDiskParams, UpdateVmConfigParams};
use crate::provisioning::application::request::create_vm_request::build_create_params;
use crate::provisioning::application::service::task_service::{TaskPolicy, TaskService};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

/// A VM that was created and configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedVm {
    pub vmid: u32,
    pub name: String,
}

/// One VM that could not be created.
#[derive(Debug)]
pub struct VmFailure {
    /// `name (ID: id)` of the failed spec.
    pub vm: String,
    pub error: VmError,
}

/// Outcome of a provisioning batch.
#[derive(Debug, Default)]
pub struct ProvisionSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<VmFailure>,
}

impl ProvisionSummary {
    /// Process exit status for the batch: `1` when anything failed.
    pub fn exit_status(&self) -> u8 {
        u8::from(self.failed > 0)
    }
}

/// Creates VMs on a single node, one at a time.
pub struct ProvisioningService {
    client: ProxmoxClient,
    node: String,
    default_storage: String,
    task_policy: TaskPolicy,
}

impl ProvisioningService {
    pub fn new(
        client: ProxmoxClient,
        node: impl Into<String>,
        default_storage: impl Into<String>,
    ) -> Self {
        Self {
            client,
            node: node.into(),
            default_storage: default_storage.into(),
            task_policy: TaskPolicy::default(),
        }
    }

    /// Service for the node, storage and task timeout named in `config`.
    pub fn from_config(client: ProxmoxClient, config: &AppConfig) -> Self {
        Self::new(client, &config.proxmox.node, &config.storage.name).with_task_policy(
            TaskPolicy::with_timeout(Duration::from_secs(config.proxmox.task_timeout_secs)),
        )
    }

    pub fn with_task_policy(mut self, policy: TaskPolicy) -> Self {
        self.task_policy = policy;
        self
    }

    pub fn client(&self) -> &ProxmoxClient {
        &self.client
    }

    fn tasks(&self) -> TaskService<'_> {
        TaskService::new(&self.client, &self.node, self.task_policy)
    }

    /// Creates one VM: validate, import the disk if requested, create, then tag.
    ///
    /// # Errors
    ///
    /// - `VmError::MissingField` before any request is sent
    /// - `VmError::DuplicateId` when the id is taken; the create endpoint is not called
    /// - `VmError::ImageNotFound` when the image to import is not on disk
    /// - `VmError::Import` when the import task fails or leaves no unused volume
    /// - `VmError::Task` / `VmError::Api` for failures of the create or tag calls
    pub async fn create_vm(&self, spec: &VmSpec) -> Result<CreatedVm, VmError> {
        let mut params = build_create_params(spec)?;
        let vmid = params.vmid;

        self.validate(spec, vmid).await?;

        if let Some(DiskSpec::Import {
            import_img,
            storage,
        }) = &spec.disk
        {
            let storage = storage.as_deref().unwrap_or(&self.default_storage);
            params.scsi0 = Some(self.import_disk(vmid, import_img, storage).await?);
        }

        info!(vmid, params = %params.to_log_string(), "VM creation parameters");
        info!(vmid, name = %params.name, "starting VM creation");
        let upid = self
            .client
            .create_vm(&self.node, &params)
            .await
            .map_err(|e| VmError::api(vmid, e))?;
        self.tasks()
            .wait(&upid)
            .await
            .map_err(|e| VmError::api(vmid, e))?;

        if let Some(tags) = &spec.tags {
            let update = UpdateVmConfigParams {
                tags: Some(tags.clone()),
            };
            self.client
                .update_vm_config(&self.node, vmid, &update)
                .await
                .map_err(|e| VmError::api(vmid, e))?;
        }

        info!(vmid, name = %params.name, "VM created successfully");
        Ok(CreatedVm {
            vmid,
            name: params.name,
        })
    }

    async fn validate(&self, spec: &VmSpec, vmid: u32) -> Result<(), VmError> {
        let existing = self
            .client
            .vms(&self.node)
            .await
            .map_err(|e| VmError::api(vmid, e))?;
        if existing.iter().any(|vm| vm.vmid == vmid) {
            error!(vmid, "VM ID already exists");
            return Err(VmError::DuplicateId(vmid));
        }

        if let Some(DiskSpec::Import { import_img, .. }) = &spec.disk {
            if !import_img.exists() {
                error!(vmid, path = %import_img.display(), "image file does not exist");
                return Err(VmError::ImageNotFound(import_img.clone()));
            }
        }
        Ok(())
    }

    /// Imports `image` and returns the resulting volume id.
    async fn import_disk(&self, vmid: u32, image: &Path, storage: &str) -> Result<String, VmError> {
        info!(vmid, image = %image.display(), storage, "starting image import");
        let import_failed = |reason: String| VmError::Import { vmid, reason };

        let params = ImportDiskParams {
            filename: image.display().to_string(),
            storage: storage.to_string(),
        };
        let upid = self
            .client
            .import_disk(&self.node, vmid, &params)
            .await
            .map_err(|e| import_failed(e.to_string()))?;
        self.tasks()
            .wait(&upid)
            .await
            .map_err(|e| import_failed(e.to_string()))?;

        let config = self
            .client
            .vm_config(&self.node, vmid)
            .await
            .map_err(|e| import_failed(e.to_string()))?;
        let volume = config
            .first_unused_volume()
            .ok_or_else(|| import_failed("no unused volume after import".to_string()))?;
        info!(vmid, volume, "image imported");
        Ok(volume.to_string())
    }

    /// Creates every VM in file order. A failure never stops the batch.
    pub async fn create_all(&self, specs: &[VmSpec]) -> ProvisionSummary {
        let total = specs.len();
        let mut summary = ProvisionSummary::default();
        info!(total, "starting creation of virtual machines");

        for (index, spec) in specs.iter().enumerate() {
            info!("[{}/{}] Creating VM: {}", index + 1, total, spec);
            match self.create_vm(spec).await {
                Ok(_) => summary.succeeded += 1,
                Err(error) => {
                    error!(vm = %spec, %error, "VM creation failed");
                    summary.failed += 1;
                    summary.failures.push(VmFailure {
                        vm: spec.to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Creation completed: {} successful, {} failed",
            summary.succeeded,
            summary.failed
        );
        summary
    }
}
