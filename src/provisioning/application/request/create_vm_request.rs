use crate::config::domain::model::vm_spec::{DiskSpec, VmSpec};
use crate::core::domain::error::VmError;
use crate::core::domain::model::vm::CreateVmParams;

/// Network device used when a VM does not configure `net0`.
pub const DEFAULT_NET0: &str = "model=virtio,bridge=vmbr0";

/// Maps a VM spec onto the parameters of the create call.
///
/// `scsi0` comes from the VM entry itself or from a `disk.scsi0` volume reference; imported
/// disks are attached later by the provisioning service once the volume id is known.
///
/// # Errors
///
/// `VmError::MissingField` when any of id, name, memory or cores is absent.
pub fn build_create_params(spec: &VmSpec) -> Result<CreateVmParams, VmError> {
    let (Some(vmid), Some(name), Some(memory), Some(cores)) =
        (spec.id, spec.name.as_ref(), spec.memory, spec.cores)
    else {
        return Err(VmError::MissingField {
            vm: spec.display_name().to_string(),
            fields: spec.missing_fields(),
        });
    };

    let boot = match &spec.boot_order {
        Some(order) => Some(format!("order={}", order.join(","))),
        None => spec.boot.clone(),
    };

    let scsi0 = match &spec.disk {
        Some(DiskSpec::Volume { scsi0 }) => Some(scsi0.clone()),
        _ => spec.scsi0.clone(),
    };

    let mut params = CreateVmParams {
        vmid,
        name: name.clone(),
        memory,
        cores,
        sockets: spec.sockets,
        ostype: spec.ostype.clone(),
        scsihw: spec.scsihw.clone(),
        cpu: spec.cpu.clone(),
        acpi: spec.acpi.map(|flag| flag.as_api()),
        ide2: spec.ide2.clone(),
        scsi0,
        net0: spec.net0.clone().unwrap_or_else(|| DEFAULT_NET0.to_string()),
        boot,
        ..Default::default()
    };

    if let Some(ci) = spec.effective_cloud_init() {
        params.ciuser = ci.user.clone();
        params.cipassword = ci.password.clone();
        params.sshkeys = ci.ssh_key.clone();
        params.ipconfig0 = ci.ip_config.clone();
    }

    Ok(params)
}
