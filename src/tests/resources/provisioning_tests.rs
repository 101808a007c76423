use crate::tests::{TEST_NODE, create_authenticated_client, upid};
use crate::{ProvisioningService, TaskPolicy, VmError, VmSpec};
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, body_partial_json, method, path, path_regex},
};

fn spec(yaml: &str) -> VmSpec {
    serde_yaml::from_str(yaml).unwrap()
}

async fn create_service(mock_server: &MockServer) -> ProvisioningService {
    let client = create_authenticated_client(mock_server).await;
    ProvisioningService::new(client, TEST_NODE, "local-lvm").with_task_policy(TaskPolicy {
        poll_interval: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    })
}

async fn mount_existing_vms(mock_server: &MockServer, vmids: &[u32]) {
    let vms: Vec<_> = vmids
        .iter()
        .map(|vmid| serde_json::json!({ "vmid": vmid, "status": "running" }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": vms })))
        .mount(mock_server)
        .await;
}

async fn mount_tasks_ok(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/api2/json/nodes/pve1/tasks/.+/status$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "status": "stopped", "exitstatus": "OK" }
        })))
        .mount(mock_server)
        .await;
}

async fn mount_create(mock_server: &MockServer, vmid: u32, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .and(body_partial_json(serde_json::json!({ "vmid": vmid })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": upid("qmcreate", vmid)
        })))
        .expect(calls)
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_duplicate_id_never_calls_create() {
    let mock_server = MockServer::start().await;
    mount_existing_vms(&mock_server, &[100]).await;
    mount_create(&mock_server, 100, 0).await;
    let service = create_service(&mock_server).await;

    let result = service
        .create_vm(&spec("id: 100\nname: web\nmemory: 2048\ncores: 2\n"))
        .await;
    assert!(matches!(result, Err(VmError::DuplicateId(100))));
}

#[tokio::test]
async fn test_missing_fields_fail_before_any_request() {
    let mock_server = MockServer::start().await;
    let service = create_service(&mock_server).await;

    let result = service.create_vm(&spec("id: 100\nname: web\nmemory: 2048\n")).await;
    match result {
        Err(VmError::MissingField { vm, fields }) => {
            assert_eq!(vm, "web");
            assert_eq!(fields, vec!["cores"]);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_vm_with_volume_and_tags() {
    let mock_server = MockServer::start().await;
    mount_existing_vms(&mock_server, &[]).await;
    mount_tasks_ok(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .and(body_json(serde_json::json!({
            "vmid": 100,
            "name": "web",
            "memory": 2048,
            "cores": 2,
            "scsi0": "local-lvm:32",
            "net0": "model=virtio,bridge=vmbr0",
            "boot": "order=scsi0,ide2",
            "ciuser": "ubuntu",
            "ipconfig0": "ip=dhcp"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": upid("qmcreate", 100)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api2/json/nodes/pve1/qemu/100/config"))
        .and(body_json(serde_json::json!({ "tags": "web;prod" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": null })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = create_service(&mock_server).await;
    let created = service
        .create_vm(&spec(
            "id: 100\nname: web\nmemory: 2048\ncores: 2\nboot_order: [scsi0, ide2]\n\
             disk:\n  scsi0: local-lvm:32\ncloud_init: true\n\
             ci:\n  user: ubuntu\n  ip_config: ip=dhcp\ntags: web;prod\n",
        ))
        .await
        .unwrap();
    assert_eq!(created.vmid, 100);
    assert_eq!(created.name, "web");
}

#[tokio::test]
async fn test_import_disk_attaches_first_unused_volume() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("jammy.qcow2");
    std::fs::write(&image, b"qcow2").unwrap();

    mount_existing_vms(&mock_server, &[]).await;
    mount_tasks_ok(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu/100/importdisk"))
        .and(body_json(serde_json::json!({
            "filename": image.display().to_string(),
            "storage": "fast-ssd"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": upid("qmimport", 100)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/100/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "unused1": "fast-ssd:vm-100-disk-1",
                "unused0": "fast-ssd:vm-100-disk-0"
            }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .and(body_partial_json(serde_json::json!({
            "vmid": 100,
            "scsi0": "fast-ssd:vm-100-disk-0"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": upid("qmcreate", 100)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = create_service(&mock_server).await;
    let yaml = format!(
        "id: 100\nname: web\nmemory: 2048\ncores: 2\ndisk:\n  import_img: {}\n  storage: fast-ssd\n",
        image.display()
    );
    service.create_vm(&spec(&yaml)).await.unwrap();
}

#[tokio::test]
async fn test_import_without_unused_volume_fails() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("jammy.qcow2");
    std::fs::write(&image, b"qcow2").unwrap();

    mount_existing_vms(&mock_server, &[]).await;
    mount_tasks_ok(&mock_server).await;
    mount_create(&mock_server, 100, 0).await;

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu/100/importdisk"))
        .and(body_partial_json(serde_json::json!({ "storage": "local-lvm" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": upid("qmimport", 100)
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/100/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "scsi0": "local-lvm:vm-100-disk-0" }
        })))
        .mount(&mock_server)
        .await;

    let service = create_service(&mock_server).await;
    let yaml = format!(
        "id: 100\nname: web\nmemory: 2048\ncores: 2\ndisk:\n  import_img: {}\n",
        image.display()
    );
    assert!(matches!(
        service.create_vm(&spec(&yaml)).await,
        Err(VmError::Import { vmid: 100, .. })
    ));
}

#[tokio::test]
async fn test_failed_import_task_is_reported_as_import_error() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("jammy.qcow2");
    std::fs::write(&image, b"qcow2").unwrap();

    mount_existing_vms(&mock_server, &[]).await;
    mount_create(&mock_server, 100, 0).await;

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu/100/importdisk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": upid("qmimport", 100)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api2/json/nodes/pve1/tasks/.+/status$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "status": "stopped", "exitstatus": "storage 'local-lvm' is full" }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/100/config"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = create_service(&mock_server).await;
    let yaml = format!(
        "id: 100\nname: web\nmemory: 2048\ncores: 2\ndisk:\n  import_img: {}\n",
        image.display()
    );
    match service.create_vm(&spec(&yaml)).await {
        Err(VmError::Import { vmid, reason }) => {
            assert_eq!(vmid, 100);
            assert!(reason.contains("is full"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_import_image_fails_before_import() {
    let mock_server = MockServer::start().await;
    mount_existing_vms(&mock_server, &[]).await;
    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu/100/importdisk"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = create_service(&mock_server).await;
    let result = service
        .create_vm(&spec(
            "id: 100\nname: web\nmemory: 2048\ncores: 2\ndisk:\n  import_img: /nonexistent/jammy.qcow2\n",
        ))
        .await;
    assert!(matches!(result, Err(VmError::ImageNotFound(_))));
}

#[tokio::test]
async fn test_failed_create_task_is_reported() {
    let mock_server = MockServer::start().await;
    mount_existing_vms(&mock_server, &[]).await;
    mount_create(&mock_server, 100, 1).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api2/json/nodes/pve1/tasks/.+/status$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "status": "stopped", "exitstatus": "command failed" }
        })))
        .mount(&mock_server)
        .await;

    let service = create_service(&mock_server).await;
    let result = service
        .create_vm(&spec("id: 100\nname: web\nmemory: 2048\ncores: 2\n"))
        .await;
    assert!(matches!(result, Err(VmError::Task { vmid: 100, .. })));
}

#[tokio::test]
async fn test_create_all_continues_after_duplicate() {
    let mock_server = MockServer::start().await;
    mount_existing_vms(&mock_server, &[100]).await;
    mount_tasks_ok(&mock_server).await;
    mount_create(&mock_server, 100, 0).await;
    mount_create(&mock_server, 101, 1).await;

    let service = create_service(&mock_server).await;
    let specs = vec![
        spec("id: 100\nname: web\nmemory: 2048\ncores: 2\n"),
        spec("id: 101\nname: db\nmemory: 4096\ncores: 4\n"),
    ];
    let summary = service.create_all(&specs).await;

    assert_eq!((summary.succeeded, summary.failed), (1, 1));
    assert_eq!(summary.exit_status(), 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].vm, "web (ID: 100)");
    assert!(summary.failures[0].error.to_string().contains("100"));
}

#[tokio::test]
async fn test_create_all_success_exits_zero() {
    let mock_server = MockServer::start().await;
    mount_existing_vms(&mock_server, &[]).await;
    mount_tasks_ok(&mock_server).await;
    mount_create(&mock_server, 100, 1).await;
    mount_create(&mock_server, 101, 1).await;

    let service = create_service(&mock_server).await;
    let specs = vec![
        spec("id: 100\nname: web\nmemory: 2048\ncores: 2\n"),
        spec("id: 101\nname: db\nmemory: 4096\ncores: 4\n"),
    ];
    let summary = service.create_all(&specs).await;
    assert_eq!((summary.succeeded, summary.failed), (2, 0));
    assert_eq!(summary.exit_status(), 0);
    assert!(summary.failures.is_empty());
}
