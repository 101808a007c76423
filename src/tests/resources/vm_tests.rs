use crate::core::domain::model::vm::{CreateVmParams, ImportDiskParams, UpdateVmConfigParams};
use crate::tests::{TEST_NODE, create_authenticated_client, upid};
use crate::{ProxmoxError, Upid};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

#[tokio::test]
async fn test_vms_list_success() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .and(header("Cookie", "PVEAuthCookie=PVE:testuser@pam:4EEC61E2::sig"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {
                    "vmid": 100,
                    "name": "ubuntu-vm",
                    "status": "running",
                    "cpu": 0.23,
                    "cpus": 4,
                    "maxmem": 8589934592_i64,
                    "uptime": 123456,
                    "tags": "ubuntu;production"
                },
                {
                    "vmid": 101,
                    "status": "stopped"
                }
            ]
        })))
        .mount(&mock_server)
        .await;

    let vms = client.vms(TEST_NODE).await.unwrap();
    assert_eq!(vms.len(), 2);
    assert_eq!(vms[0].vmid, 100);
    assert_eq!(vms[0].name.as_deref(), Some("ubuntu-vm"));
    assert_eq!(vms[0].cpus, Some(4));
    assert_eq!(vms[0].tags.as_deref(), Some("ubuntu;production"));
    assert_eq!(vms[1].name, None);
}

#[tokio::test]
async fn test_vm_config_exposes_unused_volumes() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/100/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "name": "web",
                "memory": "2048",
                "cores": 2,
                "unused0": "local-lvm:vm-100-disk-0",
                "digest": "a1b2c3"
            }
        })))
        .mount(&mock_server)
        .await;

    let config = client.vm_config(TEST_NODE, 100).await.unwrap();
    assert_eq!(config.get_str("name"), Some("web"));
    assert_eq!(config.first_unused_volume(), Some("local-lvm:vm-100-disk-0"));
}

#[tokio::test]
async fn test_create_vm_posts_params_and_returns_task() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;
    let task = upid("qmcreate", 100);

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .and(header("CSRFPreventionToken", "4EEC61E2:token"))
        .and(body_json(serde_json::json!({
            "vmid": 100,
            "name": "web",
            "memory": 2048,
            "cores": 2,
            "scsi0": "local-lvm:32",
            "net0": "model=virtio,bridge=vmbr0",
            "boot": "order=scsi0"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": task
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let params = CreateVmParams {
        vmid: 100,
        name: "web".to_string(),
        memory: 2048,
        cores: 2,
        scsi0: Some("local-lvm:32".to_string()),
        net0: "model=virtio,bridge=vmbr0".to_string(),
        boot: Some("order=scsi0".to_string()),
        ..Default::default()
    };
    let result = client.create_vm(TEST_NODE, &params).await.unwrap();
    assert_eq!(result, Upid::new(task).unwrap());
    assert_eq!(result.node(), TEST_NODE);
}

#[tokio::test]
async fn test_create_vm_rejects_malformed_task_id() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": "not-a-upid"
        })))
        .mount(&mock_server)
        .await;

    let params = CreateVmParams {
        vmid: 100,
        name: "web".to_string(),
        memory: 512,
        cores: 1,
        net0: "model=virtio,bridge=vmbr0".to_string(),
        ..Default::default()
    };
    let result = client.create_vm(TEST_NODE, &params).await;
    assert!(matches!(result, Err(ProxmoxError::Connection(_))));
}

#[tokio::test]
async fn test_create_vm_conflict() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string("unable to create VM 100 - already exists"),
        )
        .mount(&mock_server)
        .await;

    let params = CreateVmParams {
        vmid: 100,
        name: "web".to_string(),
        memory: 512,
        cores: 1,
        net0: "model=virtio,bridge=vmbr0".to_string(),
        ..Default::default()
    };
    match client.create_vm(TEST_NODE, &params).await {
        Err(ProxmoxError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert!(message.contains("already exists"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_import_disk_request() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;
    let task = upid("qmimport", 100);

    Mock::given(method("POST"))
        .and(path("/api2/json/nodes/pve1/qemu/100/importdisk"))
        .and(body_json(serde_json::json!({
            "filename": "/var/lib/vz/images/install/jammy.qcow2",
            "storage": "local-lvm"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": task
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let params = ImportDiskParams {
        filename: "/var/lib/vz/images/install/jammy.qcow2".to_string(),
        storage: "local-lvm".to_string(),
    };
    let result = client.import_disk(TEST_NODE, 100, &params).await.unwrap();
    assert_eq!(result.as_str(), task);
}

#[tokio::test]
async fn test_update_vm_config_sets_tags() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;

    Mock::given(method("PUT"))
        .and(path("/api2/json/nodes/pve1/qemu/100/config"))
        .and(body_json(serde_json::json!({ "tags": "web;prod" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": null })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let params = UpdateVmConfigParams {
        tags: Some("web;prod".to_string()),
    };
    client
        .update_vm_config(TEST_NODE, 100, &params)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_task_status() {
    let mock_server = MockServer::start().await;
    let client = create_authenticated_client(&mock_server).await;
    let task = Upid::new(upid("qmcreate", 100)).unwrap();

    Mock::given(method("GET"))
        .and(path(format!("/api2/json/nodes/pve1/tasks/{}/status", task)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "status": "stopped",
                "exitstatus": "OK",
                "type": "qmcreate",
                "id": "100",
                "node": "pve1"
            }
        })))
        .mount(&mock_server)
        .await;

    let status = client.task_status(TEST_NODE, &task).await.unwrap();
    assert!(status.succeeded());
    assert_eq!(status.extra["type"], "qmcreate");
}
