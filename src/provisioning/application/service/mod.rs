pub mod provisioning_service;
pub mod task_service;
