pub mod app_config;
pub mod vm_spec;
