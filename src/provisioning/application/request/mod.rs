pub mod create_vm_request;
