pub mod sftp_store;
