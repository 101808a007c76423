pub mod image_sync_service;
