pub mod cleanup_expired_documents;
