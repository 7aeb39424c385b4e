pub mod cleanup_documents;
