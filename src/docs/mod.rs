//! Google Docs integration

pub mod client;

pub use client::{
    CreatedDocument, DocsAuthorizer, DocsError, DocumentContent, DocumentSummary,
    GoogleDocsClient, GoogleDocsConfig,
};
