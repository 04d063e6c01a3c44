pub mod app;
pub mod archive;
pub mod catalog;
pub mod config;
pub mod convert;
pub mod domain;
pub mod download;
pub mod error;
pub mod inference;
pub mod metadata;
pub mod mgf;
pub mod output;
pub mod pride_xml;
pub mod raw;
pub mod remote;
pub mod report;
pub mod store;
pub mod terminal;
pub mod xml;
