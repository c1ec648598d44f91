//! Non-HTML endpoints: CSV export and image upload.

pub mod export;
pub mod upload;
