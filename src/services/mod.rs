pub mod oci;
pub mod relay;
pub mod shortener;
pub mod staging;
pub mod storage;
