//! NFS program handlers. Only version 4 (minor version 0) is served.

pub mod v4;
