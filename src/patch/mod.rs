pub mod manifest;
pub mod permission_files;
pub mod roles;
pub mod service;

/// A transformed artifact plus whether the transformation altered it.
#[derive(Debug, Clone, PartialEq)]
pub struct Patched<T> {
    pub value: T,
    pub changed: bool,
}
