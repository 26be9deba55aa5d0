//! Image references and the naming of mirrored images

pub mod naming;
pub mod reference;
