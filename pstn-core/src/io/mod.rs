//! Loading PSTNs from their serialized form.

pub mod json;
