//! Code generation backends. SPIR-V is the only target.

pub mod spv;
