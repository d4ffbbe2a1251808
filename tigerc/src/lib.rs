//! Escape analysis, type checking, IR translation, instruction selection and register
//! allocation for the Tiger language, targeting 32-bit x86.
//!
//! Mirrors the module boundaries of the original `tiger-compiler` C sources one-for-one, the way
//! `cranelift-codegen`'s `lib.rs` groups its passes: public modules are the ones a driver needs to
//! call directly (`absyn`, `error`, `isa`, `semant`, `pipeline`); the rest are implementation
//! detail reachable through those.

pub mod absyn;
pub mod assem;
pub mod canon;
pub mod collections;
pub mod context;
pub mod error;
pub mod escape;
pub mod flowgraph;
pub mod frame;
pub mod isa;
pub mod liveness;
pub mod pipeline;
pub mod regalloc;
pub mod select;
pub mod semant;
pub mod symbol;
pub mod temp;
pub mod translate;
pub mod tree;
pub mod types;
