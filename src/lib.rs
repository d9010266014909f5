//! A validator and interpreter for classic BPF packet filters

#![no_std]

extern crate alloc;

extern crate cbpf_consts;

pub mod packet;
pub mod spec;
pub mod verifier;
pub mod vm;
