//! Pure text passes: article html → deal block → fragments, plus amount parsing.

pub mod amount;
pub mod block;
pub mod fragments;
