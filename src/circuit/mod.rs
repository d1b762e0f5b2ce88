//! ZK circuit for inheritance claims.

mod claim;
mod witness;

pub use claim::ClaimCircuit;
pub use witness::{ClaimWitness, STATUS_LEN};
