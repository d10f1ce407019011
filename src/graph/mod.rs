//! Scene graph primitives: node identity, property bags, and the ordered
//! collection used for the stage→scene and scene→effect/display chains.

pub mod collection;
pub mod node;
