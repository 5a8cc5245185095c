//! Draining side of the pipeline: the primary destination (§4.6) and the
//! auxiliary destinations fanned out to via the barrier (§4.7).

pub mod aux_consumer;
pub mod main_consumer;
