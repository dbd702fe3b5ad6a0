// Purpose - block buffers and external event formats

pub mod block;
pub mod converter;
pub mod midi;
