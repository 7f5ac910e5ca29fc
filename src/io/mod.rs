//! Byte-level helpers shared by the message codecs and the dispatcher's
//! framing state machine.

mod buf;
mod buf_mut;

pub use buf::BufExt;
pub use buf_mut::BufMutExt;
