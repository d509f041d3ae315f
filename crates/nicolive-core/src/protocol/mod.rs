//! Wire protocol: outbound frame builders, frame splitting, element
//! scanning, and status-code classification.

pub mod codec;
pub mod status;
pub mod xml;

pub use codec::{
    connect_frame, parse_frame, post_frame, FrameSplitter, PostFrame, ServerEvent,
    FRAME_DELIMITER, PROTOCOL_VERSION,
};
pub use status::PostStatus;
pub use xml::{XmlElement, XmlError};
