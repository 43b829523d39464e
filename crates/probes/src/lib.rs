pub mod convert;
pub mod event;
pub mod grpc;
pub mod http;
pub mod kafka;
pub mod layout;
pub mod manual;
pub mod probe;
pub mod record;
pub mod redis;
pub mod router;
pub mod sql;

pub use convert::{Convert, ConvertContext};
pub use event::CapturedEvent;
pub use layout::Layout;
pub use probe::{ProbeId, ProbeKind};
pub use record::Record;
