pub mod compose;
pub mod composer;
pub mod events;
pub mod message_list;
pub mod send;
pub mod timeline;
pub mod view;
pub mod voice;

pub use compose::{ComposeState, SendPhase};
pub use composer::Composer;
pub use message_list::MessageList;
pub use view::ChatView;
